//! Revenue attribution: credits purchases back to acquisition channels.
//!
//! Each simulated user carries exactly one touchpoint (the channel they
//! landed from), so the position-based models all collapse to full credit
//! for that channel. Time-Decay still discounts channels whose buyers took
//! longer to convert.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use funnel_journey::Journey;

use crate::table::{pct, round2, ReportTable, ToReportTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    PositionBased,
}

impl AttributionModel {
    pub const ALL: [AttributionModel; 5] = [
        AttributionModel::FirstTouch,
        AttributionModel::LastTouch,
        AttributionModel::Linear,
        AttributionModel::TimeDecay,
        AttributionModel::PositionBased,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AttributionModel::FirstTouch => "First-Touch",
            AttributionModel::LastTouch => "Last-Touch",
            AttributionModel::Linear => "Linear",
            AttributionModel::TimeDecay => "Time-Decay",
            AttributionModel::PositionBased => "Position-Based",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAttribution {
    pub channel: String,
    pub conversions: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCredit {
    pub model: AttributionModel,
    pub revenue: f64,
    /// Share of the model's total attributed revenue.
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelComparison {
    pub channel: String,
    pub conversions: u64,
    /// One entry per model, in `AttributionModel::ALL` order.
    pub credits: Vec<ModelCredit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionComparison {
    pub channels: Vec<ChannelComparison>,
}

#[derive(Default)]
struct PurchaseTally {
    conversions: u64,
    revenue: f64,
    minutes: f64,
}

#[derive(Debug, Clone)]
pub struct RevenueAttributionEngine {
    time_decay_scale_minutes: f64,
}

impl RevenueAttributionEngine {
    pub fn new(time_decay_scale_minutes: f64) -> Self {
        Self {
            time_decay_scale_minutes,
        }
    }

    /// Attributed conversions and revenue per channel, ordered by channel name.
    /// Channels without purchases are omitted.
    pub fn attribute(
        &self,
        journeys: &[Journey],
        model: AttributionModel,
    ) -> Vec<ChannelAttribution> {
        let mut tallies: BTreeMap<&str, PurchaseTally> = BTreeMap::new();
        for journey in journeys {
            let (Some(value), Some(minutes)) =
                (journey.purchase_value(), journey.total_journey_minutes())
            else {
                continue;
            };
            let tally = tallies.entry(journey.profile().channel.as_str()).or_default();
            tally.conversions += 1;
            tally.revenue += value;
            tally.minutes += f64::from(minutes);
        }

        tallies
            .into_iter()
            .map(|(channel, tally)| {
                let credit = match model {
                    AttributionModel::TimeDecay => {
                        let avg_minutes = tally.minutes / tally.conversions as f64;
                        1.0 / (1.0 + avg_minutes / self.time_decay_scale_minutes)
                    }
                    AttributionModel::FirstTouch
                    | AttributionModel::LastTouch
                    | AttributionModel::Linear
                    | AttributionModel::PositionBased => 1.0,
                };
                ChannelAttribution {
                    channel: channel.to_string(),
                    conversions: tally.conversions,
                    revenue: tally.revenue * credit,
                }
            })
            .collect()
    }

    /// Runs every model and lines the results up per channel.
    pub fn compare(&self, journeys: &[Journey]) -> AttributionComparison {
        let per_model: Vec<(AttributionModel, Vec<ChannelAttribution>)> = AttributionModel::ALL
            .iter()
            .map(|model| (*model, self.attribute(journeys, *model)))
            .collect();

        // Every model attributes the same set of channels.
        let Some((_, baseline)) = per_model.first() else {
            return AttributionComparison { channels: Vec::new() };
        };

        let channels = baseline
            .iter()
            .enumerate()
            .map(|(i, base)| ChannelComparison {
                channel: base.channel.clone(),
                conversions: base.conversions,
                credits: per_model
                    .iter()
                    .map(|(model, rows)| {
                        let total: f64 = rows.iter().map(|r| r.revenue).sum();
                        ModelCredit {
                            model: *model,
                            revenue: rows[i].revenue,
                            share_pct: pct(rows[i].revenue, total),
                        }
                    })
                    .collect(),
            })
            .collect();

        AttributionComparison { channels }
    }
}

impl ToReportTable for AttributionComparison {
    fn to_table(&self) -> ReportTable {
        let mut columns = vec!["Channel".to_string(), "Conversions".to_string()];
        for model in AttributionModel::ALL {
            columns.push(model.label().to_string());
        }
        for model in AttributionModel::ALL {
            columns.push(format!("{}_Pct", model.label()));
        }
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();

        let mut table = ReportTable::new("attribution_model_comparison", &column_refs);
        for channel in &self.channels {
            let mut row = vec![json!(channel.channel), json!(channel.conversions)];
            row.extend(channel.credits.iter().map(|c| round2(c.revenue)));
            row.extend(channel.credits.iter().map(|c| round2(c.share_pct)));
            table.push_row(row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::tests::{converted, exited, make_profile};
    use funnel_core::FunnelStage;

    fn make_journeys() -> Vec<Journey> {
        vec![
            // Email buyers average 100 minutes.
            converted(make_profile(1, "Email", "Desktop"), 60.0, 20),
            converted(make_profile(2, "Email", "Desktop"), 40.0, 30),
            // Direct buyer takes 300 minutes.
            converted(make_profile(3, "Direct", "Mobile"), 100.0, 75),
            exited(make_profile(4, "Referral", "Mobile"), FunnelStage::AddToCart),
        ]
    }

    #[test]
    fn test_single_touch_models_give_full_credit() {
        let engine = RevenueAttributionEngine::new(100.0);
        for model in [
            AttributionModel::FirstTouch,
            AttributionModel::LastTouch,
            AttributionModel::Linear,
            AttributionModel::PositionBased,
        ] {
            let rows = engine.attribute(&make_journeys(), model);
            assert_eq!(rows.len(), 2, "{:?}", model);
            assert_eq!(rows[0].channel, "Direct");
            assert!((rows[0].revenue - 100.0).abs() < 1e-9);
            assert_eq!(rows[1].conversions, 2);
            assert!((rows[1].revenue - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_time_decay_discounts_slow_channels() {
        let engine = RevenueAttributionEngine::new(100.0);
        let rows = engine.attribute(&make_journeys(), AttributionModel::TimeDecay);
        // Direct: 100 / (1 + 300/100)
        assert!((rows[0].revenue - 25.0).abs() < 1e-9);
        // Email: 100 / (1 + 100/100)
        assert!((rows[1].revenue - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_comparison_shares() {
        let comparison = RevenueAttributionEngine::new(100.0).compare(&make_journeys());
        assert_eq!(comparison.channels.len(), 2);
        let email = &comparison.channels[1];
        assert_eq!(email.credits.len(), 5);
        assert_eq!(email.credits[0].model, AttributionModel::FirstTouch);
        assert!((email.credits[0].share_pct - 50.0).abs() < 1e-9);
        let decay = &email.credits[3];
        assert_eq!(decay.model, AttributionModel::TimeDecay);
        assert!((decay.share_pct - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_purchases() {
        let journeys = vec![exited(make_profile(1, "Email", "Desktop"), FunnelStage::Landing)];
        let comparison = RevenueAttributionEngine::new(100.0).compare(&journeys);
        assert!(comparison.channels.is_empty());
        assert_eq!(comparison.to_table().columns.len(), 12);
    }

    #[test]
    fn test_labels() {
        let labels: Vec<&str> = AttributionModel::ALL.iter().map(|m| m.label()).collect();
        assert_eq!(
            labels,
            vec!["First-Touch", "Last-Touch", "Linear", "Time-Decay", "Position-Based"]
        );
    }
}
