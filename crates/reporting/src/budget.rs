//! Channel ROI/ROAS and budget reallocation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use funnel_core::config::SimulationConfig;
use funnel_journey::Journey;

use crate::table::{pct, ratio, round2, ReportTable, ToReportTable};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Return on spend for one acquisition channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRoi {
    pub channel: String,
    pub sessions: u64,
    /// `sessions * cost_per_session`.
    pub spend: f64,
    pub revenue: f64,
    pub conversions: u64,
    /// `spend / conversions` (0.0 without conversions).
    pub cost_per_acquisition: f64,
    /// `revenue / spend` (0.0 when spend is zero).
    pub roas: f64,
    /// `(revenue - spend) / spend * 100` (0.0 when spend is zero).
    pub roi_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Increase,
    Decrease,
    Maintain,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Increase => "Increase",
            Recommendation::Decrease => "Decrease",
            Recommendation::Maintain => "Maintain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAllocation {
    pub channel: String,
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub roi_pct: f64,
    pub current_share_pct: f64,
    pub optimal_share_pct: f64,
    /// Optimal minus current share, in percentage points.
    pub budget_change_pct: f64,
    pub dollar_change: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub total_spend: f64,
    pub current_revenue: f64,
    pub projected_revenue: f64,
    pub revenue_lift_pct: f64,
    pub allocations: Vec<ChannelAllocation>,
}

// ---------------------------------------------------------------------------
// ROI
// ---------------------------------------------------------------------------

/// Per-channel ROI, ordered by ROAS with the strongest channel first.
pub fn channel_roi(journeys: &[Journey], config: &SimulationConfig) -> Vec<ChannelRoi> {
    let mut totals: BTreeMap<&str, (u64, u64, f64)> = BTreeMap::new();
    for journey in journeys {
        let entry = totals.entry(journey.profile().channel.as_str()).or_default();
        entry.0 += 1;
        if let Some(value) = journey.purchase_value() {
            entry.1 += 1;
            entry.2 += value;
        }
    }

    let mut rows: Vec<ChannelRoi> = totals
        .into_iter()
        .map(|(channel, (sessions, conversions, revenue))| {
            let spend = sessions as f64 * config.cost_per_session(channel);
            ChannelRoi {
                channel: channel.to_string(),
                sessions,
                spend,
                revenue,
                conversions,
                cost_per_acquisition: ratio(spend, conversions as f64),
                roas: calculate_roas(revenue, spend),
                roi_pct: calculate_roi_pct(revenue, spend),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.roas.total_cmp(&a.roas));
    rows
}

pub fn calculate_roas(revenue: f64, spend: f64) -> f64 {
    ratio(revenue, spend)
}

pub fn calculate_roi_pct(revenue: f64, spend: f64) -> f64 {
    ratio(revenue - spend, spend) * 100.0
}

// ---------------------------------------------------------------------------
// BudgetOptimizer
// ---------------------------------------------------------------------------

/// Shifts spend toward channels in proportion to ROAS squared, keeping the
/// total budget fixed.
#[derive(Debug, Clone)]
pub struct BudgetOptimizer {
    change_threshold_pct: f64,
}

impl BudgetOptimizer {
    pub fn new(change_threshold_pct: f64) -> Self {
        Self {
            change_threshold_pct,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.reporting.budget_change_threshold_pct)
    }

    pub fn optimize(&self, roi: &[ChannelRoi]) -> BudgetPlan {
        let total_spend: f64 = roi.iter().map(|r| r.spend).sum();
        let current_revenue: f64 = roi.iter().map(|r| r.revenue).sum();
        let roas_sq_sum: f64 = roi.iter().map(|r| r.roas * r.roas).sum();

        let allocations: Vec<ChannelAllocation> = roi
            .iter()
            .map(|r| {
                let current = pct(r.spend, total_spend);
                let optimal = if roas_sq_sum > 0.0 {
                    r.roas * r.roas / roas_sq_sum * 100.0
                } else {
                    current
                };
                let change = optimal - current;
                ChannelAllocation {
                    channel: r.channel.clone(),
                    spend: r.spend,
                    revenue: r.revenue,
                    roas: r.roas,
                    roi_pct: r.roi_pct,
                    current_share_pct: current,
                    optimal_share_pct: optimal,
                    budget_change_pct: change,
                    dollar_change: change / 100.0 * total_spend,
                    recommendation: self.recommend(change),
                }
            })
            .collect();

        let projected_revenue = total_spend
            * allocations
                .iter()
                .map(|a| a.roas * a.optimal_share_pct / 100.0)
                .sum::<f64>();

        BudgetPlan {
            total_spend,
            current_revenue,
            projected_revenue,
            revenue_lift_pct: pct(projected_revenue - current_revenue, current_revenue),
            allocations,
        }
    }

    fn recommend(&self, change_pct: f64) -> Recommendation {
        if change_pct > self.change_threshold_pct {
            Recommendation::Increase
        } else if change_pct < -self.change_threshold_pct {
            Recommendation::Decrease
        } else {
            Recommendation::Maintain
        }
    }
}

impl BudgetPlan {
    pub fn allocation(&self, channel: &str) -> Option<&ChannelAllocation> {
        self.allocations.iter().find(|a| a.channel == channel)
    }
}

impl ToReportTable for [ChannelRoi] {
    fn to_table(&self) -> ReportTable {
        let mut table = ReportTable::new(
            "channel_roi_metrics",
            &[
                "Channel",
                "Sessions",
                "Spend",
                "Revenue",
                "Conversions",
                "CPA",
                "ROAS",
                "ROI_Pct",
            ],
        );
        for r in self {
            table.push_row(vec![
                json!(r.channel),
                json!(r.sessions),
                round2(r.spend),
                round2(r.revenue),
                json!(r.conversions),
                round2(r.cost_per_acquisition),
                round2(r.roas),
                round2(r.roi_pct),
            ]);
        }
        table
    }
}

impl ToReportTable for BudgetPlan {
    fn to_table(&self) -> ReportTable {
        let mut table = ReportTable::new(
            "budget_allocation_recommendations",
            &[
                "Channel",
                "Spend",
                "Revenue",
                "ROAS",
                "ROI_Pct",
                "Current_Share",
                "Optimal_Share",
                "Budget_Change",
                "Dollar_Change",
                "Recommendation",
            ],
        );
        for a in &self.allocations {
            table.push_row(vec![
                json!(a.channel),
                round2(a.spend),
                round2(a.revenue),
                round2(a.roas),
                round2(a.roi_pct),
                round2(a.current_share_pct),
                round2(a.optimal_share_pct),
                round2(a.budget_change_pct),
                round2(a.dollar_change),
                json!(a.recommendation.label()),
            ]);
        }
        table
    }
}
