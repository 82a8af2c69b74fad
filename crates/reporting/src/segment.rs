//! Segment performance by acquisition channel, device or demographic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use funnel_core::FunnelStage;
use funnel_journey::Journey;

use crate::table::{pct, ratio, round2, ReportTable, ToReportTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Channel,
    Device,
    AgeGroup,
    Location,
}

impl Dimension {
    pub fn key<'a>(&self, journey: &'a Journey) -> &'a str {
        let profile = journey.profile();
        match self {
            Dimension::Channel => profile.channel.as_str(),
            Dimension::Device => profile.device.as_str(),
            Dimension::AgeGroup => profile.age_group.as_str(),
            Dimension::Location => profile.location.as_str(),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Channel => "Channel",
            Dimension::Device => "Device",
            Dimension::AgeGroup => "Age_Group",
            Dimension::Location => "Location",
        }
    }
}

/// Running totals for one group of journeys.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupTally {
    pub users: u64,
    pub signups: u64,
    pub purchases: u64,
    pub revenue: f64,
}

impl GroupTally {
    pub fn add(&mut self, journey: &Journey) {
        self.users += 1;
        if journey.reached(FunnelStage::Signup) {
            self.signups += 1;
        }
        if let Some(value) = journey.purchase_value() {
            self.purchases += 1;
            self.revenue += value;
        }
    }

    pub fn signup_rate_pct(&self) -> f64 {
        pct(self.signups as f64, self.users as f64)
    }

    pub fn conversion_rate_pct(&self) -> f64 {
        pct(self.purchases as f64, self.users as f64)
    }

    pub fn revenue_per_user(&self) -> f64 {
        ratio(self.revenue, self.users as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub segment: String,
    pub sessions: u64,
    pub signups: u64,
    pub purchases: u64,
    pub signup_rate_pct: f64,
    pub conversion_rate_pct: f64,
    pub revenue: f64,
    pub revenue_per_user: f64,
    pub average_order_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentBreakdown {
    pub dimension: Dimension,
    /// Ordered by conversion rate, best first.
    pub segments: Vec<SegmentMetrics>,
}

impl SegmentBreakdown {
    pub fn by(dimension: Dimension, journeys: &[Journey]) -> Self {
        let mut groups: BTreeMap<&str, GroupTally> = BTreeMap::new();
        for journey in journeys {
            groups.entry(dimension.key(journey)).or_default().add(journey);
        }

        let mut segments: Vec<SegmentMetrics> = groups
            .into_iter()
            .map(|(name, tally)| SegmentMetrics {
                segment: name.to_string(),
                sessions: tally.users,
                signups: tally.signups,
                purchases: tally.purchases,
                signup_rate_pct: tally.signup_rate_pct(),
                conversion_rate_pct: tally.conversion_rate_pct(),
                revenue: tally.revenue,
                revenue_per_user: tally.revenue_per_user(),
                average_order_value: ratio(tally.revenue, tally.purchases as f64),
            })
            .collect();
        // BTreeMap order is by name, and the sort is stable, so ties keep it.
        segments.sort_by(|a, b| b.conversion_rate_pct.total_cmp(&a.conversion_rate_pct));

        Self {
            dimension,
            segments,
        }
    }

    pub fn best(&self) -> Option<&SegmentMetrics> {
        self.segments.first()
    }

    pub fn worst(&self) -> Option<&SegmentMetrics> {
        self.segments.last()
    }

    /// Relative gap between best and worst conversion rate, in percent.
    pub fn performance_gap_pct(&self) -> Option<f64> {
        let (best, worst) = (self.best()?, self.worst()?);
        if worst.conversion_rate_pct > 0.0 {
            let gap = best.conversion_rate_pct - worst.conversion_rate_pct;
            Some(gap / worst.conversion_rate_pct * 100.0)
        } else {
            None
        }
    }

    pub fn get(&self, segment: &str) -> Option<&SegmentMetrics> {
        self.segments.iter().find(|s| s.segment == segment)
    }
}

impl ToReportTable for SegmentBreakdown {
    fn to_table(&self) -> ReportTable {
        let mut table = ReportTable::new(
            format!("{}_performance", self.dimension.column().to_lowercase()),
            &[
                self.dimension.column(),
                "Sessions",
                "Signups",
                "Purchases",
                "Signup_Rate",
                "Conversion_Rate",
                "Revenue",
                "Revenue_per_User",
                "AOV",
            ],
        );
        for s in &self.segments {
            table.push_row(vec![
                json!(s.segment),
                json!(s.sessions),
                json!(s.signups),
                json!(s.purchases),
                round2(s.signup_rate_pct),
                round2(s.conversion_rate_pct),
                round2(s.revenue),
                round2(s.revenue_per_user),
                round2(s.average_order_value),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::tests::{converted, exited, make_profile, sample_journeys};

    #[test]
    fn test_channel_breakdown() {
        let breakdown = SegmentBreakdown::by(Dimension::Channel, &sample_journeys());
        assert_eq!(breakdown.segments.len(), 2);

        let email = breakdown.get("Email").unwrap();
        assert_eq!(email.sessions, 5);
        assert_eq!(email.signups, 5);
        assert_eq!(email.purchases, 2);
        assert!((email.conversion_rate_pct - 40.0).abs() < 1e-9);
        assert!((email.revenue - 150.0).abs() < 1e-9);
        assert!((email.revenue_per_user - 30.0).abs() < 1e-9);
        assert!((email.average_order_value - 75.0).abs() < 1e-9);

        let social = breakdown.get("Social Media").unwrap();
        assert_eq!(social.sessions, 5);
        assert_eq!(social.signups, 1);
        assert_eq!(social.purchases, 0);
        assert_eq!(social.average_order_value, 0.0);
    }

    #[test]
    fn test_sorted_best_first_with_gap() {
        let journeys = vec![
            converted(make_profile(1, "Email", "Desktop"), 10.0, 5),
            exited(make_profile(2, "Email", "Mobile"), FunnelStage::Landing),
            converted(make_profile(3, "Direct", "Mobile"), 10.0, 5),
            exited(make_profile(4, "Direct", "Mobile"), FunnelStage::Signup),
            exited(make_profile(5, "Direct", "Mobile"), FunnelStage::Signup),
            exited(make_profile(6, "Direct", "Mobile"), FunnelStage::Signup),
        ];
        let breakdown = SegmentBreakdown::by(Dimension::Channel, &journeys);
        assert_eq!(breakdown.best().unwrap().segment, "Email");
        assert_eq!(breakdown.worst().unwrap().segment, "Direct");
        // 50% vs 25%
        assert!((breakdown.performance_gap_pct().unwrap() - 100.0).abs() < 1e-9);

        let devices = SegmentBreakdown::by(Dimension::Device, &journeys);
        assert_eq!(devices.best().unwrap().segment, "Desktop");
    }

    #[test]
    fn test_ties_ordered_by_name() {
        let journeys = vec![
            exited(make_profile(1, "Referral", "Desktop"), FunnelStage::Landing),
            exited(make_profile(2, "Direct", "Desktop"), FunnelStage::Landing),
        ];
        let breakdown = SegmentBreakdown::by(Dimension::Channel, &journeys);
        let names: Vec<&str> = breakdown.segments.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(names, vec!["Direct", "Referral"]);
        assert!(breakdown.performance_gap_pct().is_none());
    }

    #[test]
    fn test_empty_breakdown() {
        let breakdown = SegmentBreakdown::by(Dimension::Location, &[]);
        assert!(breakdown.segments.is_empty());
        assert!(breakdown.best().is_none());
        assert_eq!(breakdown.to_table().row_count(), 0);
    }

    #[test]
    fn test_table_header_uses_dimension() {
        let table = SegmentBreakdown::by(Dimension::AgeGroup, &sample_journeys()).to_table();
        assert_eq!(table.name, "age_group_performance");
        assert_eq!(table.columns[0], "Age_Group");
        assert_eq!(table.row_count(), 1);
    }
}
