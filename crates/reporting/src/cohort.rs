//! Cohort analysis: conversion performance grouped by landing week or month.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use funnel_journey::Journey;

use crate::segment::GroupTally;
use crate::table::{round2, ReportTable, ToReportTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortPeriod {
    Weekly,
    Monthly,
}

impl CohortPeriod {
    /// Sortable cohort key: `W007` for weekly, `2024-03` for monthly.
    pub fn key(&self, journey: &Journey) -> String {
        let profile = journey.profile();
        match self {
            CohortPeriod::Weekly => format!("W{:03}", profile.cohort_week),
            CohortPeriod::Monthly => profile.cohort_month(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRow {
    pub cohort: String,
    pub users: u64,
    pub signups: u64,
    pub purchases: u64,
    pub revenue: f64,
    pub signup_rate_pct: f64,
    pub conversion_rate_pct: f64,
    pub revenue_per_user: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortAnalysis {
    pub period: CohortPeriod,
    pub cohorts: Vec<CohortRow>,
    /// Relative change in conversion rate from the first cohort to the last.
    pub trend_pct: Option<f64>,
}

pub struct CohortAnalyzer;

impl CohortAnalyzer {
    pub fn analyze(journeys: &[Journey], period: CohortPeriod) -> CohortAnalysis {
        let mut groups: BTreeMap<String, GroupTally> = BTreeMap::new();
        for journey in journeys {
            groups.entry(period.key(journey)).or_default().add(journey);
        }

        let cohorts: Vec<CohortRow> = groups
            .into_iter()
            .map(|(cohort, t)| CohortRow {
                signup_rate_pct: t.signup_rate_pct(),
                conversion_rate_pct: t.conversion_rate_pct(),
                revenue_per_user: t.revenue_per_user(),
                cohort,
                users: t.users,
                signups: t.signups,
                purchases: t.purchases,
                revenue: t.revenue,
            })
            .collect();

        let trend_pct = match (cohorts.first(), cohorts.last()) {
            (Some(first), Some(last))
                if cohorts.len() > 1 && first.conversion_rate_pct > 0.0 =>
            {
                let (from, to) = (first.conversion_rate_pct, last.conversion_rate_pct);
                Some((to - from) / from * 100.0)
            }
            _ => None,
        };

        CohortAnalysis {
            period,
            cohorts,
            trend_pct,
        }
    }
}

impl ToReportTable for CohortAnalysis {
    fn to_table(&self) -> ReportTable {
        let mut table = ReportTable::new(
            "cohort_analysis",
            &[
                "Cohort",
                "Users",
                "Signups",
                "Purchases",
                "Revenue",
                "Signup_Rate",
                "Conversion_Rate",
                "Revenue_per_User",
            ],
        );
        for row in &self.cohorts {
            table.push_row(vec![
                json!(row.cohort),
                json!(row.users),
                json!(row.signups),
                json!(row.purchases),
                round2(row.revenue),
                round2(row.signup_rate_pct),
                round2(row.conversion_rate_pct),
                round2(row.revenue_per_user),
            ]);
        }
        table
    }
}
