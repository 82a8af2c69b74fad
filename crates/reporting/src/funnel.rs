//! Funnel analysis: stage volumes, stage-to-stage conversion, drop-off,
//! revenue, and time to convert.

use serde::{Deserialize, Serialize};
use serde_json::json;

use funnel_core::FunnelStage;
use funnel_journey::Journey;

use crate::table::{pct, ratio, round2, ReportTable, ToReportTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStepResult {
    pub stage: FunnelStage,
    pub users: u64,
    /// Share of all landed users that reached this stage.
    pub overall_conversion_pct: f64,
    /// Share of the previous stage's users that reached this stage.
    pub stage_conversion_pct: f64,
    pub drop_off_pct: f64,
    pub users_lost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropOff {
    pub from: FunnelStage,
    pub to: FunnelStage,
    pub drop_off_pct: f64,
    pub users_lost: u64,
}

/// Timing statistics over users who purchased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeToConvert {
    pub purchasers: u64,
    pub mean_total_minutes: f64,
    pub median_total_minutes: f64,
    /// Mean minutes spent reaching each non-landing stage.
    pub mean_transition_minutes: Vec<(FunnelStage, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    pub total_users: u64,
    pub steps: Vec<FunnelStepResult>,
    pub overall_conversion_pct: f64,
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub revenue_per_visitor: f64,
    pub biggest_drop_off: Option<DropOff>,
    pub time_to_convert: Option<TimeToConvert>,
}

pub struct FunnelAnalyzer;

impl FunnelAnalyzer {
    pub fn analyze(journeys: &[Journey]) -> FunnelReport {
        let mut counts = [0u64; 5];
        let mut revenue = 0.0;
        let mut totals = Vec::new();
        let mut transition_sums = [0.0f64; 4];

        for journey in journeys {
            for (i, stage) in FunnelStage::ALL.iter().enumerate() {
                if journey.reached(*stage) {
                    counts[i] += 1;
                }
            }
            if let Journey::Converted {
                visits,
                purchase_value,
                total_journey_minutes,
                ..
            } = journey
            {
                revenue += purchase_value;
                totals.push(f64::from(*total_journey_minutes));
                for (sum, visit) in transition_sums.iter_mut().zip(visits.iter()) {
                    *sum += f64::from(visit.minutes_from_previous);
                }
            }
        }

        let landed = counts[0];
        let mut steps = Vec::with_capacity(FunnelStage::ALL.len());
        for (i, stage) in FunnelStage::ALL.iter().enumerate() {
            let users = counts[i];
            let (stage_conversion_pct, drop_off_pct, users_lost) = if i == 0 {
                (100.0, 0.0, 0)
            } else {
                let prev = counts[i - 1];
                let conv = pct(users as f64, prev as f64);
                let drop = if prev > 0 { 100.0 - conv } else { 0.0 };
                (conv, drop, prev - users)
            };
            steps.push(FunnelStepResult {
                stage: *stage,
                users,
                overall_conversion_pct: pct(users as f64, landed as f64),
                stage_conversion_pct,
                drop_off_pct,
                users_lost,
            });
        }

        let biggest_drop_off = if landed > 0 {
            steps
                .iter()
                .skip(1)
                .fold(None::<&FunnelStepResult>, |best, step| match best {
                    Some(b) if b.drop_off_pct >= step.drop_off_pct => Some(b),
                    _ => Some(step),
                })
                .and_then(|step| {
                    step.stage.previous().map(|from| DropOff {
                        from,
                        to: step.stage,
                        drop_off_pct: step.drop_off_pct,
                        users_lost: step.users_lost,
                    })
                })
        } else {
            None
        };

        let purchasers = counts[4];
        let time_to_convert = if totals.is_empty() {
            None
        } else {
            let n = totals.len() as f64;
            Some(TimeToConvert {
                purchasers,
                mean_total_minutes: totals.iter().sum::<f64>() / n,
                median_total_minutes: median(&mut totals),
                mean_transition_minutes: FunnelStage::TRANSITIONS
                    .iter()
                    .zip(transition_sums)
                    .map(|(stage, sum)| (*stage, sum / n))
                    .collect(),
            })
        };

        FunnelReport {
            total_users: journeys.len() as u64,
            steps,
            overall_conversion_pct: pct(purchasers as f64, landed as f64),
            total_revenue: revenue,
            average_order_value: ratio(revenue, purchasers as f64),
            revenue_per_visitor: ratio(revenue, journeys.len() as f64),
            biggest_drop_off,
            time_to_convert,
        }
    }
}

impl FunnelReport {
    pub fn step(&self, stage: FunnelStage) -> Option<&FunnelStepResult> {
        self.steps.iter().find(|s| s.stage == stage)
    }
}

impl ToReportTable for FunnelReport {
    fn to_table(&self) -> ReportTable {
        let mut table = ReportTable::new(
            "funnel_metrics",
            &[
                "Stage",
                "Users",
                "Overall_Conv_Rate",
                "Stage_Conv_Rate",
                "Drop_off_Rate",
                "Users_Lost",
            ],
        );
        for step in &self.steps {
            table.push_row(vec![
                json!(step.stage.display_name()),
                json!(step.users),
                round2(step.overall_conversion_pct),
                round2(step.stage_conversion_pct),
                round2(step.drop_off_pct),
                json!(step.users_lost),
            ]);
        }
        table
    }
}

/// Median of a non-empty sample; averages the middle pair for even sizes.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use funnel_journey::{StageVisit, UserProfile};

    pub(crate) fn make_profile(id: usize, channel: &str, device: &str) -> UserProfile {
        UserProfile {
            user_id: format!("U{:06}", id),
            channel: channel.into(),
            channel_multiplier: 1.0,
            device: device.into(),
            device_multiplier: 1.0,
            age_group: "25-34".into(),
            location: "Urban".into(),
            landing_at: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
            cohort_week: 1,
        }
    }

    fn visits_until(
        profile: &UserProfile,
        last: FunnelStage,
        step_minutes: u32,
    ) -> Vec<StageVisit> {
        FunnelStage::TRANSITIONS
            .iter()
            .filter(|s| **s <= last)
            .enumerate()
            .map(|(i, stage)| StageVisit {
                stage: *stage,
                at: profile.landing_at
                    + Duration::minutes(i64::from(step_minutes) * (i as i64 + 1)),
                minutes_from_previous: step_minutes,
            })
            .collect()
    }

    pub(crate) fn exited(profile: UserProfile, at: FunnelStage) -> Journey {
        let visits = visits_until(&profile, at, 10);
        Journey::Exited {
            profile,
            exit_stage: at,
            visits,
        }
    }

    pub(crate) fn converted(profile: UserProfile, value: f64, step_minutes: u32) -> Journey {
        let visits = visits_until(&profile, FunnelStage::Purchase, step_minutes);
        Journey::Converted {
            profile,
            visits: visits.try_into().unwrap(),
            purchase_value: value,
            total_journey_minutes: step_minutes * 4,
        }
    }

    /// 10 users: 4 leave at landing, 2 at signup, 1 at product view,
    /// 1 at cart, 2 purchase.
    pub(crate) fn sample_journeys() -> Vec<Journey> {
        let mut journeys = Vec::new();
        let mut id = 0;
        let mut next = |channel: &str| {
            id += 1;
            make_profile(id, channel, "Desktop")
        };
        for _ in 0..4 {
            journeys.push(exited(next("Social Media"), FunnelStage::Landing));
        }
        for _ in 0..2 {
            journeys.push(exited(next("Email"), FunnelStage::Signup));
        }
        journeys.push(exited(next("Email"), FunnelStage::ProductView));
        journeys.push(exited(next("Social Media"), FunnelStage::AddToCart));
        journeys.push(converted(next("Email"), 100.0, 10));
        journeys.push(converted(next("Email"), 50.0, 20));
        journeys
    }

    #[test]
    fn test_stage_counts_and_rates() {
        let report = FunnelAnalyzer::analyze(&sample_journeys());
        let users: Vec<u64> = report.steps.iter().map(|s| s.users).collect();
        assert_eq!(users, vec![10, 6, 4, 3, 2]);

        let signup = report.step(FunnelStage::Signup).unwrap();
        assert!((signup.overall_conversion_pct - 60.0).abs() < 1e-9);
        assert!((signup.stage_conversion_pct - 60.0).abs() < 1e-9);
        assert!((signup.drop_off_pct - 40.0).abs() < 1e-9);
        assert_eq!(signup.users_lost, 4);

        let purchase = report.step(FunnelStage::Purchase).unwrap();
        assert!((purchase.stage_conversion_pct - 200.0 / 3.0).abs() < 1e-9);
        assert!((report.overall_conversion_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_biggest_drop_off() {
        let report = FunnelAnalyzer::analyze(&sample_journeys());
        let drop = report.biggest_drop_off.unwrap();
        assert_eq!(drop.from, FunnelStage::Landing);
        assert_eq!(drop.to, FunnelStage::Signup);
        assert_eq!(drop.users_lost, 4);
    }

    #[test]
    fn test_revenue_and_timing() {
        let report = FunnelAnalyzer::analyze(&sample_journeys());
        assert!((report.total_revenue - 150.0).abs() < 1e-9);
        assert!((report.average_order_value - 75.0).abs() < 1e-9);
        assert!((report.revenue_per_visitor - 15.0).abs() < 1e-9);

        let timing = report.time_to_convert.unwrap();
        assert_eq!(timing.purchasers, 2);
        assert!((timing.mean_total_minutes - 60.0).abs() < 1e-9);
        assert!((timing.median_total_minutes - 60.0).abs() < 1e-9);
        assert_eq!(timing.mean_transition_minutes.len(), 4);
        assert!((timing.mean_transition_minutes[0].1 - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let report = FunnelAnalyzer::analyze(&[]);
        assert_eq!(report.total_users, 0);
        assert!(report.steps.iter().all(|s| s.users == 0));
        assert_eq!(report.overall_conversion_pct, 0.0);
        assert!(report.biggest_drop_off.is_none());
        assert!(report.time_to_convert.is_none());
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_table_shape() {
        let table = FunnelAnalyzer::analyze(&sample_journeys()).to_table();
        assert_eq!(table.row_count(), 5);
        assert!(table.to_csv().starts_with("Stage,Users,"));
    }
}
