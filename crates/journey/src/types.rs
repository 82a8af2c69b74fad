use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use funnel_core::FunnelStage;

/// A simulated visitor, drawn once before its journey is walked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub channel: String,
    pub channel_multiplier: f64,
    pub device: String,
    pub device_multiplier: f64,
    pub age_group: String,
    pub location: String,
    pub landing_at: DateTime<Utc>,
    /// Whole weeks between the start of the date range and landing.
    pub cohort_week: u32,
}

impl UserProfile {
    /// `YYYY-MM` of the landing timestamp.
    pub fn cohort_month(&self) -> String {
        self.landing_at.format("%Y-%m").to_string()
    }
}

/// A stage the user reached after landing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageVisit {
    pub stage: FunnelStage,
    pub at: DateTime<Utc>,
    pub minutes_from_previous: u32,
}

/// Outcome of walking one user through the funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Journey {
    /// Stopped before purchasing. `exit_stage` is the last stage reached
    /// and `visits` holds the stages reached after landing, in order.
    Exited {
        profile: UserProfile,
        exit_stage: FunnelStage,
        visits: Vec<StageVisit>,
    },
    /// Reached every stage through purchase.
    Converted {
        profile: UserProfile,
        visits: [StageVisit; 4],
        purchase_value: f64,
        total_journey_minutes: u32,
    },
}

impl Journey {
    pub fn profile(&self) -> &UserProfile {
        match self {
            Journey::Exited { profile, .. } | Journey::Converted { profile, .. } => profile,
        }
    }

    pub fn visits(&self) -> &[StageVisit] {
        match self {
            Journey::Exited { visits, .. } => visits.as_slice(),
            Journey::Converted { visits, .. } => visits.as_slice(),
        }
    }

    /// Last stage reached; `Purchase` for converted journeys.
    pub fn exit_stage(&self) -> FunnelStage {
        match self {
            Journey::Exited { exit_stage, .. } => *exit_stage,
            Journey::Converted { .. } => FunnelStage::Purchase,
        }
    }

    pub fn reached(&self, stage: FunnelStage) -> bool {
        stage <= self.exit_stage()
    }

    pub fn visit(&self, stage: FunnelStage) -> Option<&StageVisit> {
        self.visits().iter().find(|v| v.stage == stage)
    }

    /// Timestamp at which `stage` was reached, landing included.
    pub fn reached_at(&self, stage: FunnelStage) -> Option<DateTime<Utc>> {
        match stage {
            FunnelStage::Landing => Some(self.profile().landing_at),
            other => self.visit(other).map(|v| v.at),
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Journey::Converted { .. })
    }

    pub fn purchase_value(&self) -> Option<f64> {
        match self {
            Journey::Converted { purchase_value, .. } => Some(*purchase_value),
            Journey::Exited { .. } => None,
        }
    }

    pub fn total_journey_minutes(&self) -> Option<u32> {
        match self {
            Journey::Converted {
                total_journey_minutes,
                ..
            } => Some(*total_journey_minutes),
            Journey::Exited { .. } => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub(crate) fn make_profile(channel: &str, device: &str) -> UserProfile {
        UserProfile {
            user_id: "U000001".into(),
            channel: channel.into(),
            channel_multiplier: 1.0,
            device: device.into(),
            device_multiplier: 1.0,
            age_group: "25-34".into(),
            location: "Urban".into(),
            landing_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
            cohort_week: 9,
        }
    }

    fn visit(profile: &UserProfile, stage: FunnelStage, minutes: i64) -> StageVisit {
        StageVisit {
            stage,
            at: profile.landing_at + Duration::minutes(minutes),
            minutes_from_previous: 0,
        }
    }

    #[test]
    fn test_exited_journey_accessors() {
        let profile = make_profile("Email", "Desktop");
        let journey = Journey::Exited {
            visits: vec![visit(&profile, FunnelStage::Signup, 10)],
            exit_stage: FunnelStage::Signup,
            profile,
        };
        assert!(journey.reached(FunnelStage::Landing));
        assert!(journey.reached(FunnelStage::Signup));
        assert!(!journey.reached(FunnelStage::ProductView));
        assert!(journey.purchase_value().is_none());
        assert!(journey.total_journey_minutes().is_none());
        assert_eq!(
            journey.reached_at(FunnelStage::Signup),
            Some(journey.profile().landing_at + Duration::minutes(10))
        );
        assert_eq!(journey.reached_at(FunnelStage::AddToCart), None);
    }

    #[test]
    fn test_converted_journey_accessors() {
        let profile = make_profile("Email", "Desktop");
        let visits = [
            visit(&profile, FunnelStage::Signup, 5),
            visit(&profile, FunnelStage::ProductView, 20),
            visit(&profile, FunnelStage::AddToCart, 40),
            visit(&profile, FunnelStage::Purchase, 70),
        ];
        let journey = Journey::Converted {
            profile,
            visits,
            purchase_value: 66.5,
            total_journey_minutes: 70,
        };
        assert_eq!(journey.exit_stage(), FunnelStage::Purchase);
        assert!(FunnelStage::ALL.iter().all(|s| journey.reached(*s)));
        assert_eq!(journey.purchase_value(), Some(66.5));
        assert_eq!(journey.total_journey_minutes(), Some(70));
    }

    #[test]
    fn test_cohort_month() {
        assert_eq!(make_profile("Direct", "Tablet").cohort_month(), "2024-03");
    }
}
