//! Flat, fixed-schema export of the journey dataset.
//!
//! Every row carries every column; stage-conditional values are left as
//! empty cells instead of being dropped.

use std::io::Write;

use chrono::{DateTime, Utc};

use funnel_core::{FunnelResult, FunnelStage};

use crate::types::Journey;

pub const DATASET_COLUMNS: [&str; 24] = [
    "user_id",
    "channel",
    "device",
    "age_group",
    "location",
    "cohort_week",
    "cohort_month",
    "stage_1_landing",
    "landing_timestamp",
    "stage_2_signup",
    "signup_timestamp",
    "landing_to_signup_minutes",
    "stage_3_product_view",
    "product_view_timestamp",
    "signup_to_product_minutes",
    "stage_4_add_to_cart",
    "add_to_cart_timestamp",
    "product_to_cart_minutes",
    "stage_5_purchase",
    "purchase_timestamp",
    "cart_to_purchase_minutes",
    "purchase_value",
    "exit_stage",
    "total_journey_minutes",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reach flag plus the optional timestamp and elapsed minutes of one
/// non-landing stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageColumns {
    pub reached: u8,
    pub timestamp: Option<DateTime<Utc>>,
    pub minutes_from_previous: Option<u32>,
}

/// One row of the exported dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyRecord {
    pub user_id: String,
    pub channel: String,
    pub device: String,
    pub age_group: String,
    pub location: String,
    pub cohort_week: u32,
    pub cohort_month: String,
    pub landing_timestamp: DateTime<Utc>,
    /// Signup, product view, add to cart, purchase.
    pub stages: [StageColumns; 4],
    pub purchase_value: Option<f64>,
    pub exit_stage: FunnelStage,
    pub total_journey_minutes: Option<u32>,
}

impl From<&Journey> for JourneyRecord {
    fn from(journey: &Journey) -> Self {
        let profile = journey.profile();
        let mut stages: [StageColumns; 4] = Default::default();
        for (slot, stage) in stages.iter_mut().zip(FunnelStage::TRANSITIONS) {
            if let Some(visit) = journey.visit(stage) {
                *slot = StageColumns {
                    reached: 1,
                    timestamp: Some(visit.at),
                    minutes_from_previous: Some(visit.minutes_from_previous),
                };
            }
        }

        Self {
            user_id: profile.user_id.clone(),
            channel: profile.channel.clone(),
            device: profile.device.clone(),
            age_group: profile.age_group.clone(),
            location: profile.location.clone(),
            cohort_week: profile.cohort_week,
            cohort_month: profile.cohort_month(),
            landing_timestamp: profile.landing_at,
            stages,
            purchase_value: journey.purchase_value(),
            exit_stage: journey.exit_stage(),
            total_journey_minutes: journey.total_journey_minutes(),
        }
    }
}

impl JourneyRecord {
    /// Cells in `DATASET_COLUMNS` order.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(DATASET_COLUMNS.len());
        cells.push(quote(&self.user_id));
        cells.push(quote(&self.channel));
        cells.push(quote(&self.device));
        cells.push(quote(&self.age_group));
        cells.push(quote(&self.location));
        cells.push(self.cohort_week.to_string());
        cells.push(self.cohort_month.clone());
        cells.push("1".to_string());
        cells.push(format_timestamp(&self.landing_timestamp));
        for stage in &self.stages {
            cells.push(stage.reached.to_string());
            cells.push(stage.timestamp.as_ref().map(format_timestamp).unwrap_or_default());
            cells.push(optional(stage.minutes_from_previous));
        }
        cells.push(
            self.purchase_value
                .map(|v| format!("{v:.2}"))
                .unwrap_or_default(),
        );
        cells.push(self.exit_stage.label().to_string());
        cells.push(optional(self.total_journey_minutes));
        cells
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn optional(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quotes a text cell only when it contains a delimiter, quote or newline.
pub fn quote(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes the header row and one row per journey.
pub fn write_dataset<W: Write>(journeys: &[Journey], mut writer: W) -> FunnelResult<()> {
    writeln!(writer, "{}", DATASET_COLUMNS.join(","))?;
    for journey in journeys {
        let record = JourneyRecord::from(journey);
        writeln!(writer, "{}", record.cells().join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// The whole dataset as one CSV string.
pub fn dataset_csv(journeys: &[Journey]) -> FunnelResult<String> {
    let mut buf = Vec::new();
    write_dataset(journeys, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::JourneyGenerator;
    use crate::types::tests::make_profile;
    use crate::types::StageVisit;
    use chrono::Duration;
    use funnel_core::SimulationConfig;

    fn exited_after_signup() -> Journey {
        let profile = make_profile("Paid Search", "Mobile");
        let signup = StageVisit {
            stage: FunnelStage::Signup,
            at: profile.landing_at + Duration::minutes(12),
            minutes_from_previous: 12,
        };
        Journey::Exited {
            profile,
            exit_stage: FunnelStage::Signup,
            visits: vec![signup],
        }
    }

    #[test]
    fn test_header_and_row_width() {
        let csv = dataset_csv(&[exited_after_signup()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), DATASET_COLUMNS.join(","));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row.len(), DATASET_COLUMNS.len());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_exited_row_leaves_later_stages_empty() {
        let record = JourneyRecord::from(&exited_after_signup());
        let cells = record.cells();
        let col = |name: &str| {
            let i = DATASET_COLUMNS.iter().position(|c| *c == name).unwrap();
            cells[i].clone()
        };
        assert_eq!(col("user_id"), "U000001");
        assert_eq!(col("cohort_month"), "2024-03");
        assert_eq!(col("stage_1_landing"), "1");
        assert_eq!(col("landing_timestamp"), "2024-03-05 10:00:00");
        assert_eq!(col("stage_2_signup"), "1");
        assert_eq!(col("signup_timestamp"), "2024-03-05 10:12:00");
        assert_eq!(col("landing_to_signup_minutes"), "12");
        assert_eq!(col("stage_3_product_view"), "0");
        assert_eq!(col("product_view_timestamp"), "");
        assert_eq!(col("stage_5_purchase"), "0");
        assert_eq!(col("purchase_value"), "");
        assert_eq!(col("exit_stage"), "Signup");
        assert_eq!(col("total_journey_minutes"), "");
    }

    #[test]
    fn test_quote_only_when_needed() {
        assert_eq!(quote("Organic Search"), "Organic Search");
        assert_eq!(quote("Search, Paid"), "\"Search, Paid\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_generated_dataset_is_byte_identical_across_runs() {
        let cfg = SimulationConfig {
            user_count: 3_000,
            ..Default::default()
        };
        let a = dataset_csv(&JourneyGenerator::new(&cfg).unwrap().generate().unwrap()).unwrap();
        let b = dataset_csv(&JourneyGenerator::new(&cfg).unwrap().generate().unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lines().count(), 3_001);
    }

    #[test]
    fn test_flags_are_prefix_in_every_row() {
        let cfg = SimulationConfig {
            user_count: 2_000,
            ..Default::default()
        };
        let journeys = JourneyGenerator::new(&cfg).unwrap().generate().unwrap();
        for journey in &journeys {
            let record = JourneyRecord::from(journey);
            let flags: Vec<u8> = record.stages.iter().map(|s| s.reached).collect();
            assert!(flags.windows(2).all(|w| w[0] >= w[1]), "flags {flags:?}");
            assert_eq!(record.purchase_value.is_some(), flags[3] == 1);
            assert_eq!(record.total_journey_minutes.is_some(), flags[3] == 1);
        }
    }

    #[test]
    fn test_empty_dataset_is_header_only() {
        let csv = dataset_csv(&[]).unwrap();
        assert_eq!(csv, format!("{}\n", DATASET_COLUMNS.join(",")));
    }
}
