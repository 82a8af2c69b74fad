//! Profile generation: draws channel, device, demographics and landing
//! time for each simulated user.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use funnel_core::config::SimulationConfig;
use funnel_core::{FunnelError, FunnelResult};

use crate::types::UserProfile;

const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;

/// A categorical table with a prebuilt sampler.
#[derive(Debug, Clone)]
struct WeightedTable {
    labels: Vec<String>,
    multipliers: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl WeightedTable {
    fn new<'a>(
        table: &str,
        entries: impl Iterator<Item = (&'a str, f64, f64)>,
    ) -> FunnelResult<Self> {
        let mut labels = Vec::new();
        let mut multipliers = Vec::new();
        let mut weights = Vec::new();
        for (label, weight, multiplier) in entries {
            labels.push(label.to_string());
            weights.push(weight);
            multipliers.push(multiplier);
        }
        let index = WeightedIndex::new(&weights)
            .map_err(|e| FunnelError::config(format!("{table}: {e}")))?;
        Ok(Self {
            labels,
            multipliers,
            index,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (&str, f64) {
        let i = self.index.sample(rng);
        (self.labels[i].as_str(), self.multipliers[i])
    }
}

/// Draws one `UserProfile` per user index. Each profile takes five
/// samples, in this order: channel, device, landing offset, age group,
/// location.
#[derive(Debug, Clone)]
pub struct ProfileGenerator {
    channels: WeightedTable,
    devices: WeightedTable,
    age_groups: WeightedTable,
    locations: WeightedTable,
    range_start: DateTime<Utc>,
    range_seconds: u64,
}

impl ProfileGenerator {
    pub fn new(config: &SimulationConfig) -> FunnelResult<Self> {
        let channels = WeightedTable::new(
            "channels",
            config
                .channels
                .iter()
                .map(|c| (c.name.as_str(), c.weight, c.conversion_multiplier)),
        )?;
        let devices = WeightedTable::new(
            "devices",
            config
                .devices
                .iter()
                .map(|d| (d.name.as_str(), d.weight, d.conversion_multiplier)),
        )?;
        let age_groups = WeightedTable::new(
            "demographics.age_groups",
            config
                .demographics
                .age_groups
                .iter()
                .map(|a| (a.label.as_str(), a.weight, 1.0)),
        )?;
        let locations = WeightedTable::new(
            "demographics.locations",
            config
                .demographics
                .locations
                .iter()
                .map(|l| (l.label.as_str(), l.weight, 1.0)),
        )?;

        let span = config.date_range.end - config.date_range.start;
        let range_seconds = u64::try_from(span.num_seconds()).map_err(|_| {
            FunnelError::config("date_range.end is before date_range.start")
        })?;

        Ok(Self {
            channels,
            devices,
            age_groups,
            locations,
            range_start: config.date_range.start,
            range_seconds,
        })
    }

    /// Draw the profile for the zero-based user `index`.
    pub fn generate<R: Rng + ?Sized>(&self, index: u64, rng: &mut R) -> UserProfile {
        let (channel, channel_multiplier) = self.channels.sample(rng);
        let (device, device_multiplier) = self.devices.sample(rng);
        let offset_seconds = rng.gen_range(0..=self.range_seconds) as i64;
        let (age_group, _) = self.age_groups.sample(rng);
        let (location, _) = self.locations.sample(rng);

        UserProfile {
            user_id: format!("U{:06}", index + 1),
            channel: channel.to_string(),
            channel_multiplier,
            device: device.to_string(),
            device_multiplier,
            age_group: age_group.to_string(),
            location: location.to_string(),
            landing_at: self.range_start + Duration::seconds(offset_seconds),
            cohort_week: (offset_seconds / SECONDS_PER_WEEK) as u32,
        }
    }
}
