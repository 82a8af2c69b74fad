use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FunnelError, FunnelResult};
use crate::types::FunnelStage;

/// Root simulation configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `FUNNEL_SIM__`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_user_count")]
    pub user_count: u64,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelSpec>,
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub base_rates: BaseRates,
    #[serde(default)]
    pub demographics: DemographicsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Inclusive window landing timestamps are drawn from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default = "default_start")]
    pub start: DateTime<Utc>,
    #[serde(default = "default_end")]
    pub end: DateTime<Utc>,
}

/// Acquisition channel with its selection weight and conversion multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub weight: f64,
    pub conversion_multiplier: f64,
    /// Marketing cost per landing session; falls back to
    /// `reporting.default_cost_per_session`.
    #[serde(default)]
    pub cost_per_session: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub weight: f64,
    pub conversion_multiplier: f64,
}

/// A label drawn from a categorical distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedLabel {
    pub label: String,
    pub weight: f64,
}

/// Base probability of converting into each non-landing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRates {
    #[serde(default = "default_landing_to_signup")]
    pub landing_to_signup: f64,
    #[serde(default = "default_signup_to_product_view")]
    pub signup_to_product_view: f64,
    #[serde(default = "default_product_view_to_cart")]
    pub product_view_to_cart: f64,
    #[serde(default = "default_cart_to_purchase")]
    pub cart_to_purchase: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemographicsConfig {
    #[serde(default = "default_age_groups")]
    pub age_groups: Vec<WeightedLabel>,
    #[serde(default = "default_locations")]
    pub locations: Vec<WeightedLabel>,
}

// Default functions
fn default_user_count() -> u64 {
    75_000
}

fn default_random_seed() -> u64 {
    42
}

fn utc_midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_default()
}

fn default_start() -> DateTime<Utc> {
    utc_midnight(2024, 1, 1)
}

fn default_end() -> DateTime<Utc> {
    utc_midnight(2024, 10, 31)
}

fn channel(name: &str, weight: f64, conversion_multiplier: f64, cost: f64) -> ChannelSpec {
    ChannelSpec {
        name: name.to_string(),
        weight,
        conversion_multiplier,
        cost_per_session: Some(cost),
    }
}

fn default_channels() -> Vec<ChannelSpec> {
    vec![
        channel("Organic Search", 0.25, 1.4, 15.0),
        channel("Paid Search", 0.20, 1.1, 35.0),
        channel("Social Media", 0.20, 0.7, 28.0),
        channel("Email", 0.15, 1.8, 5.0),
        channel("Direct", 0.12, 1.3, 8.0),
        channel("Referral", 0.08, 1.2, 12.0),
    ]
}

fn device(name: &str, weight: f64, conversion_multiplier: f64) -> DeviceSpec {
    DeviceSpec {
        name: name.to_string(),
        weight,
        conversion_multiplier,
    }
}

fn default_devices() -> Vec<DeviceSpec> {
    vec![
        device("Desktop", 0.45, 1.3),
        device("Mobile", 0.45, 0.6),
        device("Tablet", 0.10, 0.9),
    ]
}

fn default_landing_to_signup() -> f64 {
    0.40
}

fn default_signup_to_product_view() -> f64 {
    0.62
}

fn default_product_view_to_cart() -> f64 {
    0.48
}

fn default_cart_to_purchase() -> f64 {
    0.33
}

fn labels(pairs: &[(&str, f64)]) -> Vec<WeightedLabel> {
    pairs
        .iter()
        .map(|(label, weight)| WeightedLabel {
            label: label.to_string(),
            weight: *weight,
        })
        .collect()
}

fn default_age_groups() -> Vec<WeightedLabel> {
    labels(&[
        ("18-24", 0.15),
        ("25-34", 0.35),
        ("35-44", 0.25),
        ("45-54", 0.15),
        ("55+", 0.10),
    ])
}

fn default_locations() -> Vec<WeightedLabel> {
    labels(&[("Urban", 0.50), ("Suburban", 0.35), ("Rural", 0.15)])
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
        }
    }
}

impl Default for BaseRates {
    fn default() -> Self {
        Self {
            landing_to_signup: default_landing_to_signup(),
            signup_to_product_view: default_signup_to_product_view(),
            product_view_to_cart: default_product_view_to_cart(),
            cart_to_purchase: default_cart_to_purchase(),
        }
    }
}

impl BaseRates {
    /// Base rate for converting *into* `stage`. Landing is unconditional.
    pub fn for_stage(&self, stage: FunnelStage) -> f64 {
        match stage {
            FunnelStage::Landing => 1.0,
            FunnelStage::Signup => self.landing_to_signup,
            FunnelStage::ProductView => self.signup_to_product_view,
            FunnelStage::AddToCart => self.product_view_to_cart,
            FunnelStage::Purchase => self.cart_to_purchase,
        }
    }
}

impl Default for DemographicsConfig {
    fn default() -> Self {
        Self {
            age_groups: default_age_groups(),
            locations: default_locations(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            user_count: default_user_count(),
            random_seed: default_random_seed(),
            date_range: DateRange::default(),
            channels: default_channels(),
            devices: default_devices(),
            base_rates: BaseRates::default(),
            demographics: DemographicsConfig::default(),
            model: ModelConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

// ─── Model Config ───────────────────────────────────────────────────────────

/// Knobs of the per-transition conversion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Half-width of the multiplicative jitter band `[1 - w, 1 + w]`.
    /// Zero disables the jitter draw.
    #[serde(default = "default_jitter_width")]
    pub jitter_width: f64,
    #[serde(default = "default_probability_cap")]
    pub probability_cap: f64,
    #[serde(default = "default_time_improvement_coeff")]
    pub time_improvement_coeff: f64,
    #[serde(default = "default_purchase_log_mean")]
    pub purchase_log_mean: f64,
    #[serde(default = "default_purchase_log_sigma")]
    pub purchase_log_sigma: f64,
    #[serde(default)]
    pub stage_delays: StageDelays,
}

/// Whole-minute bounds (inclusive) for the wait before a stage is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_minutes: u32,
    pub max_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDelays {
    #[serde(default = "default_signup_delay")]
    pub signup: DelayRange,
    #[serde(default = "default_product_view_delay")]
    pub product_view: DelayRange,
    #[serde(default = "default_add_to_cart_delay")]
    pub add_to_cart: DelayRange,
    #[serde(default = "default_purchase_delay")]
    pub purchase: DelayRange,
}

fn default_jitter_width() -> f64 {
    0.1
}

fn default_probability_cap() -> f64 {
    0.95
}

fn default_time_improvement_coeff() -> f64 {
    0.002
}

fn default_purchase_log_mean() -> f64 {
    4.2
}

fn default_purchase_log_sigma() -> f64 {
    0.6
}

fn delay(min_minutes: u32, max_minutes: u32) -> DelayRange {
    DelayRange {
        min_minutes,
        max_minutes,
    }
}

fn default_signup_delay() -> DelayRange {
    delay(1, 30)
}

fn default_product_view_delay() -> DelayRange {
    delay(2, 45)
}

fn default_add_to_cart_delay() -> DelayRange {
    delay(3, 60)
}

fn default_purchase_delay() -> DelayRange {
    delay(5, 90)
}

impl Default for StageDelays {
    fn default() -> Self {
        Self {
            signup: default_signup_delay(),
            product_view: default_product_view_delay(),
            add_to_cart: default_add_to_cart_delay(),
            purchase: default_purchase_delay(),
        }
    }
}

impl StageDelays {
    /// Delay range for reaching `stage`; landing has no delay.
    pub fn for_stage(&self, stage: FunnelStage) -> DelayRange {
        match stage {
            FunnelStage::Landing => delay(0, 0),
            FunnelStage::Signup => self.signup,
            FunnelStage::ProductView => self.product_view,
            FunnelStage::AddToCart => self.add_to_cart,
            FunnelStage::Purchase => self.purchase,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            jitter_width: default_jitter_width(),
            probability_cap: default_probability_cap(),
            time_improvement_coeff: default_time_improvement_coeff(),
            purchase_log_mean: default_purchase_log_mean(),
            purchase_log_sigma: default_purchase_log_sigma(),
            stage_delays: StageDelays::default(),
        }
    }
}

// ─── Reporting Config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_cost_per_session")]
    pub default_cost_per_session: f64,
    /// Budget shifts beyond this many share points become recommendations.
    #[serde(default = "default_budget_change_threshold_pct")]
    pub budget_change_threshold_pct: f64,
    #[serde(default = "default_time_decay_scale_minutes")]
    pub time_decay_scale_minutes: f64,
}

fn default_cost_per_session() -> f64 {
    20.0
}

fn default_budget_change_threshold_pct() -> f64 {
    5.0
}

fn default_time_decay_scale_minutes() -> f64 {
    100.0
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            default_cost_per_session: default_cost_per_session(),
            budget_change_threshold_pct: default_budget_change_threshold_pct(),
            time_decay_scale_minutes: default_time_decay_scale_minutes(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from an optional TOML file overlaid with
    /// `FUNNEL_SIM__*` environment variables.
    pub fn load(path: Option<&Path>) -> FunnelResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("FUNNEL_SIM")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Cost per session for `channel`, falling back to the reporting default.
    pub fn cost_per_session(&self, channel: &str) -> f64 {
        self.channels
            .iter()
            .find(|c| c.name == channel)
            .and_then(|c| c.cost_per_session)
            .unwrap_or(self.reporting.default_cost_per_session)
    }

    /// Reject configurations that would make generation meaningless.
    /// A zero `user_count` is valid and yields an empty dataset.
    pub fn validate(&self) -> FunnelResult<()> {
        if self.date_range.end < self.date_range.start {
            return Err(FunnelError::config(format!(
                "date_range.end ({}) is before date_range.start ({})",
                self.date_range.end, self.date_range.start
            )));
        }

        validate_table(
            "channels",
            self.channels.iter().map(|c| (c.name.as_str(), c.weight)),
        )?;
        validate_table(
            "devices",
            self.devices.iter().map(|d| (d.name.as_str(), d.weight)),
        )?;
        validate_table(
            "demographics.age_groups",
            self.demographics
                .age_groups
                .iter()
                .map(|a| (a.label.as_str(), a.weight)),
        )?;
        validate_table(
            "demographics.locations",
            self.demographics
                .locations
                .iter()
                .map(|l| (l.label.as_str(), l.weight)),
        )?;

        for c in &self.channels {
            ensure_positive_multiplier("channel", &c.name, c.conversion_multiplier)?;
            if let Some(cost) = c.cost_per_session {
                if !(cost.is_finite() && cost >= 0.0) {
                    return Err(FunnelError::config(format!(
                        "channel '{}' cost_per_session must be >= 0, got {}",
                        c.name, cost
                    )));
                }
            }
        }
        for d in &self.devices {
            ensure_positive_multiplier("device", &d.name, d.conversion_multiplier)?;
        }

        for stage in FunnelStage::TRANSITIONS {
            let rate = self.base_rates.for_stage(stage);
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(FunnelError::config(format!(
                    "base rate into {} must be in (0, 1], got {}",
                    stage, rate
                )));
            }
            let range = self.model.stage_delays.for_stage(stage);
            if range.min_minutes > range.max_minutes {
                return Err(FunnelError::config(format!(
                    "delay range for {} has min {} > max {}",
                    stage, range.min_minutes, range.max_minutes
                )));
            }
        }

        let m = &self.model;
        if !(m.jitter_width >= 0.0 && m.jitter_width < 1.0) {
            return Err(FunnelError::config(format!(
                "model.jitter_width must be in [0, 1), got {}",
                m.jitter_width
            )));
        }
        if !(m.probability_cap > 0.0 && m.probability_cap <= 1.0) {
            return Err(FunnelError::config(format!(
                "model.probability_cap must be in (0, 1], got {}",
                m.probability_cap
            )));
        }
        if !m.time_improvement_coeff.is_finite() {
            return Err(FunnelError::config("model.time_improvement_coeff must be finite"));
        }
        if !(m.purchase_log_mean.is_finite()
            && m.purchase_log_sigma.is_finite()
            && m.purchase_log_sigma >= 0.0)
        {
            return Err(FunnelError::config(format!(
                "purchase value distribution needs finite mean and sigma >= 0, \
                 got mean={} sigma={}",
                m.purchase_log_mean, m.purchase_log_sigma
            )));
        }

        let r = &self.reporting;
        if !(r.default_cost_per_session.is_finite() && r.default_cost_per_session >= 0.0) {
            return Err(FunnelError::config(
                "reporting.default_cost_per_session must be >= 0",
            ));
        }
        if !(r.time_decay_scale_minutes > 0.0) {
            return Err(FunnelError::config(
                "reporting.time_decay_scale_minutes must be > 0",
            ));
        }

        Ok(())
    }
}

/// A weight table must be non-empty, have unique names, non-negative
/// weights, and a positive finite total.
fn validate_table<'a>(
    table: &str,
    entries: impl Iterator<Item = (&'a str, f64)>,
) -> FunnelResult<()> {
    let mut seen = HashSet::new();
    let mut total = 0.0;
    for (name, weight) in entries {
        if !seen.insert(name) {
            return Err(FunnelError::config(format!(
                "{table}: duplicate entry '{name}'"
            )));
        }
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(FunnelError::config(format!(
                "{table}: weight for '{name}' must be >= 0, got {weight}"
            )));
        }
        total += weight;
    }
    if seen.is_empty() {
        return Err(FunnelError::config(format!("{table}: table is empty")));
    }
    if total <= 0.0 {
        return Err(FunnelError::config(format!(
            "{table}: weights sum to zero"
        )));
    }
    if !total.is_finite() {
        return Err(FunnelError::config(format!("{table}: weights overflow")));
    }
    Ok(())
}

fn ensure_positive_multiplier(kind: &str, name: &str, value: f64) -> FunnelResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FunnelError::config(format!(
            "{kind} '{name}' conversion_multiplier must be > 0, got {value}"
        )))
    }
}
