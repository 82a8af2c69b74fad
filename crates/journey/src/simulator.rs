//! Stage-walk simulation: moves one profile through the funnel, one
//! Bernoulli trial per transition, until it purchases or drops out.

use chrono::Duration;
use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use serde::{Deserialize, Serialize};

use funnel_core::config::{BaseRates, SimulationConfig, StageDelays};
use funnel_core::{FunnelError, FunnelResult, FunnelStage};

use crate::state_machine::{FunnelState, FunnelStateMachine};
use crate::types::{Journey, StageVisit, UserProfile};

/// Result of one call to [`StageWalkSimulator::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub next: FunnelState,
    /// Probability the trial was drawn against, after clamping.
    pub probability: f64,
    /// Minutes spent reaching `next`; only set when the user advanced.
    pub delay_minutes: Option<u32>,
}

/// Per-transition conversion model.
#[derive(Debug, Clone)]
pub struct StageWalkSimulator {
    base_rates: BaseRates,
    delays: StageDelays,
    jitter_width: f64,
    probability_cap: f64,
    time_improvement_coeff: f64,
    purchase_value: LogNormal<f64>,
}

impl StageWalkSimulator {
    pub fn new(config: &SimulationConfig) -> FunnelResult<Self> {
        let model = &config.model;
        let purchase_value = LogNormal::new(model.purchase_log_mean, model.purchase_log_sigma)
            .map_err(|e| FunnelError::config(format!("purchase value distribution: {e}")))?;

        Ok(Self {
            base_rates: config.base_rates.clone(),
            delays: config.model.stage_delays.clone(),
            jitter_width: model.jitter_width,
            probability_cap: model.probability_cap,
            time_improvement_coeff: model.time_improvement_coeff,
            purchase_value,
        })
    }

    pub fn probability_cap(&self) -> f64 {
        self.probability_cap
    }

    /// Conversion probability into `stage` for a given jitter factor,
    /// clamped to `[0, probability_cap]`.
    pub fn conversion_probability(
        &self,
        stage: FunnelStage,
        profile: &UserProfile,
        jitter: f64,
    ) -> f64 {
        let time_improvement = 1.0 + f64::from(profile.cohort_week) * self.time_improvement_coeff;
        let raw = self.base_rates.for_stage(stage)
            * profile.channel_multiplier
            * profile.device_multiplier
            * time_improvement
            * jitter;
        if raw.is_nan() {
            return 0.0;
        }
        raw.clamp(0.0, self.probability_cap)
    }

    /// Jitter is redrawn on every call, never fixed per user.
    fn draw_jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.jitter_width > 0.0 {
            rng.gen_range((1.0 - self.jitter_width)..=(1.0 + self.jitter_width))
        } else {
            1.0
        }
    }

    /// Draws the jitter and returns the effective probability into `stage`.
    pub fn effective_probability<R: Rng + ?Sized>(
        &self,
        stage: FunnelStage,
        profile: &UserProfile,
        rng: &mut R,
    ) -> f64 {
        let jitter = self.draw_jitter(rng);
        self.conversion_probability(stage, profile, jitter)
    }

    /// Transition function of the walk. Terminal states map to themselves
    /// without consuming randomness.
    pub fn transition<R: Rng + ?Sized>(
        &self,
        state: FunnelState,
        profile: &UserProfile,
        rng: &mut R,
    ) -> Transition {
        let Some(target) = state.target() else {
            return Transition {
                next: state,
                probability: 0.0,
                delay_minutes: None,
            };
        };

        let probability = self.effective_probability(target, profile, rng);
        if rng.gen::<f64>() < probability {
            let range = self.delays.for_stage(target);
            let minutes = rng.gen_range(range.min_minutes..=range.max_minutes);
            Transition {
                next: FunnelState::at(target),
                probability,
                delay_minutes: Some(minutes),
            }
        } else {
            Transition {
                next: FunnelState::ExitedAt(state.stage()),
                probability,
                delay_minutes: None,
            }
        }
    }

    /// Walks `profile` from landing to a terminal state.
    pub fn walk<R: Rng + ?Sized>(
        &self,
        profile: UserProfile,
        rng: &mut R,
    ) -> FunnelResult<Journey> {
        let mut machine = FunnelStateMachine::new();
        let mut at = profile.landing_at;
        let mut visits = Vec::with_capacity(FunnelStage::TRANSITIONS.len());

        while !machine.state().is_terminal() {
            let step = self.transition(machine.state(), &profile, rng);
            machine.transition(step.next)?;
            if let Some(minutes) = step.delay_minutes {
                at += Duration::minutes(i64::from(minutes));
                visits.push(StageVisit {
                    stage: step.next.stage(),
                    at,
                    minutes_from_previous: minutes,
                });
            }
        }

        match machine.state() {
            FunnelState::Purchased => {
                let purchase_value = round_cents(self.purchase_value.sample(rng));
                let total_journey_minutes = visits.iter().map(|v| v.minutes_from_previous).sum();
                let visits: [StageVisit; 4] = visits.try_into().map_err(|v: Vec<StageVisit>| {
                    FunnelError::InvalidTransition(format!(
                        "converted journey with {} visits",
                        v.len()
                    ))
                })?;
                Ok(Journey::Converted {
                    profile,
                    visits,
                    purchase_value,
                    total_journey_minutes,
                })
            }
            FunnelState::ExitedAt(exit_stage) => Ok(Journey::Exited {
                profile,
                exit_stage,
                visits,
            }),
            open => Err(FunnelError::InvalidTransition(format!(
                "walk stopped in open state {open}"
            ))),
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
