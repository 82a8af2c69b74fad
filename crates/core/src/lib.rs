//! Shared vocabulary for the marketing funnel simulator: configuration,
//! error taxonomy, and the ordered funnel stages.

pub mod config;
pub mod error;
pub mod types;

pub use config::SimulationConfig;
pub use error::{FunnelError, FunnelResult};
pub use types::FunnelStage;
