//! Funnel journey simulation: synthetic visitors walked through the
//! five-stage marketing funnel (Landing, Signup, Product View, Add to Cart,
//! Purchase) with channel- and device-dependent conversion odds.

pub mod export;
pub mod generator;
pub mod profile;
pub mod simulator;
pub mod state_machine;
pub mod types;

pub use export::{dataset_csv, write_dataset, JourneyRecord, DATASET_COLUMNS};
pub use generator::{per_user_rng, JourneyGenerator};
pub use profile::ProfileGenerator;
pub use simulator::{StageWalkSimulator, Transition};
pub use state_machine::{FunnelState, FunnelStateMachine};
pub use types::{Journey, StageVisit, UserProfile};
