use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use funnel_core::config::SimulationConfig;
use funnel_core::FunnelResult;

use crate::profile::ProfileGenerator;
use crate::simulator::StageWalkSimulator;
use crate::types::Journey;

const PROGRESS_INTERVAL: u64 = 10_000;

/// Upper bound on up-front allocation; larger runs grow the vector.
const MAX_PREALLOCATED: usize = 1 << 20;

/// Produces the synthetic dataset: one `Journey` per simulated user.
///
/// The default path draws every user from a single ChaCha8 stream seeded
/// with `random_seed`, so a given configuration always yields the same
/// journeys in the same order. [`JourneyGenerator::generate_user`] instead
/// derives an independent stream per user index, which lets callers split
/// the user range across workers and still get reproducible output.
#[derive(Debug, Clone)]
pub struct JourneyGenerator {
    profiles: ProfileGenerator,
    simulator: StageWalkSimulator,
    user_count: u64,
    seed: u64,
}

impl JourneyGenerator {
    /// Validates `config` and prepares the samplers. Fails before any
    /// user is generated if the configuration is invalid.
    pub fn new(config: &SimulationConfig) -> FunnelResult<Self> {
        config.validate()?;
        Ok(Self {
            profiles: ProfileGenerator::new(config)?,
            simulator: StageWalkSimulator::new(config)?,
            user_count: config.user_count,
            seed: config.random_seed,
        })
    }

    pub fn user_count(&self) -> u64 {
        self.user_count
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn simulator(&self) -> &StageWalkSimulator {
        &self.simulator
    }

    /// Generates all configured users from the seeded serial stream.
    pub fn generate(&self) -> FunnelResult<Vec<Journey>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.generate_with(&mut rng)
    }

    /// Generates all configured users from a caller-supplied stream.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> FunnelResult<Vec<Journey>> {
        info!(users = self.user_count, seed = self.seed, "Generating funnel journeys");

        let mut journeys = Vec::with_capacity(initial_capacity(self.user_count));
        let mut converted = 0u64;
        for index in 0..self.user_count {
            let journey = self.generate_one(index, rng)?;
            if journey.is_converted() {
                converted += 1;
            }
            journeys.push(journey);

            if (index + 1) % PROGRESS_INTERVAL == 0 {
                debug!(processed = index + 1, "Generation progress");
            }
        }

        info!(
            users = journeys.len(),
            converted,
            "Generated funnel journeys"
        );
        Ok(journeys)
    }

    /// Generates user `index` from its own derived stream.
    pub fn generate_user(&self, index: u64) -> FunnelResult<Journey> {
        let mut rng = per_user_rng(self.seed, index);
        self.generate_one(index, &mut rng)
    }

    /// Generates a contiguous shard of users from per-user streams. Shards
    /// concatenated in index order equal one call over the whole range.
    pub fn generate_shard(&self, indices: Range<u64>) -> FunnelResult<Vec<Journey>> {
        debug!(start = indices.start, end = indices.end, "Generating shard");
        indices.map(|index| self.generate_user(index)).collect()
    }

    fn generate_one<R: Rng + ?Sized>(&self, index: u64, rng: &mut R) -> FunnelResult<Journey> {
        let profile = self.profiles.generate(index, rng);
        self.simulator.walk(profile, rng)
    }
}

fn initial_capacity(user_count: u64) -> usize {
    usize::try_from(user_count)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATED)
}

/// Independent stream for user `index`: the global seed selects the key
/// and the user index selects the ChaCha stream.
pub fn per_user_rng(seed: u64, index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index);
    rng
}
