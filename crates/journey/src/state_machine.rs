use std::fmt;

use serde::{Deserialize, Serialize};

use funnel_core::{FunnelError, FunnelResult, FunnelStage};

/// Position of a user in the funnel walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelState {
    Landing,
    Signup,
    ProductView,
    AddToCart,
    Purchased,
    /// Stopped after reaching the given stage.
    ExitedAt(FunnelStage),
}

impl FunnelState {
    /// The in-progress state for a reached stage.
    pub fn at(stage: FunnelStage) -> Self {
        match stage {
            FunnelStage::Landing => FunnelState::Landing,
            FunnelStage::Signup => FunnelState::Signup,
            FunnelStage::ProductView => FunnelState::ProductView,
            FunnelStage::AddToCart => FunnelState::AddToCart,
            FunnelStage::Purchase => FunnelState::Purchased,
        }
    }

    /// Last stage the user reached.
    pub fn stage(self) -> FunnelStage {
        match self {
            FunnelState::Landing => FunnelStage::Landing,
            FunnelState::Signup => FunnelStage::Signup,
            FunnelState::ProductView => FunnelStage::ProductView,
            FunnelState::AddToCart => FunnelStage::AddToCart,
            FunnelState::Purchased => FunnelStage::Purchase,
            FunnelState::ExitedAt(stage) => stage,
        }
    }

    /// Stage the user would convert into next, if the walk is still open.
    pub fn target(self) -> Option<FunnelStage> {
        if self.is_terminal() {
            None
        } else {
            self.stage().next()
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FunnelState::Purchased | FunnelState::ExitedAt(_))
    }
}

impl fmt::Display for FunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunnelState::ExitedAt(stage) => write!(f, "exited at {stage}"),
            other => write!(f, "{}", other.stage()),
        }
    }
}

/// Guards a single user's walk: from any open state the only moves are
/// one stage forward or an exit at the current stage.
#[derive(Debug, Clone)]
pub struct FunnelStateMachine {
    state: FunnelState,
}

impl FunnelStateMachine {
    /// Every walk starts at landing.
    pub fn new() -> Self {
        Self {
            state: FunnelState::Landing,
        }
    }

    pub fn state(&self) -> FunnelState {
        self.state
    }

    /// Returns `true` if moving from `from` to `to` is allowed.
    pub fn can_transition(from: FunnelState, to: FunnelState) -> bool {
        match from.target() {
            None => false,
            Some(next) => to == FunnelState::at(next) || to == FunnelState::ExitedAt(from.stage()),
        }
    }

    /// Moves to `to`, or fails if the move would skip, repeat, or leave a
    /// terminal state.
    pub fn transition(&mut self, to: FunnelState) -> FunnelResult<()> {
        if Self::can_transition(self.state, to) {
            self.state = to;
            Ok(())
        } else {
            Err(FunnelError::InvalidTransition(format!(
                "{} -> {}",
                self.state, to
            )))
        }
    }
}

impl Default for FunnelStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
