use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the five ordered funnel milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FunnelStage {
    Landing,
    Signup,
    #[serde(rename = "Product_View")]
    ProductView,
    #[serde(rename = "Add_to_Cart")]
    AddToCart,
    Purchase,
}

impl FunnelStage {
    /// All stages in funnel order.
    pub const ALL: [FunnelStage; 5] = [
        FunnelStage::Landing,
        FunnelStage::Signup,
        FunnelStage::ProductView,
        FunnelStage::AddToCart,
        FunnelStage::Purchase,
    ];

    /// The four stages a user has to convert into after landing.
    pub const TRANSITIONS: [FunnelStage; 4] = [
        FunnelStage::Signup,
        FunnelStage::ProductView,
        FunnelStage::AddToCart,
        FunnelStage::Purchase,
    ];

    /// 1-based position in the funnel.
    pub fn position(self) -> usize {
        match self {
            FunnelStage::Landing => 1,
            FunnelStage::Signup => 2,
            FunnelStage::ProductView => 3,
            FunnelStage::AddToCart => 4,
            FunnelStage::Purchase => 5,
        }
    }

    pub fn next(self) -> Option<FunnelStage> {
        match self {
            FunnelStage::Landing => Some(FunnelStage::Signup),
            FunnelStage::Signup => Some(FunnelStage::ProductView),
            FunnelStage::ProductView => Some(FunnelStage::AddToCart),
            FunnelStage::AddToCart => Some(FunnelStage::Purchase),
            FunnelStage::Purchase => None,
        }
    }

    pub fn previous(self) -> Option<FunnelStage> {
        match self {
            FunnelStage::Landing => None,
            FunnelStage::Signup => Some(FunnelStage::Landing),
            FunnelStage::ProductView => Some(FunnelStage::Signup),
            FunnelStage::AddToCart => Some(FunnelStage::ProductView),
            FunnelStage::Purchase => Some(FunnelStage::AddToCart),
        }
    }

    /// Label used in exported tables (`exit_stage` column).
    pub fn label(self) -> &'static str {
        match self {
            FunnelStage::Landing => "Landing",
            FunnelStage::Signup => "Signup",
            FunnelStage::ProductView => "Product_View",
            FunnelStage::AddToCart => "Add_to_Cart",
            FunnelStage::Purchase => "Purchase",
        }
    }

    /// Human-readable name used in report rows.
    pub fn display_name(self) -> &'static str {
        match self {
            FunnelStage::Landing => "Landing",
            FunnelStage::Signup => "Signup",
            FunnelStage::ProductView => "Product View",
            FunnelStage::AddToCart => "Add to Cart",
            FunnelStage::Purchase => "Purchase",
        }
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
