//! Decision engine for the bid bot.
//!
//! Everything here is deterministic given its inputs: AOV resolution,
//! performance tier classification, the bid formula, budget pacing
//! assessment, and the min-winning-bid bisection. External effects
//! (warehouse reads, ads platform writes) stay behind traits.

pub mod aov;
pub mod bid;
pub mod minwin;
pub mod pacing;
pub mod plan;
pub mod tier;

pub use aov::{aov_tier, AovResolver};
pub use bid::{round_bid, BidCalculator};
pub use minwin::{BidProbe, MinWinSearch, Observation, ProbeRecord, SearchOutcome};
pub use pacing::{reduced_bid, PacingMonitor, TriggerLedger};
pub use plan::{build_plan, OptimizationPlan, RunTotals};
pub use tier::TierClassifier;
