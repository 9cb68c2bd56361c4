//! Plan generation and failure-aware adaptation.
//!
//! The [`Planner`] asks the LLM for candidate [`PlanNode`]s; the
//! [`FailureCatalogue`] then rewrites or demerits plans that match known
//! failure patterns before the orchestrator scores and picks one.

mod failure;
mod plan;
mod planner;

pub use failure::{FailureCatalogue, FailurePattern, HARD_BLOCK_THRESHOLD};
pub use plan::{PlanMetadata, PlanNode, Scenario, ScenarioOutcome};
pub use planner::Planner;
