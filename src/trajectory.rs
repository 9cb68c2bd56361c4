//! Search events: the orchestrator's observable scratchpad.
//!
//! Every iteration appends typed events describing what the search did.
//! The final task report carries the event log so a host CLI or UI can
//! render progress or a post-mortem without parsing free text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Types of events emitted during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchEventType {
    /// Search started for a task
    SearchStart,
    /// Planner returned candidate plans
    PlansProposed,
    /// Failure catalogue rewrote or dropped a plan
    PlanAdapted,
    /// A plan was picked for execution
    PlanSelected,
    /// Tool execution finished
    ToolExec,
    /// Answer synthesis finished
    Synthesize,
    /// Validator verdict received
    Validate,
    /// Loop prevention triggered
    LoopCheck,
    /// Search terminated
    Terminate,
    /// Recoverable error inside an iteration
    Error,
}

impl std::fmt::Display for SearchEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SearchStart => "SEARCH_START",
            Self::PlansProposed => "PLANS_PROPOSED",
            Self::PlanAdapted => "PLAN_ADAPTED",
            Self::PlanSelected => "PLAN_SELECTED",
            Self::ToolExec => "TOOL_EXEC",
            Self::Synthesize => "SYNTHESIZE",
            Self::Validate => "VALIDATE",
            Self::LoopCheck => "LOOP_CHECK",
            Self::Terminate => "TERMINATE",
            Self::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// One entry in the search scratchpad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub event_type: SearchEventType,
    /// Iteration the event belongs to (0 = before the loop).
    pub iteration: u32,
    /// Human-readable description.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl SearchEvent {
    /// Create a new search event.
    pub fn new(event_type: SearchEventType, iteration: u32, content: impl Into<String>) -> Self {
        Self {
            event_type,
            iteration,
            content: content.into(),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Add metadata to the event.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    // Convenience constructors for common event types

    pub fn search_start(task: impl Into<String>) -> Self {
        Self::new(SearchEventType::SearchStart, 0, task)
    }

    pub fn plans_proposed(iteration: u32, count: usize) -> Self {
        Self::new(
            SearchEventType::PlansProposed,
            iteration,
            format!("{} plans proposed", count),
        )
        .with_metadata("count", count as u64)
    }

    pub fn plan_selected(iteration: u32, action: &str, score: f64) -> Self {
        Self::new(SearchEventType::PlanSelected, iteration, action)
            .with_metadata("score", score)
    }

    pub fn tool_exec(iteration: u32, tool: &str, success: bool) -> Self {
        Self::new(
            SearchEventType::ToolExec,
            iteration,
            format!("{} ({})", tool, if success { "ok" } else { "failed" }),
        )
        .with_metadata("success", success)
    }

    pub fn validate(iteration: u32, completed: bool, confidence: f64) -> Self {
        Self::new(
            SearchEventType::Validate,
            iteration,
            format!("completed={} confidence={:.2}", completed, confidence),
        )
        .with_metadata("completed", completed)
        .with_metadata("confidence", confidence)
    }

    pub fn terminate(iteration: u32, reason: impl Into<String>) -> Self {
        Self::new(SearchEventType::Terminate, iteration, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convenience_constructors() {
        let event = SearchEvent::plans_proposed(3, 4);
        assert_eq!(event.event_type, SearchEventType::PlansProposed);
        assert_eq!(event.iteration, 3);
        assert_eq!(event.metadata.as_ref().unwrap()["count"], 4);

        let event = SearchEvent::validate(5, true, 0.85);
        assert_eq!(event.content, "completed=true confidence=0.85");
    }

    #[test]
    fn test_serialization_uses_screaming_case() {
        let event = SearchEvent::terminate(1, "success");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "TERMINATE");
    }
}
