//! Candidate plan nodes produced by the planner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Predicted outcome class for executing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Success,
    PartialSuccess,
    ToolFailure,
    Infeasible,
}

/// One predicted outcome with its likelihood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub outcome: ScenarioOutcome,
    pub description: String,
    /// Likelihood estimate, 0.0-1.0.
    pub likelihood: f64,
}

impl Scenario {
    pub fn new(outcome: ScenarioOutcome, description: impl Into<String>, likelihood: f64) -> Self {
        Self {
            outcome,
            description: description.into(),
            likelihood: likelihood.clamp(0.0, 1.0),
        }
    }
}

/// Bookkeeping attached to a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub priority: u32,
    pub created_at: DateTime<Utc>,
    /// How many scoring rounds have looked at this plan.
    pub consideration_count: u32,
    pub executed: bool,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            priority: 0,
            created_at: Utc::now(),
            consideration_count: 0,
            executed: false,
        }
    }
}

/// A candidate next step in the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: String,
    /// Action label: a tool name or reserved verb.
    pub action: String,
    /// Resolved tool, when the action maps onto the bridge catalogue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub inputs: Value,
    pub reasoning: String,
    /// Current score, 0.0-1.0. Reflects the latest failure adaptation and
    /// hint adjustments at pick time.
    pub score: f64,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    /// Whether this plan was shaped by validator hints.
    #[serde(default)]
    pub validator_integration: bool,
    #[serde(default)]
    pub metadata: PlanMetadata,
}

impl PlanNode {
    pub fn new(action: impl Into<String>, inputs: Value, reasoning: impl Into<String>) -> Self {
        Self {
            id: format!("plan-{}", Uuid::new_v4()),
            action: action.into(),
            tool: None,
            inputs,
            reasoning: reasoning.into(),
            score: 0.5,
            depth: 0,
            parent_id: None,
            scenarios: Vec::new(),
            validator_integration: false,
            metadata: PlanMetadata::default(),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    pub fn from_validator_hint(mut self) -> Self {
        self.validator_integration = true;
        self
    }

    /// The tool to execute, falling back to the action label.
    pub fn tool_name(&self) -> &str {
        self.tool.as_deref().unwrap_or(&self.action)
    }

    /// Append an adaptation note to the reasoning.
    pub fn adapted(mut self, note: &str) -> Self {
        self.reasoning = format!("{} (Adapted: {})", self.reasoning, note);
        self
    }

    /// Likelihood-weighted risk that execution fails outright, from the
    /// plan's predicted scenarios. Zero when no scenarios were predicted.
    pub fn failure_risk(&self) -> f64 {
        self.scenarios
            .iter()
            .filter(|s| {
                matches!(
                    s.outcome,
                    ScenarioOutcome::ToolFailure | ScenarioOutcome::Infeasible
                )
            })
            .map(|s| s.likelihood)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    /// Scale the score by a demerit factor, clamped to [0, 1].
    pub fn demerit(&mut self, factor: f64) {
        self.score = (self.score * factor).clamp(0.0, 1.0);
    }
}
