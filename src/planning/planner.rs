//! LLM-backed proposal of candidate plans.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{extract_json_block, ChatMessage, LlmClient};
use crate::memory::{CompletionProof, TaskType};
use crate::tools::ToolSpec;

use super::plan::{PlanNode, Scenario, ScenarioOutcome};

/// Plan fields expected back from the LLM.
#[derive(Debug, Deserialize)]
struct RawPlan {
    action: String,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    inputs: Value,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    #[allow(dead_code)]
    expected_evidence: Vec<String>,
    #[serde(default)]
    scenarios: Vec<RawScenario>,
}

/// Predicted outcome as the LLM spells it; mapped tolerantly so a stray
/// label costs one scenario, never the whole plan batch.
#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    likelihood: Option<f64>,
}

impl RawScenario {
    fn into_scenario(self) -> Option<Scenario> {
        let outcome = match self.outcome.trim().to_ascii_lowercase().as_str() {
            "success" => ScenarioOutcome::Success,
            "partial_success" | "partial" => ScenarioOutcome::PartialSuccess,
            "tool_failure" | "failure" | "error" => ScenarioOutcome::ToolFailure,
            "infeasible" => ScenarioOutcome::Infeasible,
            _ => return None,
        };
        Some(Scenario::new(
            outcome,
            self.description,
            self.likelihood.unwrap_or(0.5),
        ))
    }
}

/// Proposes candidate plan nodes from the task, the tool catalogue, and the
/// current completion proof.
pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Ask the LLM for up to `k` candidate plans.
    ///
    /// A malformed reply is retried once with a correction message; a second
    /// malformed reply surfaces as a schema violation the orchestrator
    /// skips past.
    pub async fn propose_plans(
        &self,
        task: &str,
        task_type: TaskType,
        tools: &[ToolSpec],
        proof: &CompletionProof,
        hints: &[String],
        depth: u32,
        k: usize,
    ) -> Result<Vec<PlanNode>> {
        let prompt = self.build_prompt(task, task_type, tools, proof, hints, k);
        let messages = vec![
            ChatMessage::system(
                "You are the planning component of a tool-using agent. \
                 You propose concrete next steps as structured JSON and nothing else.",
            ),
            ChatMessage::user(prompt),
        ];

        let response = self.llm.invoke(&messages).await?;
        match self.parse_plans(&response, hints, depth) {
            Ok(plans) => Ok(plans),
            Err(first_error) => {
                warn!(error = %first_error, "plan parse failed, retrying once");
                let mut retry = messages.clone();
                retry.push(ChatMessage::assistant(response));
                retry.push(ChatMessage::user(
                    "That reply was not valid JSON. Respond with only a JSON array of plan objects.",
                ));

                let response = self.llm.invoke(&retry).await?;
                self.parse_plans(&response, hints, depth)
            }
        }
    }

    fn build_prompt(
        &self,
        task: &str,
        task_type: TaskType,
        tools: &[ToolSpec],
        proof: &CompletionProof,
        hints: &[String],
        k: usize,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Task\n");
        prompt.push_str(&format!("{} (type: {})\n\n", task, task_type));

        prompt.push_str("## Available Tools\n");
        if tools.is_empty() {
            prompt.push_str("(none)\n");
        }
        for tool in tools {
            prompt.push_str(&format!(
                "- {} [{}]: {}\n",
                tool.name, tool.category, tool.description
            ));
        }
        prompt.push('\n');

        prompt.push_str("## Progress So Far\n");
        prompt.push_str(&format!(
            "files created: {:?}; synthesis evidence: {}; implementation evidence: {}\n\n",
            proof.created_files,
            proof.synthesis_entries.len(),
            proof.implementation_entries.len()
        ));

        if !hints.is_empty() {
            prompt.push_str("## Validator Suggestions\n");
            prompt.push_str("Prefer plans matching these suggested next actions:\n");
            for hint in hints {
                prompt.push_str(&format!("- {}\n", hint));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "## Response Format\nReturn a JSON array of at most {} plan objects:\n",
            k
        ));
        prompt.push_str("```json\n");
        prompt.push_str(
            "[{\"action\": \"<label>\", \"tool\": \"<tool name or null>\", \
             \"inputs\": {}, \"reasoning\": \"<why>\", \"score\": 0.5, \
             \"expected_evidence\": [\"<evidence type>\"], \
             \"scenarios\": [{\"outcome\": \"success|partial_success|tool_failure|infeasible\", \
             \"description\": \"<predicted outcome>\", \"likelihood\": 0.6}]}]\n",
        );
        prompt.push_str("```\n");

        prompt
    }

    fn parse_plans(&self, response: &str, hints: &[String], depth: u32) -> Result<Vec<PlanNode>> {
        let json = extract_json_block(response);
        let raw: Vec<RawPlan> = serde_json::from_str(json)
            .map_err(|e| Error::schema_violation("planner", e.to_string()))?;

        if raw.is_empty() {
            return Err(Error::schema_violation("planner", "empty plan list"));
        }

        let plans = raw
            .into_iter()
            .map(|raw| {
                let hinted = hints.iter().any(|h| h == &raw.action);
                let mut plan = PlanNode::new(raw.action, raw.inputs, raw.reasoning)
                    .with_score(raw.score.unwrap_or(0.5))
                    .with_depth(depth);
                if let Some(tool) = raw.tool {
                    plan = plan.with_tool(tool);
                }
                if hinted {
                    plan = plan.from_validator_hint();
                }
                for scenario in raw.scenarios.into_iter().filter_map(RawScenario::into_scenario)
                {
                    plan = plan.with_scenario(scenario);
                }
                plan
            })
            .collect::<Vec<_>>();

        debug!(count = plans.len(), "plans proposed");
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::memory::CompletionProof;
    use pretty_assertions::assert_eq;

    fn planner_with(llm: &ScriptedLlm) -> Planner {
        Planner::new(Arc::new(llm.clone()))
    }

    fn tools() -> Vec<ToolSpec> {
        vec![ToolSpec::new("calculate", "Evaluate arithmetic").with_category("calculation")]
    }

    #[tokio::test]
    async fn test_parses_fenced_plan_list() {
        let llm = ScriptedLlm::new();
        llm.push_text(
            "Here are the plans:\n```json\n[\
             {\"action\": \"calculate\", \"tool\": \"calculate\", \
              \"inputs\": {\"expression\": \"2+2\"}, \
              \"reasoning\": \"compute the sum\", \"score\": 0.8}\
             ]\n```",
        );

        let plans = planner_with(&llm)
            .propose_plans(
                "What is 2+2?",
                TaskType::SimpleQuestion,
                &tools(),
                &CompletionProof::default(),
                &[],
                1,
                4,
            )
            .await
            .unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].action, "calculate");
        assert_eq!(plans[0].score, 0.8);
        assert_eq!(plans[0].depth, 1);
        assert!(!plans[0].validator_integration);
    }

    #[tokio::test]
    async fn test_hinted_plans_are_flagged() {
        let llm = ScriptedLlm::new();
        llm.push_text(
            "[{\"action\": \"test_example\", \"inputs\": {}, \"reasoning\": \"add a test\"}]",
        );

        let plans = planner_with(&llm)
            .propose_plans(
                "solve two sum",
                TaskType::CodingTask,
                &tools(),
                &CompletionProof::default(),
                &["test_example".to_string()],
                0,
                4,
            )
            .await
            .unwrap();

        assert!(plans[0].validator_integration);
        // Defaults apply when the LLM omits the prior.
        assert_eq!(plans[0].score, 0.5);
    }

    #[tokio::test]
    async fn test_parses_scenarios_into_plans() {
        let llm = ScriptedLlm::new();
        llm.push_text(
            "[{\"action\": \"calculate\", \"inputs\": {}, \"reasoning\": \"r\", \
              \"scenarios\": [\
                {\"outcome\": \"success\", \"description\": \"returns 4\", \"likelihood\": 0.8}, \
                {\"outcome\": \"tool_failure\", \"description\": \"times out\", \"likelihood\": 0.2}, \
                {\"outcome\": \"who_knows\", \"description\": \"junk label\", \"likelihood\": 0.5}\
              ]}]",
        );

        let plans = planner_with(&llm)
            .propose_plans(
                "q",
                TaskType::SimpleQuestion,
                &tools(),
                &CompletionProof::default(),
                &[],
                0,
                4,
            )
            .await
            .unwrap();

        // The junk outcome label is dropped; the rest survive.
        assert_eq!(plans[0].scenarios.len(), 2);
        assert_eq!(plans[0].scenarios[0].outcome, ScenarioOutcome::Success);
        assert_eq!(plans[0].scenarios[1].outcome, ScenarioOutcome::ToolFailure);
        assert!((plans[0].failure_risk() - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_scenario_likelihood_defaults_when_omitted() {
        let llm = ScriptedLlm::new();
        llm.push_text(
            "[{\"action\": \"calculate\", \"inputs\": {}, \"reasoning\": \"r\", \
              \"scenarios\": [{\"outcome\": \"partial\", \"description\": \"half done\"}]}]",
        );

        let plans = planner_with(&llm)
            .propose_plans(
                "q",
                TaskType::SimpleQuestion,
                &tools(),
                &CompletionProof::default(),
                &[],
                0,
                4,
            )
            .await
            .unwrap();

        assert_eq!(plans[0].scenarios[0].outcome, ScenarioOutcome::PartialSuccess);
        assert_eq!(plans[0].scenarios[0].likelihood, 0.5);
    }

    #[tokio::test]
    async fn test_retries_once_on_malformed_reply() {
        let llm = ScriptedLlm::new();
        llm.push_text("I think we should calculate first.")
            .push_text("[{\"action\": \"calculate\", \"inputs\": {}, \"reasoning\": \"r\"}]");

        let plans = planner_with(&llm)
            .propose_plans(
                "q",
                TaskType::SimpleQuestion,
                &tools(),
                &CompletionProof::default(),
                &[],
                0,
                4,
            )
            .await
            .unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_second_malformed_reply_is_schema_violation() {
        let llm = ScriptedLlm::new();
        llm.push_text("not json").push_text("still not json");

        let err = planner_with(&llm)
            .propose_plans(
                "q",
                TaskType::SimpleQuestion,
                &tools(),
                &CompletionProof::default(),
                &[],
                0,
                4,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn test_prompt_lists_tools_and_hints() {
        let llm = ScriptedLlm::new();
        llm.push_text("[{\"action\": \"a\", \"inputs\": {}, \"reasoning\": \"r\"}]");

        planner_with(&llm)
            .propose_plans(
                "q",
                TaskType::GeneralTask,
                &tools(),
                &CompletionProof::default(),
                &["implement_code".to_string()],
                0,
                3,
            )
            .await
            .unwrap();

        let prompt = &llm.captured_prompts()[0][1].content;
        assert!(prompt.contains("calculate [calculation]"));
        assert!(prompt.contains("implement_code"));
        assert!(prompt.contains("JSON array of at most 3"));
        assert!(prompt.contains("success|partial_success|tool_failure|infeasible"));
    }
}
