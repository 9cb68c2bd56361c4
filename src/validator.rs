//! LLM-backed validation of task completion.
//!
//! The validator is a judge, not a doer: it reads the memory manager's
//! completion proof (treated as authoritative), weighs it against the
//! task type's acceptance criteria, and returns a verdict with confidence.
//! The orchestrator decides what the verdict means for termination.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::completion::CompletionRules;
use crate::error::{Error, Result};
use crate::llm::{extract_json_block, ChatMessage, LlmClient};
use crate::memory::{CompletionProof, TaskType};

/// Tasks whose acceptance requires operational content in the answer.
static OPS_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(deploy|install|provision|server|service|systemd|nginx|httpd|apache|infrastructure)\b")
        .expect("Invalid regex")
});

/// Sections an ops-profile answer must cover.
const OPS_SECTIONS: &[&str] = &["install", "configure", "verify", "rollback"];

/// Verdict returned by a validation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub completed: bool,
    /// Judge confidence, 0.0-1.0.
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggested_next_actions: Vec<String>,
    #[serde(default)]
    pub evidence_needed: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    /// Which validation round produced this result (1-indexed).
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
}

impl ValidationResult {
    /// The downgraded verdict used when the LLM reply cannot be parsed.
    pub fn parse_failed(iteration: u32) -> Self {
        Self {
            completed: false,
            confidence: 0.0,
            issues: vec!["validator_parse_failed".to_string()],
            suggested_next_actions: Vec::new(),
            evidence_needed: Vec::new(),
            rationale: String::new(),
            iteration,
            timestamp: Utc::now(),
        }
    }
}

/// Fields expected back from the judge LLM.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    completed: bool,
    confidence: f64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggested_next_actions: Vec<String>,
    #[serde(default)]
    evidence_needed: Vec<String>,
    #[serde(default)]
    rationale: String,
}

/// LLM judge over the completion proof.
pub struct Validator {
    llm: Arc<dyn LlmClient>,
    rules: CompletionRules,
}

impl Validator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            rules: CompletionRules::new(),
        }
    }

    /// Whether a task carries the dev/ops acceptance profile.
    pub fn is_ops_task(task: &str) -> bool {
        OPS_TASK.is_match(task)
    }

    /// Judge the current state of a task.
    ///
    /// A malformed reply is retried once; a second malformed reply
    /// downgrades to a not-completed verdict instead of erroring, so a
    /// flaky judge never crashes the search.
    pub async fn validate(
        &self,
        task: &str,
        task_type: TaskType,
        proof: &CompletionProof,
        drafted_answer: Option<&str>,
        iteration: u32,
    ) -> Result<ValidationResult> {
        let prompt = self.build_prompt(task, task_type, proof, drafted_answer);
        let messages = vec![
            ChatMessage::system(
                "You are the validation component of a tool-using agent. \
                 Judge only from the completion proof below; it is authoritative. \
                 Respond with a single JSON object and nothing else.",
            ),
            ChatMessage::user(prompt),
        ];

        let response = self.llm.invoke(&messages).await?;
        let verdict = match self.parse_verdict(&response) {
            Ok(verdict) => verdict,
            Err(first_error) => {
                warn!(error = %first_error, "verdict parse failed, retrying once");
                let mut retry = messages.clone();
                retry.push(ChatMessage::assistant(response));
                retry.push(ChatMessage::user(
                    "That reply was not valid JSON. Respond with only the JSON verdict object.",
                ));

                match self.llm.invoke(&retry).await {
                    Ok(response) => match self.parse_verdict(&response) {
                        Ok(verdict) => verdict,
                        Err(_) => return Ok(ValidationResult::parse_failed(iteration)),
                    },
                    Err(err @ Error::LlmPermanent(_)) => return Err(err),
                    Err(_) => return Ok(ValidationResult::parse_failed(iteration)),
                }
            }
        };

        let mut result = ValidationResult {
            completed: verdict.completed,
            confidence: verdict.confidence.clamp(0.0, 1.0),
            issues: verdict.issues,
            suggested_next_actions: verdict.suggested_next_actions,
            evidence_needed: verdict.evidence_needed,
            rationale: verdict.rationale,
            iteration,
            timestamp: Utc::now(),
        };

        // Ops-profile gate: a confident verdict without operational
        // content in the drafted answer is rejected outright.
        if result.completed && Self::is_ops_task(task) {
            let answer = drafted_answer.unwrap_or_default().to_ascii_lowercase();
            let missing: Vec<&str> = OPS_SECTIONS
                .iter()
                .filter(|section| !answer.contains(**section))
                .copied()
                .collect();

            if !missing.is_empty() {
                info!(?missing, "ops task missing operational sections");
                result.completed = false;
                result
                    .issues
                    .push(format!("missing operational sections: {}", missing.join(", ")));
                result
                    .evidence_needed
                    .push("answer covering install/configure/verify/rollback".to_string());
            }
        }

        debug!(
            completed = result.completed,
            confidence = result.confidence,
            iteration,
            "validation verdict"
        );
        Ok(result)
    }

    fn build_prompt(
        &self,
        task: &str,
        task_type: TaskType,
        proof: &CompletionProof,
        drafted_answer: Option<&str>,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Task\n");
        prompt.push_str(&format!("{} (type: {})\n\n", task, task_type));

        prompt.push_str("## Acceptance Criteria\n");
        for criterion in self.rules.criteria(task_type) {
            prompt.push_str(&format!("- {}\n", criterion));
        }
        if task_type == TaskType::CodingTask {
            prompt.push_str("- a solution with self-tests is acceptable without live execution\n");
        }
        if Self::is_ops_task(task) {
            prompt.push_str(
                "- the answer must include install, configure, verify, and rollback steps\n",
            );
        }
        prompt.push('\n');

        prompt.push_str("## Completion Proof (authoritative)\n");
        prompt.push_str("```json\n");
        prompt.push_str(&serde_json::to_string_pretty(proof).unwrap_or_default());
        prompt.push_str("\n```\n\n");

        if let Some(answer) = drafted_answer {
            prompt.push_str("## Drafted Answer\n");
            prompt.push_str(answer);
            prompt.push_str("\n\n");
        }

        prompt.push_str("## Response Format\n");
        prompt.push_str("```json\n");
        prompt.push_str(
            "{\"completed\": false, \"confidence\": 0.0, \"issues\": [], \
             \"suggested_next_actions\": [], \"evidence_needed\": [], \
             \"rationale\": \"\"}\n",
        );
        prompt.push_str("```\n");

        prompt
    }

    fn parse_verdict(&self, response: &str) -> Result<RawVerdict> {
        let json = extract_json_block(response);
        serde_json::from_str(json).map_err(|e| Error::schema_violation("validator", e.to_string()))
    }
}
