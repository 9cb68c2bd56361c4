//! Failure catalogue: known-bad plan shapes and their adaptations.
//!
//! Patterns are pure `matches`/`adapt` functions over a plan and the task
//! text; adaptation never reads external state, so every rule is unit
//! testable in isolation. The table is static at runtime.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use super::plan::PlanNode;

/// Score factor at or below which a matching plan is irrecoverable:
/// if no adaptation exists, the plan is dropped instead of demerited.
pub const HARD_BLOCK_THRESHOLD: f64 = 0.2;

static SYSTEM_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[\s'\x22=])(/etc/|/var/|/usr/|C:\\Windows)").expect("Invalid regex")
});

static PRIVILEGED_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(systemctl|service\s+\w+|sudo|apt\s+install|apt-get\s+install|yum\s+install)\b")
        .expect("Invalid regex")
});

static DESTRUCTIVE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\brm\s+-[a-z]*r[a-z]*f|\brm\s+-[a-z]*f[a-z]*r|rmdir\s+/s|del\s+/s)")
        .expect("Invalid regex")
});

static EGRESS_FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(no\s+(network|internet|egress)|offline\s+only|without\s+network\s+access)")
        .expect("Invalid regex")
});

/// A rule matching a risky plan shape, with an optional rewrite.
pub struct FailurePattern {
    pub id: &'static str,
    pub reason: &'static str,
    /// Score multiplier applied when no adaptation is available.
    pub score_factor: f64,
    matches: fn(&PlanNode, &str) -> bool,
    adapt: fn(&PlanNode, &str) -> Option<PlanNode>,
}

impl FailurePattern {
    /// Whether the pattern matches a plan in the context of a task.
    pub fn matches(&self, plan: &PlanNode, task: &str) -> bool {
        (self.matches)(plan, task)
    }

    /// Produce a safer equivalent plan, when one exists.
    pub fn adapt(&self, plan: &PlanNode, workspace_dir: &str) -> Option<PlanNode> {
        (self.adapt)(plan, workspace_dir)
    }

    /// Whether a match without adaptation removes the plan entirely.
    pub fn is_hard_block(&self) -> bool {
        self.score_factor <= HARD_BLOCK_THRESHOLD
    }
}

impl std::fmt::Debug for FailurePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailurePattern")
            .field("id", &self.id)
            .field("score_factor", &self.score_factor)
            .finish()
    }
}

/// Every string in the plan's inputs, flattened for scanning.
fn input_strings(inputs: &Value) -> Vec<&str> {
    fn walk<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
        match value {
            Value::String(s) => out.push(s),
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(inputs, &mut out);
    out
}

fn plan_text(plan: &PlanNode) -> String {
    let mut text = format!("{} {}", plan.action, plan.reasoning);
    for s in input_strings(&plan.inputs) {
        text.push(' ');
        text.push_str(s);
    }
    text
}

fn matches_system_path(plan: &PlanNode, _task: &str) -> bool {
    input_strings(&plan.inputs)
        .iter()
        .any(|s| SYSTEM_PATH.is_match(s))
}

/// Rewrite system-directory paths into the local workspace.
fn adapt_system_path(plan: &PlanNode, workspace_dir: &str) -> Option<PlanNode> {
    fn rewrite(value: &Value, workspace_dir: &str) -> Value {
        match value {
            Value::String(s) if SYSTEM_PATH.is_match(s) => {
                let name = s.rsplit(['/', '\\']).next().unwrap_or("artifact");
                Value::String(format!("{}/{}", workspace_dir.trim_end_matches('/'), name))
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| rewrite(v, workspace_dir)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), rewrite(v, workspace_dir)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    let mut adapted = plan.clone();
    adapted.inputs = rewrite(&plan.inputs, workspace_dir);
    Some(adapted.adapted("rewrote system path into the local workspace"))
}

fn matches_privileged(plan: &PlanNode, _task: &str) -> bool {
    PRIVILEGED_COMMAND.is_match(&plan_text(plan))
}

/// Substitute a user-space equivalent for privileged service control,
/// keeping the original verification intent in the reasoning.
fn adapt_privileged(plan: &PlanNode, _workspace_dir: &str) -> Option<PlanNode> {
    fn rewrite(value: &Value) -> Value {
        match value {
            Value::String(s) if PRIVILEGED_COMMAND.is_match(s) => {
                Value::String("python3 -m http.server 8000".to_string())
            }
            Value::Array(items) => Value::Array(items.iter().map(rewrite).collect()),
            Value::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), rewrite(v))).collect())
            }
            other => other.clone(),
        }
    }

    let mut adapted = plan.clone();
    adapted.inputs = rewrite(&plan.inputs);
    Some(adapted.adapted(
        "substituted a user-space HTTP server for privileged service control; verify it serves requests",
    ))
}

fn matches_destructive(plan: &PlanNode, _task: &str) -> bool {
    DESTRUCTIVE_COMMAND.is_match(&plan_text(plan))
}

fn no_adaptation(_plan: &PlanNode, _workspace_dir: &str) -> Option<PlanNode> {
    None
}

fn matches_forbidden_egress(plan: &PlanNode, task: &str) -> bool {
    let remote = plan
        .tool
        .as_deref()
        .map(|t| t.contains("remote"))
        .unwrap_or(false)
        || plan.action.contains("remote_exec");
    remote && EGRESS_FORBIDDEN.is_match(task)
}

/// Redirect forbidden remote execution to a local equivalent.
fn adapt_forbidden_egress(plan: &PlanNode, _workspace_dir: &str) -> Option<PlanNode> {
    let mut adapted = plan.clone();
    adapted.tool = Some("execute_local".to_string());
    adapted.action = adapted.action.replace("remote", "local");
    Some(adapted.adapted("task forbids network egress; running the local equivalent"))
}

/// Ordered, static table of failure patterns.
pub struct FailureCatalogue {
    patterns: Vec<FailurePattern>,
    workspace_dir: String,
}

impl FailureCatalogue {
    /// The catalogue with its required starting set of patterns.
    pub fn new(workspace_dir: impl Into<String>) -> Self {
        Self {
            patterns: vec![
                FailurePattern {
                    id: "system_path_write",
                    reason: "writes into a system directory",
                    score_factor: 0.8,
                    matches: matches_system_path,
                    adapt: adapt_system_path,
                },
                FailurePattern {
                    id: "privileged_service_control",
                    reason: "requires privileged service control",
                    score_factor: 0.7,
                    matches: matches_privileged,
                    adapt: adapt_privileged,
                },
                FailurePattern {
                    id: "destructive_fs",
                    reason: "destructive filesystem operation",
                    score_factor: 0.1,
                    matches: matches_destructive,
                    adapt: no_adaptation,
                },
                FailurePattern {
                    id: "forbidden_egress",
                    reason: "network egress forbidden by the task",
                    score_factor: 0.5,
                    matches: matches_forbidden_egress,
                    adapt: adapt_forbidden_egress,
                },
            ],
            workspace_dir: workspace_dir.into(),
        }
    }

    /// First pattern matching a plan, in table order.
    pub fn first_match(&self, plan: &PlanNode, task: &str) -> Option<&FailurePattern> {
        self.patterns.iter().find(|p| p.matches(plan, task))
    }

    /// Whether executing this plan is categorically blocked.
    pub fn is_blocked(&self, plan: &PlanNode, task: &str) -> bool {
        self.first_match(plan, task)
            .map(|p| p.is_hard_block() && p.adapt(plan, &self.workspace_dir).is_none())
            .unwrap_or(false)
    }

    /// Rewrite or demerit each plan against the catalogue.
    ///
    /// Matching plans with an adaptation are substituted; matching plans
    /// without one are demerited by the pattern's score factor, and dropped
    /// entirely when the pattern is a hard block.
    pub fn apply_failure_awareness(&self, plans: Vec<PlanNode>, task: &str) -> Vec<PlanNode> {
        let mut out = Vec::with_capacity(plans.len());

        for plan in plans {
            let Some(pattern) = self.first_match(&plan, task) else {
                out.push(plan);
                continue;
            };

            match pattern.adapt(&plan, &self.workspace_dir) {
                Some(adapted) => {
                    debug!(
                        pattern = pattern.id,
                        plan = %plan.action,
                        "adapted risky plan"
                    );
                    out.push(adapted);
                }
                None if pattern.is_hard_block() => {
                    debug!(pattern = pattern.id, plan = %plan.action, "dropped blocked plan");
                }
                None => {
                    let mut demerited = plan;
                    demerited.demerit(pattern.score_factor);
                    demerited.reasoning =
                        format!("{} (Adapted: {})", demerited.reasoning, pattern.reason);
                    out.push(demerited);
                }
            }
        }

        out
    }
}
