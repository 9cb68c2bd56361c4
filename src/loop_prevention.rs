//! Heuristic detection of stalled or circular execution.
//!
//! The detector reads a [`TaskContext`] snapshot plus an explicit `now`, so
//! tests drive it with synthetic timelines. Stagnation tracking is the only
//! stateful part: a task must sit through two successive stagnation windows
//! without new evidence before a loop is declared.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::memory::TaskContext;

/// Thresholds for loop detection.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Total action cap per task.
    pub max_actions: usize,
    /// Identical `(action, inputs)` executions that declare a loop.
    pub max_duplicates: u32,
    /// Validation actions that declare a loop.
    pub max_validations: u32,
    /// Seconds without new evidence that close one stagnation window.
    pub evidence_stagnation_secs: i64,
    /// Stagnation windows that must elapse back to back.
    pub stagnation_periods: u32,
    /// Actions required before evidence stagnation applies.
    pub min_actions_for_stagnation: usize,
    /// Seconds without any new action that declare a loop.
    pub action_stagnation_secs: i64,
    /// Length of the repeating action pattern to look for.
    pub pattern_length: usize,
    /// Consecutive repetitions that declare a loop.
    pub pattern_repeats: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_actions: 40,
            max_duplicates: 3,
            max_validations: 5,
            evidence_stagnation_secs: 120,
            stagnation_periods: 2,
            min_actions_for_stagnation: 3,
            action_stagnation_secs: 300,
            pattern_length: 3,
            pattern_repeats: 3,
        }
    }
}

/// A declared loop with a machine-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopDetection {
    /// One of: `max_actions`, `duplicate_actions`, `validation_flood`,
    /// `evidence_stagnation`, `action_stagnation`,
    /// `circular_file_dependency`, `repeating_pattern`.
    pub reason: &'static str,
    pub detail: String,
}

impl LoopDetection {
    fn new(reason: &'static str, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Default)]
struct StagnationState {
    last_evidence_at: Option<DateTime<Utc>>,
    window_started: Option<DateTime<Utc>>,
    elapsed_periods: u32,
}

/// Per-task loop detector.
#[derive(Debug, Default)]
pub struct LoopPrevention {
    config: LoopConfig,
    stagnation: HashMap<String, StagnationState>,
}

impl LoopPrevention {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            stagnation: HashMap::new(),
        }
    }

    /// Check a context snapshot for any loop condition.
    pub fn detect(&mut self, ctx: &TaskContext, now: DateTime<Utc>) -> Option<LoopDetection> {
        if ctx.actions.len() >= self.config.max_actions {
            return Some(LoopDetection::new(
                "max_actions",
                format!("{} actions recorded", ctx.actions.len()),
            ));
        }

        if let Some(detection) = self.detect_duplicates(ctx) {
            return Some(detection);
        }

        let validations = ctx
            .actions
            .iter()
            .filter(|a| a.action_type == "validate")
            .count() as u32;
        if validations >= self.config.max_validations {
            return Some(LoopDetection::new(
                "validation_flood",
                format!("{} validation actions", validations),
            ));
        }

        if let Some(detection) = self.detect_evidence_stagnation(ctx, now) {
            return Some(detection);
        }

        if let Some(latest) = ctx.latest_action_at() {
            let idle = now - latest;
            if idle >= Duration::seconds(self.config.action_stagnation_secs) {
                return Some(LoopDetection::new(
                    "action_stagnation",
                    format!("no new actions for {}s", idle.num_seconds()),
                ));
            }
        }

        if let Some(detection) = self.detect_circular_files(ctx) {
            return Some(detection);
        }

        self.detect_repeating_pattern(ctx)
    }

    /// Reset stagnation tracking for a task.
    pub fn reset(&mut self, task_id: &str) {
        self.stagnation.remove(task_id);
    }

    fn detect_duplicates(&self, ctx: &TaskContext) -> Option<LoopDetection> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for action in &ctx.actions {
            let key = format!(
                "{}:{}",
                action.action_type,
                canonical_inputs(&action.inputs)
            );
            let count = counts.entry(key).or_insert(0);
            *count += 1;
            if *count >= self.config.max_duplicates {
                return Some(LoopDetection::new(
                    "duplicate_actions",
                    format!("{} repeated {} times", action.action_type, count),
                ));
            }
        }
        None
    }

    fn detect_evidence_stagnation(
        &mut self,
        ctx: &TaskContext,
        now: DateTime<Utc>,
    ) -> Option<LoopDetection> {
        if ctx.actions.len() < self.config.min_actions_for_stagnation {
            return None;
        }

        let state = self.stagnation.entry(ctx.task_id.clone()).or_default();
        let latest = ctx.latest_evidence_at();

        if latest != state.last_evidence_at {
            state.last_evidence_at = latest;
            state.window_started = Some(now);
            state.elapsed_periods = 0;
            return None;
        }

        let window_started = *state.window_started.get_or_insert(now);
        if now - window_started >= Duration::seconds(self.config.evidence_stagnation_secs) {
            state.elapsed_periods += 1;
            state.window_started = Some(now);
            if state.elapsed_periods >= self.config.stagnation_periods {
                return Some(LoopDetection::new(
                    "evidence_stagnation",
                    format!("{} stagnation windows without new evidence", state.elapsed_periods),
                ));
            }
        }
        None
    }

    /// A file read, later written, then read again (or the inverse) inside
    /// the same task indicates a circular file dependency.
    fn detect_circular_files(&self, ctx: &TaskContext) -> Option<LoopDetection> {
        let mut ops: HashMap<String, Vec<char>> = HashMap::new();
        for action in &ctx.actions {
            let Some(path) = action_file_path(action.action_type.as_str(), &action.inputs) else {
                continue;
            };
            let kind = if action.action_type.contains("read") {
                'r'
            } else if action.action_type.contains("write") {
                'w'
            } else {
                continue;
            };
            ops.entry(path).or_default().push(kind);
        }

        for (path, sequence) in ops {
            let flattened: String = collapse_runs(&sequence);
            if flattened.contains("rwr") || flattened.contains("wrw") {
                return Some(LoopDetection::new(
                    "circular_file_dependency",
                    format!("{} cycles between read and write", path),
                ));
            }
        }
        None
    }

    fn detect_repeating_pattern(&self, ctx: &TaskContext) -> Option<LoopDetection> {
        let length = self.config.pattern_length;
        let repeats = self.config.pattern_repeats;
        let window = length * repeats;
        if length == 0 || ctx.actions.len() < window {
            return None;
        }

        let tail: Vec<&str> = ctx.actions[ctx.actions.len() - window..]
            .iter()
            .map(|a| a.action_type.as_str())
            .collect();
        let pattern = &tail[..length];
        let repeated = tail.chunks(length).all(|chunk| chunk == pattern);

        if repeated {
            return Some(LoopDetection::new(
                "repeating_pattern",
                format!("pattern [{}] repeated {} times", pattern.join(", "), repeats),
            ));
        }
        None
    }
}

/// File path referenced by a read/write action, if any.
fn action_file_path(action_type: &str, inputs: &Value) -> Option<String> {
    if !action_type.contains("read") && !action_type.contains("write") {
        return None;
    }
    ["path", "file_path", "filename", "file"]
        .iter()
        .find_map(|key| inputs.get(key).and_then(Value::as_str))
        .map(String::from)
}

/// Canonical JSON for duplicate keying: object keys are serialized in
/// sorted order so semantically equal inputs collide.
pub(crate) fn canonical_inputs(inputs: &Value) -> String {
    match inputs {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str());
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{:?}:{}", k, canonical_inputs(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_inputs).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// Collapse consecutive identical ops so `rrww` becomes `rw`.
fn collapse_runs(sequence: &[char]) -> String {
    let mut out = String::new();
    for &op in sequence {
        if out.chars().last() != Some(op) {
            out.push(op);
        }
    }
    out
}
