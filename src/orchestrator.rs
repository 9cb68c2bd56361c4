//! Best-first search orchestrator.
//!
//! One plan advances per iteration: propose → failure-adapt → score → pick →
//! execute → ingest into memory → decide whether to validate. The search
//! terminates on validator-confirmed success, iteration exhaustion, loop
//! detection, cancellation, or a permanent adapter failure.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::completion::CompletionRules;
use crate::config::{SearchConfig, ValidatorMode};
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, LlmClient};
use crate::loop_prevention::{LoopConfig, LoopPrevention};
use crate::memory::{Action, EvidenceType, MemoryManager, MemoryQuery, TaskType};
use crate::planning::{FailureCatalogue, Planner, PlanNode};
use crate::tools::{ToolClient, ToolSpec};
use crate::trajectory::{SearchEvent, SearchEventType};
use crate::validator::{ValidationResult, Validator};

/// How many recent actions the duplicate-penalty check looks at.
const DUPLICATE_WINDOW: usize = 5;

/// Weight applied to a plan's predicted failure risk during scoring.
const SCENARIO_RISK_WEIGHT: f64 = 0.2;

/// Retries for a transient LLM failure inside one iteration.
const LLM_TRANSIENT_RETRIES: u32 = 2;

/// Why a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Success,
    MaxIterations,
    LoopDetected,
    Cancelled,
    UnrecoverableError,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::MaxIterations => "max_iterations",
            Self::LoopDetected => "loop_detected",
            Self::Cancelled => "cancelled",
            Self::UnrecoverableError => "unrecoverable_error",
        };
        write!(f, "{}", s)
    }
}

/// Counters accumulated over a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetrics {
    pub plans_proposed: u32,
    pub tools_executed: u32,
    pub tool_failures: u32,
    pub validations: u32,
}

/// Outcome handed back to the caller. Carries no secrets or stack traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub status: Termination,
    pub reason: String,
    /// Most recent evidence, newest first.
    pub last_evidence_summary: Vec<String>,
    /// Validator suggestions left on the table, for a host UI to surface.
    pub suggested_next_actions: Vec<String>,
    pub iterations: u32,
    pub metrics: SearchMetrics,
    pub events: Vec<SearchEvent>,
}

/// Validator bookkeeping across iterations.
#[derive(Debug, Default)]
struct ValidatorState {
    last_validation_iteration: Option<u32>,
    validation_count: u32,
    /// Fraction of required evidence satisfied, 0.0-1.0.
    confidence_trend: f64,
    pending_hints: Vec<String>,
    validation_scheduled: bool,
    last_result: Option<ValidationResult>,
}

/// Mutable state for one running search.
struct SearchState {
    iteration: u32,
    frontier: Vec<PlanNode>,
    scratchpad: Vec<SearchEvent>,
    validator_state: ValidatorState,
    metrics: SearchMetrics,
}

impl SearchState {
    fn new(task: &str) -> Self {
        Self {
            iteration: 0,
            frontier: Vec::new(),
            scratchpad: vec![SearchEvent::search_start(task)],
            validator_state: ValidatorState::default(),
            metrics: SearchMetrics::default(),
        }
    }

    fn push_event(&mut self, event: SearchEvent) {
        self.scratchpad.push(event);
    }
}

/// The main search loop over plans, tools, memory, and the validator.
pub struct BfsOrchestrator {
    tools: Arc<dyn ToolClient>,
    llm: Arc<dyn LlmClient>,
    memory: MemoryManager,
    planner: Planner,
    validator: Validator,
    catalogue: FailureCatalogue,
    rules: CompletionRules,
    loop_prevention: Mutex<LoopPrevention>,
    cancelled: Mutex<HashSet<String>>,
    config: SearchConfig,
}

impl BfsOrchestrator {
    pub fn new(tools: Arc<dyn ToolClient>, llm: Arc<dyn LlmClient>, config: SearchConfig) -> Self {
        let loop_config = LoopConfig {
            max_actions: config.max_iterations as usize,
            max_duplicates: config.loop_max_duplicates,
            max_validations: config.loop_max_validations,
            ..LoopConfig::default()
        };

        Self {
            tools,
            llm: llm.clone(),
            memory: MemoryManager::new(),
            planner: Planner::new(llm.clone()),
            validator: Validator::new(llm),
            catalogue: FailureCatalogue::new(config.workspace_dir.clone()),
            rules: CompletionRules::new(),
            loop_prevention: Mutex::new(LoopPrevention::new(loop_config)),
            cancelled: Mutex::new(HashSet::new()),
            config,
        }
    }

    /// The memory manager owning this orchestrator's task contexts.
    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// Request cancellation: the task stops at its next suspension point.
    pub fn cancel(&self, task_id: &str) {
        info!(task_id, "cancellation requested");
        self.cancelled.lock().unwrap().insert(task_id.to_string());
    }

    fn is_cancelled(&self, task_id: &str) -> bool {
        self.cancelled.lock().unwrap().contains(task_id)
    }

    /// Create a task and run it to termination.
    pub async fn run(&self, task: &str, task_type: TaskType) -> Result<TaskReport> {
        let task_id = self.memory.create_task(task, task_type);
        self.run_task(&task_id).await
    }

    /// Run an already created task to termination.
    ///
    /// Useful when the caller needs the task id up front, e.g. to call
    /// [`cancel`](Self::cancel) from another task.
    pub async fn run_task(&self, task_id: &str) -> Result<TaskReport> {
        let ctx = self.memory.get_task_context(task_id)?;
        let (task, task_type) = (ctx.task.clone(), ctx.task_type);
        info!(task_id, task, "search starting");

        let mut state = SearchState::new(&task);
        let tools = match self.tools.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "tool listing failed, searching without tools");
                Vec::new()
            }
        };

        let report = self
            .search_loop(task_id, &task, task_type, &tools, &mut state)
            .await;
        self.loop_prevention.lock().unwrap().reset(task_id);
        self.cancelled.lock().unwrap().remove(task_id);

        Ok(self.build_report(task_id, report, state))
    }

    async fn search_loop(
        &self,
        task_id: &str,
        task: &str,
        task_type: TaskType,
        tools: &[ToolSpec],
        state: &mut SearchState,
    ) -> (Termination, String) {
        loop {
            state.iteration += 1;
            let iteration = state.iteration;

            if iteration > self.config.max_iterations {
                return (Termination::MaxIterations, "iteration budget exhausted".into());
            }

            if self.is_cancelled(task_id) {
                return (Termination::Cancelled, "cancelled by caller".into());
            }

            let Ok(ctx) = self.memory.get_task_context(task_id) else {
                return (Termination::UnrecoverableError, "task context lost".into());
            };

            if let Some(detection) = self
                .loop_prevention
                .lock()
                .unwrap()
                .detect(&ctx, Utc::now())
            {
                state.push_event(
                    SearchEvent::new(SearchEventType::LoopCheck, iteration, detection.reason)
                        .with_metadata("detail", detection.detail.clone()),
                );
                return (Termination::LoopDetected, detection.reason.to_string());
            }

            // Scheduled validation preempts plan execution for this iteration.
            if state.validator_state.validation_scheduled {
                state.validator_state.validation_scheduled = false;
                match self.validation_round(task_id, task, task_type, state).await {
                    RoundOutcome::Accepted => {
                        return (Termination::Success, "validator confirmed completion".into());
                    }
                    RoundOutcome::Rejected => continue,
                    RoundOutcome::Fatal(reason) => {
                        return (Termination::UnrecoverableError, reason);
                    }
                }
            }

            // Refill the frontier when it runs dry.
            if state.frontier.is_empty() {
                let proof = match self.memory.completion_proof(task_id) {
                    Ok(proof) => proof,
                    Err(_) => return (Termination::UnrecoverableError, "task context lost".into()),
                };

                match self
                    .propose_with_retry(task, task_type, tools, &proof, state)
                    .await
                {
                    ProposalOutcome::Plans(plans) => {
                        state.metrics.plans_proposed += plans.len() as u32;
                        state.push_event(SearchEvent::plans_proposed(iteration, plans.len()));
                        state.frontier = plans;
                    }
                    ProposalOutcome::Skip(reason) => {
                        state.push_event(SearchEvent::new(
                            SearchEventType::Error,
                            iteration,
                            reason,
                        ));
                        continue;
                    }
                    ProposalOutcome::Fatal(reason) => {
                        return (Termination::UnrecoverableError, reason);
                    }
                }
            }

            // Failure-adapt, score, and rank the frontier.
            let plans = std::mem::take(&mut state.frontier);
            let before = plans.len();
            let mut plans = self.catalogue.apply_failure_awareness(plans, task);
            if plans.len() < before {
                state.push_event(SearchEvent::new(
                    SearchEventType::PlanAdapted,
                    iteration,
                    format!("{} plan(s) hard-blocked", before - plans.len()),
                ));
            }

            let ctx = match self.memory.get_task_context(task_id) {
                Ok(ctx) => ctx,
                Err(_) => return (Termination::UnrecoverableError, "task context lost".into()),
            };
            self.score_plans(&mut plans, &ctx, &state.validator_state);

            let trigger_met = state.validator_state.confidence_trend >= self.config.value_trigger;
            rank_plans(&mut plans, trigger_met);
            plans.truncate(self.config.beam_width);
            state.frontier = plans;

            let Some(plan) = (!state.frontier.is_empty()).then(|| state.frontier.remove(0)) else {
                state.push_event(SearchEvent::new(
                    SearchEventType::Error,
                    iteration,
                    "frontier empty after adaptation",
                ));
                continue;
            };

            state.push_event(SearchEvent::plan_selected(iteration, &plan.action, plan.score));

            // Dispatch: validator round, internal synthesis, or tool call.
            if plan.action == "validate" {
                match self.validation_round(task_id, task, task_type, state).await {
                    RoundOutcome::Accepted => {
                        return (Termination::Success, "validator confirmed completion".into());
                    }
                    RoundOutcome::Rejected => continue,
                    RoundOutcome::Fatal(reason) => {
                        return (Termination::UnrecoverableError, reason);
                    }
                }
            } else if plan.action == "synthesize_answer" {
                if let Err(reason) = self.synthesize_answer(task_id, task, state).await {
                    if matches!(reason, Error::LlmPermanent(_)) {
                        return (Termination::UnrecoverableError, reason.to_string());
                    }
                    state.push_event(SearchEvent::new(
                        SearchEventType::Error,
                        iteration,
                        reason.to_string(),
                    ));
                }
            } else {
                self.execute_plan(task_id, task, plan, state).await;
            }

            if self.is_cancelled(task_id) {
                return (Termination::Cancelled, "cancelled by caller".into());
            }

            // Refresh the confidence trend from evidence coverage.
            if let Ok(ctx) = self.memory.get_task_context(task_id) {
                state.validator_state.confidence_trend = self.rules.evidence_coverage(&ctx);

                self.schedule_validation(&ctx, state);
            }
        }
    }

    /// Plan scoring: base prior + hint boosts − duplicate penalty −
    /// weighted scenario failure risk, clamped to [0, 1].
    fn score_plans(
        &self,
        plans: &mut [PlanNode],
        ctx: &crate::memory::TaskContext,
        validator_state: &ValidatorState,
    ) {
        let recent: Vec<(String, String)> = ctx
            .actions
            .iter()
            .rev()
            .take(DUPLICATE_WINDOW)
            .map(|a| {
                (
                    a.action_type.clone(),
                    crate::loop_prevention::canonical_inputs(&a.inputs),
                )
            })
            .collect();

        for plan in plans.iter_mut() {
            let mut score = plan.score;

            let hinted = plan.validator_integration
                || validator_state
                    .pending_hints
                    .iter()
                    .any(|h| h == &plan.action);
            if hinted {
                score += self.config.hint_boost;
            }

            if plan.action == "implement_code" || plan.action == "test_example" {
                score += self.config.special_hint_boost;
            }

            let duplicate = recent.iter().any(|(action, inputs)| {
                action == &plan.action
                    && inputs == &crate::loop_prevention::canonical_inputs(&plan.inputs)
            });
            if duplicate {
                score -= self.config.duplicate_penalty;
            }

            score -= plan.failure_risk() * SCENARIO_RISK_WEIGHT;

            plan.score = score.clamp(0.0, 1.0);
            plan.metadata.consideration_count += 1;
        }
    }

    /// Decide whether the next iteration starts with a validation round.
    fn schedule_validation(&self, ctx: &crate::memory::TaskContext, state: &mut SearchState) {
        if state.validator_state.validation_scheduled {
            return;
        }

        let cooled_down = state
            .validator_state
            .last_validation_iteration
            .map(|last| state.iteration.saturating_sub(last) >= self.config.validation_cooldown)
            .unwrap_or(true);
        if !cooled_down {
            return;
        }

        let action_mode = matches!(
            self.config.validator_mode,
            ValidatorMode::Action | ValidatorMode::Both
        );
        let periodic_mode = matches!(
            self.config.validator_mode,
            ValidatorMode::Periodic | ValidatorMode::Both
        );

        let value_triggered =
            action_mode && state.validator_state.confidence_trend >= self.config.value_trigger;
        let period_triggered = periodic_mode
            && self.config.validation_period > 0
            && state.iteration % self.config.validation_period == 0;
        // A locally satisfied completion rule still needs the validator's
        // confirmation before the search may terminate.
        let rules_satisfied = self.rules.check(ctx);

        if value_triggered || period_triggered || rules_satisfied {
            debug!(
                iteration = state.iteration,
                value_triggered, period_triggered, rules_satisfied, "validation scheduled"
            );
            state.validator_state.validation_scheduled = true;
        }
    }

    /// Synthesize an answer, then judge it. Both steps are recorded as
    /// reserved actions on the task context.
    async fn validation_round(
        &self,
        task_id: &str,
        task: &str,
        task_type: TaskType,
        state: &mut SearchState,
    ) -> RoundOutcome {
        let iteration = state.iteration;

        // Draft an answer first if none exists yet.
        if self.latest_draft(task_id).is_none() {
            if let Err(e) = self.synthesize_answer(task_id, task, state).await {
                if matches!(e, Error::LlmPermanent(_)) {
                    return RoundOutcome::Fatal(e.to_string());
                }
                state.push_event(SearchEvent::new(
                    SearchEventType::Error,
                    iteration,
                    e.to_string(),
                ));
            }
        }

        let draft = self.latest_draft(task_id);
        let proof = match self.memory.completion_proof(task_id) {
            Ok(proof) => proof,
            Err(e) => return RoundOutcome::Fatal(e.to_string()),
        };

        let round = state.validator_state.validation_count + 1;
        let verdict = match self
            .validator
            .validate(task, task_type, &proof, draft.as_deref(), round)
            .await
        {
            Ok(verdict) => verdict,
            Err(Error::LlmPermanent(message)) => return RoundOutcome::Fatal(message),
            Err(e) => {
                warn!(error = %e, "validation round failed");
                state.push_event(SearchEvent::new(
                    SearchEventType::Error,
                    iteration,
                    e.to_string(),
                ));
                return RoundOutcome::Rejected;
            }
        };

        state.validator_state.validation_count += 1;
        state.validator_state.last_validation_iteration = Some(iteration);
        state.metrics.validations += 1;

        let action = Action::new(
            task_id,
            "validate",
            json!({"round": round}),
            json!({
                "completed": verdict.completed,
                "confidence": verdict.confidence,
                "issues": verdict.issues,
            }),
            true,
        );
        let _ = self.memory.add_action(task_id, action);

        state.push_event(SearchEvent::validate(
            iteration,
            verdict.completed,
            verdict.confidence,
        ));

        let accepted = verdict.completed && verdict.confidence >= self.config.validator_confidence;
        if accepted {
            let evidence_ids = self
                .memory
                .query_memories(task_id, &MemoryQuery::of_types(vec![EvidenceType::Validation]))
                .map(|entries| entries.iter().map(|e| e.evidence_id.clone()).collect())
                .unwrap_or_default();
            let _ = self.memory.mark_complete(task_id, evidence_ids);
            info!(task_id, confidence = verdict.confidence, "task accepted");
        } else {
            state.validator_state.pending_hints = verdict.suggested_next_actions.clone();
        }
        state.validator_state.last_result = Some(verdict);

        if accepted {
            RoundOutcome::Accepted
        } else {
            RoundOutcome::Rejected
        }
    }

    /// Draft an answer from accumulated evidence and record it.
    async fn synthesize_answer(
        &self,
        task_id: &str,
        task: &str,
        state: &mut SearchState,
    ) -> Result<()> {
        let ctx = self.memory.get_task_context(task_id)?;

        let mut prompt = String::new();
        prompt.push_str("## Task\n");
        prompt.push_str(task);
        prompt.push_str("\n\n## Evidence\n");
        for evidence in ctx.evidence.iter().rev().take(10) {
            prompt.push_str(&format!(
                "- [{}] {}\n",
                evidence.evidence_type, evidence.content
            ));
        }
        prompt.push_str("\n## Files\n");
        for file in &ctx.files {
            prompt.push_str(&format!("- {}:\n{}\n", file.file_path, file.content));
        }
        prompt.push_str("\nDraft the final answer to the task from this evidence only.\n");
        if Validator::is_ops_task(task) {
            prompt.push_str(
                "This is an operational task: structure the answer with Install, \
                 Configure, Verify, and Rollback sections.\n",
            );
        }

        let messages = vec![
            ChatMessage::system(
                "You are the synthesis component of a tool-using agent. \
                 Write the final answer grounded in the evidence provided.",
            ),
            ChatMessage::user(prompt),
        ];

        let answer = self.invoke_with_retry(&messages).await?;

        let action = Action::new(
            task_id,
            "synthesize_answer",
            json!({}),
            json!({"answer": answer}),
            true,
        );
        self.memory.add_action(task_id, action)?;
        self.memory
            .set_result(task_id, &answer, "answer", Some("answer.md"))?;

        state.push_event(SearchEvent::new(
            SearchEventType::Synthesize,
            state.iteration,
            format!("{} chars drafted", answer.len()),
        ));
        Ok(())
    }

    /// Most recent drafted answer, if any.
    ///
    /// Only synthesis evidence recorded through `set_result` counts; the
    /// cheaper file-name synthesis signals are not drafts.
    fn latest_draft(&self, task_id: &str) -> Option<String> {
        self.memory
            .query_memories(task_id, &MemoryQuery::of_types(vec![EvidenceType::Synthesis]))
            .ok()?
            .into_iter()
            .find(|e| e.metadata.contains_key("result_type"))
            .map(|e| e.content)
    }

    /// Execute a plan against the tool bridge and ingest the outcome.
    async fn execute_plan(
        &self,
        task_id: &str,
        task: &str,
        mut plan: PlanNode,
        state: &mut SearchState,
    ) {
        let iteration = state.iteration;
        state.metrics.tools_executed += 1;

        let result = match self
            .tools
            .execute(plan.tool_name(), plan.inputs.clone())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                // The adapter itself failed; treat as an in-band transport error.
                crate::tools::ToolResult::err(crate::tools::ToolErrorKind::Transport, e.to_string())
            }
        };

        let success = result.is_ok();
        let outputs = serde_json::to_value(&result).unwrap_or(Value::Null);

        state.push_event(SearchEvent::tool_exec(iteration, plan.tool_name(), success));

        let action = Action::new(
            task_id,
            plan.action.clone(),
            plan.inputs.clone(),
            outputs,
            success,
        );
        if let Err(e) = self.memory.add_action(task_id, action) {
            warn!(error = %e, "failed to record action");
        }

        plan.metadata.executed = true;

        if !success {
            state.metrics.tool_failures += 1;
            // Demerit and requeue for one more look, unless the catalogue
            // blocks it outright.
            if !self.catalogue.is_blocked(&plan, task) {
                plan.demerit(0.5);
                plan.metadata.executed = false;
                state.frontier.push(plan);
            }
        }
    }

    async fn propose_with_retry(
        &self,
        task: &str,
        task_type: TaskType,
        tools: &[ToolSpec],
        proof: &crate::memory::CompletionProof,
        state: &mut SearchState,
    ) -> ProposalOutcome {
        let hints = state.validator_state.pending_hints.clone();
        let mut attempts = 0;

        loop {
            match self
                .planner
                .propose_plans(
                    task,
                    task_type,
                    tools,
                    proof,
                    &hints,
                    state.iteration,
                    self.config.beam_width,
                )
                .await
            {
                Ok(plans) => return ProposalOutcome::Plans(plans),
                Err(Error::LlmPermanent(message)) => return ProposalOutcome::Fatal(message),
                Err(Error::LlmTransient(_)) if attempts < LLM_TRANSIENT_RETRIES => {
                    attempts += 1;
                    debug!(attempts, "transient planner failure, retrying");
                }
                Err(e) => return ProposalOutcome::Skip(e.to_string()),
            }
        }
    }

    async fn invoke_with_retry(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut attempts = 0;
        loop {
            match self.llm.invoke(messages).await {
                Ok(text) => return Ok(text),
                Err(Error::LlmTransient(_)) if attempts < LLM_TRANSIENT_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn build_report(
        &self,
        task_id: &str,
        (status, reason): (Termination, String),
        mut state: SearchState,
    ) -> TaskReport {
        state.push_event(SearchEvent::terminate(state.iteration, status.to_string()));

        let last_evidence_summary = self
            .memory
            .query_memories(task_id, &MemoryQuery::default().with_max_results(5))
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| format!("[{}] {}", e.evidence_type, e.content))
                    .collect()
            })
            .unwrap_or_default();

        let suggested_next_actions = state
            .validator_state
            .last_result
            .as_ref()
            .map(|r| r.suggested_next_actions.clone())
            .unwrap_or_default();

        info!(task_id, status = %status, reason, "search finished");

        TaskReport {
            task_id: task_id.to_string(),
            status,
            reason,
            last_evidence_summary,
            suggested_next_actions,
            iterations: state.iteration,
            metrics: state.metrics,
            events: state.scratchpad,
        }
    }
}

enum RoundOutcome {
    Accepted,
    Rejected,
    Fatal(String),
}

enum ProposalOutcome {
    Plans(Vec<PlanNode>),
    Skip(String),
    Fatal(String),
}

/// Sort plans best first: strictly greater score wins; ties prefer smaller
/// depth, then earlier creation. A tie between `validate` and non-validate
/// plans resolves toward `validate` only when the value trigger is met.
fn rank_plans(plans: &mut [PlanNode], value_trigger_met: bool) {
    plans.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_validate = a.action == "validate";
                let b_validate = b.action == "validate";
                match (a_validate, b_validate) {
                    (true, false) if value_trigger_met => std::cmp::Ordering::Less,
                    (true, false) => std::cmp::Ordering::Greater,
                    (false, true) if value_trigger_met => std::cmp::Ordering::Greater,
                    (false, true) => std::cmp::Ordering::Less,
                    _ => std::cmp::Ordering::Equal,
                }
            })
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| a.metadata.created_at.cmp(&b.metadata.created_at))
    });
}
