//! Memory manager: task context lifecycle and evidence synthesis.

use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::code_docs::{CodeDocumentation, CodeRef};
use super::registry::{infer_language, FileRegistry};
use super::types::{
    Action, CompletionProof, Evidence, EvidenceType, FileRef, FileType, TaskContext,
    TaskContextExport, TaskMetadata, TaskType, EXPORT_FORMAT_VERSION,
};

/// Content markers that make a file count as implementation evidence.
const CODE_MARKERS: &[&str] = &["def ", "function ", "class ", "import "];

/// Extensions that classify a file as code.
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "mjs", "ts", "tsx", "jsx", "java", "rs", "go", "rb", "c", "h", "cpp", "cc", "sh",
];

/// Query over a task's evidence log.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    /// Evidence types to include; empty means all.
    pub types: Vec<EvidenceType>,
    /// Result cap; `None` means unbounded.
    pub max_results: Option<usize>,
}

impl MemoryQuery {
    pub fn of_types(types: Vec<EvidenceType>) -> Self {
        Self {
            types,
            max_results: None,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// Owner of every task context.
///
/// Appending an action and deriving its evidence happens under one lock,
/// so no reader ever observes an action without its evidence.
#[derive(Clone, Default)]
pub struct MemoryManager {
    contexts: Arc<Mutex<HashMap<String, TaskContext>>>,
    registry: Arc<Mutex<FileRegistry>>,
    code_docs: CodeDocumentation,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a task context and return its id.
    pub fn create_task(&self, task: impl Into<String>, task_type: TaskType) -> String {
        self.create_task_with_metadata(task, task_type, TaskMetadata::default())
    }

    /// Create a task context with priority/complexity/tag metadata.
    pub fn create_task_with_metadata(
        &self,
        task: impl Into<String>,
        task_type: TaskType,
        metadata: TaskMetadata,
    ) -> String {
        let mut ctx = TaskContext::new(task, task_type);
        ctx.metadata = metadata;
        let task_id = ctx.task_id.clone();
        info!(task_id, task_type = %task_type, "task created");
        self.contexts.lock().unwrap().insert(task_id.clone(), ctx);
        task_id
    }

    /// Append an action, derive its evidence, and index any produced files.
    ///
    /// Returns the derived evidence. Mutation is atomic with respect to
    /// every query surface on this manager.
    pub fn add_action(&self, task_id: &str, mut action: Action) -> Result<Vec<Evidence>> {
        let mut contexts = self.contexts.lock().unwrap();
        let ctx = contexts
            .get_mut(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;

        action.task_id = task_id.to_string();

        // Materialize a written file before derivation so the evidence can
        // reference its analysis.
        let written = if action.action_type == "write_file" && action.success {
            self.materialize_file(ctx, &action)
        } else {
            None
        };

        let code_ref = written.as_ref().and_then(|file| {
            if file.file_type == FileType::Code {
                let language = file.metadata.language.clone()?;
                Some(
                    self.code_docs
                        .analyze(&file.file_path, &file.content, &language),
                )
            } else {
                None
            }
        });

        let evidence = derive_evidence(&action, written.as_ref(), code_ref.as_ref());
        action.evidence_ids = evidence.iter().map(|e| e.evidence_id.clone()).collect();

        debug!(
            task_id,
            action = action.action_type,
            evidence = evidence.len(),
            "action recorded"
        );

        ctx.actions.push(action);
        ctx.evidence.extend(evidence.iter().cloned());
        ctx.updated_at = Utc::now();

        Ok(evidence)
    }

    /// Record a synthesized result, optionally materialized as an output file.
    pub fn set_result(
        &self,
        task_id: &str,
        result: &str,
        result_type: &str,
        file_path: Option<&str>,
    ) -> Result<Evidence> {
        let mut contexts = self.contexts.lock().unwrap();
        let ctx = contexts
            .get_mut(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;

        let evidence = Evidence::new(
            EvidenceType::Synthesis,
            result,
            0.9,
            format!("result:{}", result_type),
        )
        .with_metadata("result_type", result_type);

        if let Some(path) = file_path {
            if let Some(existing) = ctx.files.iter_mut().find(|f| f.file_path == path) {
                existing.set_content(result);
                let file_id = existing.file_id.clone();
                let _ = self.registry.lock().unwrap().update(&file_id, Some(result));
            } else {
                let file = FileRef::new(path, FileType::Output, result, "result");
                self.registry
                    .lock()
                    .unwrap()
                    .add(file.clone(), Some(task_id));
                ctx.files.push(file);
            }
        }

        ctx.evidence.push(evidence.clone());
        ctx.updated_at = Utc::now();
        Ok(evidence)
    }

    /// Snapshot of a task context.
    pub fn get_task_context(&self, task_id: &str) -> Result<TaskContext> {
        self.contexts
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::task_not_found(task_id))
    }

    /// Evidence matching a query, newest first.
    pub fn query_memories(&self, task_id: &str, query: &MemoryQuery) -> Result<Vec<Evidence>> {
        let contexts = self.contexts.lock().unwrap();
        let ctx = contexts
            .get(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;

        let mut matched: Vec<Evidence> = ctx
            .evidence
            .iter()
            .filter(|e| query.types.is_empty() || query.types.contains(&e.evidence_type))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(max) = query.max_results {
            matched.truncate(max);
        }
        Ok(matched)
    }

    /// Aggregate completion proof for validator consumption.
    pub fn completion_proof(&self, task_id: &str) -> Result<CompletionProof> {
        let contexts = self.contexts.lock().unwrap();
        let ctx = contexts
            .get(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;
        Ok(build_completion_proof(ctx))
    }

    /// Mark a task complete. Completion never reverts.
    pub fn mark_complete(&self, task_id: &str, evidence_ids: Vec<String>) -> Result<()> {
        let mut contexts = self.contexts.lock().unwrap();
        let ctx = contexts
            .get_mut(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;
        ctx.mark_complete(evidence_ids);
        Ok(())
    }

    /// Drop a task context and its indexed files.
    pub fn clear_task(&self, task_id: &str) -> Result<()> {
        self.contexts
            .lock()
            .unwrap()
            .remove(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;
        self.registry.lock().unwrap().remove_task(task_id);
        info!(task_id, "task cleared");
        Ok(())
    }

    /// Remove task contexts older than the TTL. Returns how many were dropped.
    pub fn cleanup_expired(&self, ttl_minutes: i64) -> usize {
        let cutoff = Utc::now() - Duration::minutes(ttl_minutes);
        let expired: Vec<String> = {
            let contexts = self.contexts.lock().unwrap();
            contexts
                .values()
                .filter(|ctx| ctx.updated_at < cutoff)
                .map(|ctx| ctx.task_id.clone())
                .collect()
        };

        for task_id in &expired {
            let _ = self.clear_task(task_id);
        }
        expired.len()
    }

    /// Files indexed for a task.
    pub fn files_for_task(&self, task_id: &str) -> Vec<FileRef> {
        self.registry
            .lock()
            .unwrap()
            .by_task(task_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Export a task context as a versioned JSON document.
    pub fn export_task(&self, task_id: &str) -> Result<String> {
        let ctx = self.get_task_context(task_id)?;
        Ok(serde_json::to_string_pretty(&TaskContextExport::new(ctx))?)
    }

    /// Import a previously exported task context. Returns its task id.
    pub fn import_task(&self, document: &str) -> Result<String> {
        let export: TaskContextExport = serde_json::from_str(document)?;
        if export.format_version != EXPORT_FORMAT_VERSION {
            return Err(Error::Config(format!(
                "unsupported export format version {}",
                export.format_version
            )));
        }

        let task_id = export.context.task_id.clone();
        {
            let mut registry = self.registry.lock().unwrap();
            for file in &export.context.files {
                registry.add(file.clone(), Some(&task_id));
            }
        }
        self.contexts
            .lock()
            .unwrap()
            .insert(task_id.clone(), export.context);
        Ok(task_id)
    }

    /// Number of live task contexts.
    pub fn task_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    /// Create or update the file described by a successful `write_file`
    /// action and mirror it into the registry.
    fn materialize_file(&self, ctx: &mut TaskContext, action: &Action) -> Option<FileRef> {
        let path = file_path_from_inputs(&action.inputs)?;
        let content = action
            .inputs
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if let Some(existing) = ctx.files.iter_mut().find(|f| f.file_path == path) {
            existing.set_content(content.as_str());
            let file = existing.clone();
            let mut registry = self.registry.lock().unwrap();
            let _ = registry.update(&file.file_id, Some(content.as_str()));
            return Some(file);
        }

        let file_type = classify_file(&path, &content);
        let mut file = FileRef::new(&path, file_type, &content, &action.action_id);
        file.metadata.language = infer_language(&path, &content);

        if file.file_type == FileType::Code {
            if let Some(language) = file.metadata.language.clone() {
                let code = self.code_docs.analyze(&path, &content, &language);
                file.metadata.functions = code.functions.clone();
                file.metadata.classes = code.classes.clone();
                file.metadata.imports = code.imports.clone();
                file.metadata.complexity = code.complexity;
            }
        }

        ctx.files.push(file.clone());
        self.registry
            .lock()
            .unwrap()
            .add(file.clone(), Some(&ctx.task_id));
        Some(file)
    }
}

/// Pull a file path out of action inputs under any conventional key.
fn file_path_from_inputs(inputs: &Value) -> Option<String> {
    ["path", "file_path", "filename", "file"]
        .iter()
        .find_map(|key| inputs.get(key).and_then(Value::as_str))
        .map(String::from)
}

/// Classify an artifact from its path and content.
pub(crate) fn classify_file(path: &str, content: &str) -> FileType {
    let extension = path
        .rsplit(['/', '\\'])
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some(ext) if CODE_EXTENSIONS.contains(&ext) => FileType::Code,
        Some("md") | Some("rst") | Some("txt") => FileType::Documentation,
        Some("json") | Some("csv") | Some("xml") => FileType::Data,
        Some("yml") | Some("yaml") | Some("toml") | Some("ini") | Some("cfg") => FileType::Config,
        _ => {
            if CODE_MARKERS.iter().any(|m| content.contains(m)) {
                FileType::Code
            } else {
                FileType::Output
            }
        }
    }
}

/// Derive evidence from an action.
///
/// Deterministic: the same action (plus its materialized file and code
/// analysis) always produces the same evidence set, in the same order, with
/// timestamps copied from the action. Only the generated ids differ.
pub(crate) fn derive_evidence(
    action: &Action,
    written: Option<&FileRef>,
    code_ref: Option<&CodeRef>,
) -> Vec<Evidence> {
    let mut evidence = Vec::new();

    if let Some(file) = written {
        evidence.push(
            Evidence::new(
                EvidenceType::FileCreation,
                format!("Created file {}", file.file_path),
                1.0,
                &action.action_id,
            )
            .with_metadata("file_type", file.file_type.to_string())
            .with_metadata("file_size", file.size as u64)
            .with_timestamp(action.timestamp),
        );
    }

    if let Some(code) = code_ref {
        evidence.push(
            Evidence::new(
                EvidenceType::CodeImplementation,
                format!(
                    "Implemented {} function(s) in {}",
                    code.functions.len(),
                    code.language
                ),
                0.9,
                &action.action_id,
            )
            .with_metadata("language", code.language.clone())
            .with_metadata("function_count", code.functions.len() as u64)
            .with_metadata("complexity", code.complexity)
            .with_timestamp(action.timestamp),
        );

        if code.has_docs {
            evidence.push(
                Evidence::new(
                    EvidenceType::Documentation,
                    format!("Documented code in {}", code.language),
                    0.8,
                    &action.action_id,
                )
                .with_timestamp(action.timestamp),
            );
        }
    }

    if let Some(file) = written {
        if file.file_type == FileType::Documentation {
            evidence.push(
                Evidence::new(
                    EvidenceType::Documentation,
                    format!("Wrote documentation {}", file.file_path),
                    0.9,
                    &action.action_id,
                )
                .with_timestamp(action.timestamp),
            );
        }
    }

    let synthesized_file = written.map(FileRef::signals_answer).unwrap_or(false);
    if action.action_type == "synthesize_answer" && action.success || synthesized_file {
        let content = written
            .map(|f| format!("Synthesized answer in {}", f.file_path))
            .unwrap_or_else(|| "Synthesized answer".to_string());
        evidence.push(
            Evidence::new(EvidenceType::Synthesis, content, 0.9, &action.action_id)
                .with_timestamp(action.timestamp),
        );
    }

    if action.action_type == "validate" && action.success {
        let confidence = action
            .outputs
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5);
        let completed = action
            .outputs
            .get("completed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        evidence.push(
            Evidence::new(
                EvidenceType::Validation,
                format!("Validator verdict: completed={}", completed),
                confidence,
                &action.action_id,
            )
            .with_timestamp(action.timestamp),
        );
    }

    if action.success {
        evidence.push(
            Evidence::new(
                EvidenceType::Execution,
                format!("Executed {}", action.action_type),
                1.0,
                &action.action_id,
            )
            .with_timestamp(action.timestamp),
        );
    }

    evidence
}

/// Build the aggregate completion proof from a context snapshot.
pub(crate) fn build_completion_proof(ctx: &TaskContext) -> CompletionProof {
    let file_creation_entries: Vec<String> = ctx
        .evidence_of_type(EvidenceType::FileCreation)
        .iter()
        .map(|e| e.content.clone())
        .collect();

    let mut synthesis_entries: Vec<String> = ctx
        .evidence_of_type(EvidenceType::Synthesis)
        .iter()
        .map(|e| e.content.clone())
        .collect();
    let mut implementation_entries: Vec<String> = ctx
        .evidence_of_type(EvidenceType::CodeImplementation)
        .iter()
        .map(|e| e.content.clone())
        .collect();

    for file in &ctx.files {
        if file.signals_answer() {
            synthesis_entries.push(format!("answer file {}", file.file_path));
        }
        if file.looks_like_code() {
            implementation_entries.push(format!("code file {}", file.file_path));
        }
    }

    let completion_entries: Vec<String> = ctx
        .evidence_of_type(EvidenceType::Validation)
        .iter()
        .map(|e| e.content.clone())
        .chain(ctx.completion_evidence.iter().cloned())
        .collect();

    CompletionProof {
        has_file_creation: !file_creation_entries.is_empty(),
        has_synthesis: !synthesis_entries.is_empty(),
        has_implementation: !implementation_entries.is_empty(),
        file_creation_entries,
        synthesis_entries,
        implementation_entries,
        completion_entries,
        created_files: ctx.files.iter().map(|f| f.file_path.clone()).collect(),
        total_files: ctx.files.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn write_file_action(task_id: &str, path: &str, content: &str) -> Action {
        Action::new(
            task_id,
            "write_file",
            json!({"path": path, "content": content}),
            json!({"status": "ok"}),
            true,
        )
    }

    #[test]
    fn test_create_and_get_task() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("What is 2+2?", TaskType::SimpleQuestion);

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert_eq!(ctx.task, "What is 2+2?");
        assert_eq!(ctx.task_type, TaskType::SimpleQuestion);
        assert!(memory.get_task_context("task-unknown").is_err());
    }

    #[test]
    fn test_create_task_with_metadata() {
        let memory = MemoryManager::new();
        let metadata = TaskMetadata {
            priority: 2,
            estimated_complexity: 5,
            tags: vec!["ops".to_string()],
        };
        let task_id =
            memory.create_task_with_metadata("deploy", TaskType::GeneralTask, metadata.clone());

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert_eq!(ctx.metadata, metadata);
    }

    #[test]
    fn test_write_file_derives_creation_synthesis_execution() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::SimpleQuestion);

        let evidence = memory
            .add_action(&task_id, write_file_action(&task_id, "answer.md", "The answer is 4"))
            .unwrap();

        let types: Vec<EvidenceType> = evidence.iter().map(|e| e.evidence_type).collect();
        assert!(types.contains(&EvidenceType::FileCreation));
        assert!(types.contains(&EvidenceType::Synthesis));
        assert!(types.contains(&EvidenceType::Execution));

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert_eq!(ctx.files.len(), 1);
        assert_eq!(ctx.files[0].file_type, FileType::Documentation);
        assert_eq!(memory.files_for_task(&task_id).len(), 1);
    }

    #[test]
    fn test_code_file_derives_implementation_and_docs() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("solve two sum", TaskType::CodingTask);

        let content = "def two_sum(nums, target):\n    \"\"\"docs\"\"\"\n    return []\n";
        let evidence = memory
            .add_action(&task_id, write_file_action(&task_id, "two_sum.py", content))
            .unwrap();

        let types: Vec<EvidenceType> = evidence.iter().map(|e| e.evidence_type).collect();
        assert!(types.contains(&EvidenceType::CodeImplementation));
        assert!(types.contains(&EvidenceType::Documentation));

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert_eq!(ctx.files[0].metadata.functions, vec!["two_sum"]);
        assert_eq!(ctx.files[0].metadata.language.as_deref(), Some("python"));
    }

    #[test]
    fn test_failed_action_yields_no_execution_evidence() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::GeneralTask);

        let action = Action::new(
            &task_id,
            "search_web",
            json!({"query": "x"}),
            json!({"error": "timeout"}),
            false,
        );
        let evidence = memory.add_action(&task_id, action).unwrap();
        assert!(evidence.is_empty());

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert_eq!(ctx.actions.len(), 1);
        assert!(!ctx.actions[0].success);
    }

    #[test]
    fn test_evidence_ids_recorded_on_action() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::SimpleQuestion);
        memory
            .add_action(&task_id, write_file_action(&task_id, "answer.md", "4"))
            .unwrap();

        let ctx = memory.get_task_context(&task_id).unwrap();
        let action = &ctx.actions[0];
        assert!(!action.evidence_ids.is_empty());
        for (offset, evidence_id) in action.evidence_ids.iter().enumerate() {
            assert_eq!(&ctx.evidence[offset].evidence_id, evidence_id);
            assert_eq!(ctx.evidence[offset].source, action.action_id);
        }
    }

    #[test]
    fn test_rewrite_updates_existing_file() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::GeneralTask);

        memory
            .add_action(&task_id, write_file_action(&task_id, "out.txt", "v1"))
            .unwrap();
        memory
            .add_action(&task_id, write_file_action(&task_id, "out.txt", "v2"))
            .unwrap();

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert_eq!(ctx.files.len(), 1);
        assert_eq!(ctx.files[0].content, "v2");
    }

    #[test]
    fn test_set_result_records_synthesis_and_output_file() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::SimpleQuestion);

        memory
            .set_result(&task_id, "The answer is 4", "answer", Some("result.out"))
            .unwrap();

        let ctx = memory.get_task_context(&task_id).unwrap();
        assert!(ctx.has_evidence(EvidenceType::Synthesis));
        assert_eq!(ctx.files[0].file_type, FileType::Output);
    }

    #[test]
    fn test_query_memories_filters_and_caps() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::SimpleQuestion);
        memory
            .add_action(&task_id, write_file_action(&task_id, "answer.md", "4"))
            .unwrap();

        let executions = memory
            .query_memories(&task_id, &MemoryQuery::of_types(vec![EvidenceType::Execution]))
            .unwrap();
        assert_eq!(executions.len(), 1);

        let capped = memory
            .query_memories(&task_id, &MemoryQuery::default().with_max_results(1))
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_completion_proof_aggregates() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("solve", TaskType::CodingTask);
        memory
            .add_action(
                &task_id,
                write_file_action(&task_id, "solution.py", "def solve():\n    return 4\n"),
            )
            .unwrap();

        let proof = memory.completion_proof(&task_id).unwrap();
        assert!(proof.has_file_creation);
        assert!(proof.has_implementation);
        // "solution.py" matches the synthesis name heuristic
        assert!(proof.has_synthesis);
        assert_eq!(proof.total_files, 1);
        assert_eq!(proof.created_files, vec!["solution.py"]);
    }

    #[test]
    fn test_export_import_round_trip() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::SimpleQuestion);
        memory
            .add_action(&task_id, write_file_action(&task_id, "answer.md", "4"))
            .unwrap();

        let document = memory.export_task(&task_id).unwrap();
        let original = memory.get_task_context(&task_id).unwrap();

        let other = MemoryManager::new();
        let imported_id = other.import_task(&document).unwrap();
        assert_eq!(imported_id, task_id);

        let imported = other.get_task_context(&task_id).unwrap();
        assert_eq!(imported, original);
        assert_eq!(imported.files[0].checksum, original.files[0].checksum);
        assert_eq!(other.files_for_task(&task_id).len(), 1);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("q", TaskType::SimpleQuestion);
        let document = memory.export_task(&task_id).unwrap();
        let tampered = document.replacen("\"format_version\": 1", "\"format_version\": 99", 1);

        assert!(matches!(
            MemoryManager::new().import_task(&tampered),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_cleanup_expired_drops_stale_tasks() {
        let memory = MemoryManager::new();
        let task_id = memory.create_task("old", TaskType::GeneralTask);

        {
            let mut contexts = memory.contexts.lock().unwrap();
            let ctx = contexts.get_mut(&task_id).unwrap();
            ctx.updated_at = Utc::now() - Duration::minutes(120);
        }
        let fresh_id = memory.create_task("fresh", TaskType::GeneralTask);

        let dropped = memory.cleanup_expired(60);
        assert_eq!(dropped, 1);
        assert!(memory.get_task_context(&task_id).is_err());
        assert!(memory.get_task_context(&fresh_id).is_ok());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let action = write_file_action("task-1", "lib.py", "def f():\n    return 1\n");
        let file = FileRef::new("lib.py", FileType::Code, "def f():\n    return 1\n", "a");
        let code = CodeDocumentation::new().analyze("lib.py", &file.content, "python");

        let first = derive_evidence(&action, Some(&file), Some(&code));
        let second = derive_evidence(&action, Some(&file), Some(&code));

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.evidence_type, b.evidence_type);
            assert_eq!(a.content, b.content);
            assert_eq!(a.confidence, b.confidence);
            assert_eq!(a.source, b.source);
            assert_eq!(a.timestamp, b.timestamp);
        }
    }

    #[test]
    fn test_classify_file() {
        assert_eq!(classify_file("x.py", ""), FileType::Code);
        assert_eq!(classify_file("notes.md", ""), FileType::Documentation);
        assert_eq!(classify_file("data.json", ""), FileType::Data);
        assert_eq!(classify_file("app.yaml", ""), FileType::Config);
        assert_eq!(classify_file("script", "def f(): pass"), FileType::Code);
        assert_eq!(classify_file("result", "plain text"), FileType::Output);
    }
}
