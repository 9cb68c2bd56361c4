//! Core memory entities: task contexts, actions, evidence, and file refs.
//!
//! All cross-references are opaque string ids; the entities never hold
//! pointers to each other, so contexts serialize cleanly and survive
//! export/import round trips.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Version tag carried by exported task contexts.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Generate a prefixed opaque id, e.g. `act-5b3e…`.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Task classification driving completion rules and planner prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SimpleQuestion,
    CodingTask,
    ResearchTask,
    GeneralTask,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SimpleQuestion => "simple_question",
            Self::CodingTask => "coding_task",
            Self::ResearchTask => "research_task",
            Self::GeneralTask => "general_task",
        };
        write!(f, "{}", s)
    }
}

/// Reserved action verbs handled by the orchestrator itself rather than
/// routed through the tool bridge.
pub const RESERVED_ACTIONS: &[&str] = &[
    "synthesize_answer",
    "validate",
    "test_example",
    "implement_code",
    "extract_data",
];

/// Priority and bookkeeping attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub estimated_complexity: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A recorded invocation of a tool or reserved verb against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Opaque unique id.
    pub action_id: String,
    /// Tool name or reserved verb.
    pub action_type: String,
    /// Parameters the action was invoked with.
    pub inputs: Value,
    /// What the action produced (tool result, synthesized text, …).
    pub outputs: Value,
    /// Whether the action succeeded.
    pub success: bool,
    /// When the action completed.
    pub timestamp: DateTime<Utc>,
    /// Owning task.
    pub task_id: String,
    /// Evidence derived from this action, in derivation order.
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

impl Action {
    /// Create an action against a task. The timestamp defaults to now and
    /// can be overridden for reconstructed timelines.
    pub fn new(
        task_id: impl Into<String>,
        action_type: impl Into<String>,
        inputs: Value,
        outputs: Value,
        success: bool,
    ) -> Self {
        Self {
            action_id: new_id("act"),
            action_type: action_type.into(),
            inputs,
            outputs,
            success,
            timestamp: Utc::now(),
            task_id: task_id.into(),
            evidence_ids: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether this action is a reserved verb rather than a bridge tool.
    pub fn is_reserved(&self) -> bool {
        RESERVED_ACTIONS.contains(&self.action_type.as_str())
    }
}

/// Classes of evidence derived from actions and validator verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    FileCreation,
    CodeImplementation,
    Documentation,
    Synthesis,
    Execution,
    Validation,
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FileCreation => "file_creation",
            Self::CodeImplementation => "code_implementation",
            Self::Documentation => "documentation",
            Self::Synthesis => "synthesis",
            Self::Execution => "execution",
            Self::Validation => "validation",
        };
        write!(f, "{}", s)
    }
}

/// A typed, time-stamped assertion derived from an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_id: String,
    pub evidence_type: EvidenceType,
    pub content: String,
    /// Confidence in the assertion, 0.0-1.0.
    pub confidence: f64,
    /// The action this evidence was derived from.
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Evidence {
    pub fn new(
        evidence_type: EvidenceType,
        content: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            evidence_id: new_id("ev"),
            evidence_type,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Broad artifact classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Code,
    Documentation,
    Data,
    Config,
    Output,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Documentation => "documentation",
            Self::Data => "data",
            Self::Config => "config",
            Self::Output => "output",
        };
        write!(f, "{}", s)
    }
}

/// Static-analysis metadata attached to a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub complexity: u32,
}

/// An artifact produced during a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub file_path: String,
    pub file_type: FileType,
    pub content: String,
    pub size: usize,
    /// The action that created this file.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Truncated SHA-256 of the content, hex-encoded.
    pub checksum: String,
    #[serde(default)]
    pub metadata: FileMetadata,
}

impl FileRef {
    pub fn new(
        file_path: impl Into<String>,
        file_type: FileType,
        content: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            file_id: new_id("file"),
            file_path: file_path.into(),
            file_type,
            size: content.len(),
            checksum: content_checksum(&content),
            content,
            created_by: created_by.into(),
            created_at: now,
            modified_at: now,
            metadata: FileMetadata::default(),
        }
    }

    /// Replace the content, refreshing size, checksum, and modified time.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.size = self.content.len();
        self.checksum = content_checksum(&self.content);
        self.modified_at = Utc::now();
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_path)
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        name.rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Whether the file name or extension signals a synthesized answer
    /// (`answer`/`summary`/`solution`/`recommendations`, or markdown).
    pub fn signals_answer(&self) -> bool {
        let name = self.file_name().to_ascii_lowercase();
        ["answer", "summary", "solution", "recommendations"]
            .iter()
            .any(|marker| name.contains(marker))
            || self.extension().as_deref() == Some("md")
    }

    /// Whether the file looks like source code, by extension or content
    /// markers (`def `, `function `, `class `, `import `).
    pub fn looks_like_code(&self) -> bool {
        const CODE_EXTENSIONS: &[&str] = &[
            "py", "js", "mjs", "ts", "tsx", "jsx", "java", "rs", "go", "rb", "c", "h", "cpp",
            "cc", "sh",
        ];
        if let Some(ext) = self.extension() {
            if CODE_EXTENSIONS.contains(&ext.as_str()) {
                return true;
            }
        }
        ["def ", "function ", "class ", "import "]
            .iter()
            .any(|marker| self.content.contains(marker))
    }
}

/// Truncated SHA-256 content hash (128-bit hex).
pub(crate) fn content_checksum(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(content.as_bytes());
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Everything the memory manager knows about one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: String,
    pub task: String,
    pub task_type: TaskType,
    /// Executed actions in strict execution order. Append-only.
    pub actions: Vec<Action>,
    /// Evidence in derivation order.
    pub evidence: Vec<Evidence>,
    /// Files created inside this task, in creation order.
    pub files: Vec<FileRef>,
    /// Whether the task was marked complete. Never reverts to false.
    pub complete: bool,
    /// Evidence ids supporting completion.
    #[serde(default)]
    pub completion_evidence: Vec<String>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskContext {
    pub fn new(task: impl Into<String>, task_type: TaskType) -> Self {
        let now = Utc::now();
        Self {
            task_id: new_id("task"),
            task: task.into(),
            task_type,
            actions: Vec::new(),
            evidence: Vec::new(),
            files: Vec::new(),
            complete: false,
            completion_evidence: Vec::new(),
            metadata: TaskMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Evidence entries of one type.
    pub fn evidence_of_type(&self, evidence_type: EvidenceType) -> Vec<&Evidence> {
        self.evidence
            .iter()
            .filter(|e| e.evidence_type == evidence_type)
            .collect()
    }

    /// Whether any evidence of the given type exists.
    pub fn has_evidence(&self, evidence_type: EvidenceType) -> bool {
        self.evidence
            .iter()
            .any(|e| e.evidence_type == evidence_type)
    }

    /// Files of one type.
    pub fn files_of_type(&self, file_type: FileType) -> Vec<&FileRef> {
        self.files
            .iter()
            .filter(|f| f.file_type == file_type)
            .collect()
    }

    /// Timestamp of the most recent evidence, if any.
    pub fn latest_evidence_at(&self) -> Option<DateTime<Utc>> {
        self.evidence.iter().map(|e| e.timestamp).max()
    }

    /// Timestamp of the most recent action, if any.
    pub fn latest_action_at(&self) -> Option<DateTime<Utc>> {
        self.actions.iter().map(|a| a.timestamp).max()
    }

    /// Mark the context complete. Completion is sticky.
    pub fn mark_complete(&mut self, evidence_ids: Vec<String>) {
        self.complete = true;
        self.completion_evidence.extend(evidence_ids);
        self.updated_at = Utc::now();
    }
}

/// Aggregate view the memory manager publishes for validator consumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionProof {
    pub has_file_creation: bool,
    pub has_synthesis: bool,
    pub has_implementation: bool,
    pub file_creation_entries: Vec<String>,
    pub synthesis_entries: Vec<String>,
    pub implementation_entries: Vec<String>,
    pub completion_entries: Vec<String>,
    pub created_files: Vec<String>,
    pub total_files: usize,
}

/// Versioned export envelope for a task context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContextExport {
    pub format_version: u32,
    pub context: TaskContext,
}

impl TaskContextExport {
    pub fn new(context: TaskContext) -> Self {
        Self {
            format_version: EXPORT_FORMAT_VERSION,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        let a = new_id("act");
        let b = new_id("act");
        assert!(a.starts_with("act-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_checksum_is_stable_128_bit_hex() {
        let first = content_checksum("hello");
        let second = content_checksum("hello");
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert_ne!(first, content_checksum("hello!"));
    }

    #[test]
    fn test_file_ref_tracks_content() {
        let mut file = FileRef::new("answer.md", FileType::Documentation, "# 4", "act-1");
        assert_eq!(file.size, 3);
        let original_checksum = file.checksum.clone();

        file.set_content("# Answer\n\n4");
        assert_eq!(file.size, 11);
        assert_ne!(file.checksum, original_checksum);
    }

    #[test]
    fn test_file_name_and_extension() {
        let file = FileRef::new("workspace/src/two_sum.py", FileType::Code, "", "act-1");
        assert_eq!(file.file_name(), "two_sum.py");
        assert_eq!(file.extension().as_deref(), Some("py"));

        let no_ext = FileRef::new("Makefile", FileType::Config, "", "act-1");
        assert_eq!(no_ext.extension(), None);
    }

    #[test]
    fn test_completion_is_sticky() {
        let mut ctx = TaskContext::new("task", TaskType::GeneralTask);
        ctx.mark_complete(vec!["ev-1".to_string()]);
        assert!(ctx.complete);
        ctx.mark_complete(vec!["ev-2".to_string()]);
        assert_eq!(ctx.completion_evidence.len(), 2);
        assert!(ctx.complete);
    }

    #[test]
    fn test_reserved_action_detection() {
        let reserved = Action::new("t", "synthesize_answer", json!({}), json!({}), true);
        let tool = Action::new("t", "write_file", json!({}), json!({}), true);
        assert!(reserved.is_reserved());
        assert!(!tool.is_reserved());
    }

    #[test]
    fn test_evidence_confidence_clamped() {
        let ev = Evidence::new(EvidenceType::Execution, "ran", 1.7, "act-1");
        assert_eq!(ev.confidence, 1.0);
    }

    #[test]
    fn test_export_round_trip() {
        let mut ctx = TaskContext::new("What is 2+2?", TaskType::SimpleQuestion);
        let action = Action::new(&ctx.task_id, "calculate", json!({"e": "2+2"}), json!("4"), true);
        ctx.evidence
            .push(Evidence::new(EvidenceType::Execution, "ran calculate", 1.0, &action.action_id));
        ctx.actions.push(action);
        ctx.files
            .push(FileRef::new("answer.md", FileType::Documentation, "4", "act-x"));

        let export = TaskContextExport::new(ctx.clone());
        let json = serde_json::to_string(&export).unwrap();
        let back: TaskContextExport = serde_json::from_str(&json).unwrap();

        assert_eq!(back.format_version, EXPORT_FORMAT_VERSION);
        assert_eq!(back.context, ctx);
        assert_eq!(back.context.files[0].checksum, ctx.files[0].checksum);
    }
}
