//! Evidence-based completion rules per task type.
//!
//! The rules are pure functions over a [`TaskContext`] snapshot: the same
//! table drives the orchestrator's own completion check and the validator's
//! prompt, so acceptance policy lives in data, not in prompt text.

use regex::Regex;
use std::sync::LazyLock;

use crate::memory::{EvidenceType, FileType, TaskContext, TaskType};

/// Structural markers that make a documentation file count as research output.
static RESEARCH_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(^#{1,6}\s+\S|\b(summary|findings|conclusion)\b)").expect("Invalid regex")
});

/// Minimum length for a direct answer file.
const MIN_ANSWER_LENGTH: usize = 20;

/// Minimum length for a research document.
const MIN_RESEARCH_LENGTH: usize = 100;

/// Stateless completion predicate and diagnostics per task type.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionRules;

impl CompletionRules {
    pub fn new() -> Self {
        Self
    }

    /// Whether the context satisfies the completion rule for its task type.
    pub fn check(&self, ctx: &TaskContext) -> bool {
        match ctx.task_type {
            TaskType::SimpleQuestion => self.check_simple_question(ctx),
            TaskType::CodingTask => self.check_coding_task(ctx),
            TaskType::ResearchTask => self.check_research_task(ctx),
            TaskType::GeneralTask => self.check_general_task(ctx),
        }
    }

    /// Evidence types a task type must accumulate before acceptance.
    pub fn required_evidence(&self, task_type: TaskType) -> Vec<EvidenceType> {
        match task_type {
            TaskType::SimpleQuestion => {
                vec![EvidenceType::FileCreation, EvidenceType::Synthesis]
            }
            TaskType::CodingTask => vec![
                EvidenceType::CodeImplementation,
                EvidenceType::FileCreation,
                EvidenceType::Documentation,
            ],
            TaskType::ResearchTask => {
                vec![EvidenceType::Documentation, EvidenceType::Synthesis]
            }
            TaskType::GeneralTask => {
                vec![EvidenceType::FileCreation, EvidenceType::Execution]
            }
        }
    }

    /// Human-readable acceptance criteria, used in validator prompts and
    /// diagnostics.
    pub fn criteria(&self, task_type: TaskType) -> Vec<&'static str> {
        match task_type {
            TaskType::SimpleQuestion => vec![
                "an answer file was created",
                "the answer was synthesized, or a direct answer file holds substantive content",
            ],
            TaskType::CodingTask => vec![
                "code was implemented with at least one function or class declaration",
                "the implementation has non-trivial structure",
                "the code carries documentation (inline docs or a separate document)",
            ],
            TaskType::ResearchTask => vec![
                "a structured research document of substantive length exists",
                "information was gathered (search, file reads, or synthesis)",
            ],
            TaskType::GeneralTask => vec![
                "an output file was created",
                "at least one action executed successfully",
                "the output file has content",
            ],
        }
    }

    /// Fraction of required evidence types already present, in [0, 1].
    ///
    /// The orchestrator uses this as its estimated-value heuristic for
    /// validation scheduling.
    pub fn evidence_coverage(&self, ctx: &TaskContext) -> f64 {
        let required = self.required_evidence(ctx.task_type);
        if required.is_empty() {
            return 1.0;
        }
        let satisfied = required
            .iter()
            .filter(|t| ctx.has_evidence(**t))
            .count();
        satisfied as f64 / required.len() as f64
    }

    fn check_simple_question(&self, ctx: &TaskContext) -> bool {
        if !ctx.has_evidence(EvidenceType::FileCreation) {
            return false;
        }

        if ctx.has_evidence(EvidenceType::Synthesis) {
            return true;
        }

        ctx.files.iter().any(|file| {
            file.signals_answer()
                && file.content.trim().len() > MIN_ANSWER_LENGTH
                && !file.content.to_ascii_lowercase().contains("placeholder")
                && !file.content.contains("TODO")
        })
    }

    fn check_coding_task(&self, ctx: &TaskContext) -> bool {
        if !ctx.has_evidence(EvidenceType::CodeImplementation) {
            return false;
        }

        let has_real_construct = ctx
            .files_of_type(FileType::Code)
            .iter()
            .any(|file| has_code_construct(&file.content));
        if !has_real_construct {
            return false;
        }

        let sufficient_complexity = ctx.files_of_type(FileType::Code).iter().any(|file| {
            file.metadata.complexity > 1
                || !file.metadata.functions.is_empty()
                || !file.metadata.classes.is_empty()
        });
        if !sufficient_complexity {
            return false;
        }

        ctx.has_evidence(EvidenceType::Documentation)
            || ctx
                .files_of_type(FileType::Code)
                .iter()
                .any(|file| has_inline_docs(&file.content))
    }

    fn check_research_task(&self, ctx: &TaskContext) -> bool {
        let has_document = ctx.files.iter().any(|file| {
            matches!(file.file_type, FileType::Documentation | FileType::Output)
                && file.content.len() >= MIN_RESEARCH_LENGTH
                && RESEARCH_STRUCTURE.is_match(&file.content)
        });
        if !has_document {
            return false;
        }

        let gathered = ctx.actions.iter().any(|action| {
            action.success
                && (action.action_type.contains("search") || action.action_type.contains("read"))
        });
        gathered || ctx.has_evidence(EvidenceType::Synthesis)
    }

    fn check_general_task(&self, ctx: &TaskContext) -> bool {
        ctx.has_evidence(EvidenceType::FileCreation)
            && ctx.has_evidence(EvidenceType::Execution)
            && ctx.files.iter().any(|file| !file.content.trim().is_empty())
    }
}

/// Whether content declares a function or class in any supported language.
fn has_code_construct(content: &str) -> bool {
    static CONSTRUCT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)(\bdef\s+\w+\s*\(|\bfunction\s+\w+\s*\(|\bclass\s+\w+|\bfn\s+\w+\s*\(|=>)")
            .expect("Invalid regex")
    });
    CONSTRUCT.is_match(content)
}

/// Whether content carries inline documentation.
fn has_inline_docs(content: &str) -> bool {
    static DOCS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?m)(^\s*(?:#|//|///)\s*\S|"{3}|/\*)"#).expect("Invalid regex")
    });
    DOCS.is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Evidence, FileRef, TaskContext};

    fn ctx_with(
        task_type: TaskType,
        evidence: Vec<EvidenceType>,
        files: Vec<FileRef>,
    ) -> TaskContext {
        let mut ctx = TaskContext::new("task", task_type);
        for evidence_type in evidence {
            ctx.evidence
                .push(Evidence::new(evidence_type, "e", 1.0, "act-1"));
        }
        ctx.files = files;
        ctx
    }

    #[test]
    fn test_simple_question_needs_file_creation() {
        let rules = CompletionRules::new();
        let ctx = ctx_with(TaskType::SimpleQuestion, vec![EvidenceType::Synthesis], vec![]);
        assert!(!rules.check(&ctx));

        let ctx = ctx_with(
            TaskType::SimpleQuestion,
            vec![EvidenceType::FileCreation, EvidenceType::Synthesis],
            vec![],
        );
        assert!(rules.check(&ctx));
    }

    #[test]
    fn test_simple_question_direct_answer_file() {
        let rules = CompletionRules::new();

        let good = FileRef::new(
            "answer.md",
            FileType::Documentation,
            "The answer to the question is 4.",
            "act-1",
        );
        let ctx = ctx_with(
            TaskType::SimpleQuestion,
            vec![EvidenceType::FileCreation],
            vec![good],
        );
        assert!(rules.check(&ctx));

        let placeholder = FileRef::new(
            "answer.md",
            FileType::Documentation,
            "placeholder for the real answer text",
            "act-1",
        );
        let ctx = ctx_with(
            TaskType::SimpleQuestion,
            vec![EvidenceType::FileCreation],
            vec![placeholder],
        );
        assert!(!rules.check(&ctx));

        let todo = FileRef::new(
            "answer.md",
            FileType::Documentation,
            "TODO fill in the computed answer",
            "act-1",
        );
        let ctx = ctx_with(
            TaskType::SimpleQuestion,
            vec![EvidenceType::FileCreation],
            vec![todo],
        );
        assert!(!rules.check(&ctx));
    }

    #[test]
    fn test_coding_task_requires_construct_and_docs() {
        let rules = CompletionRules::new();

        let mut solution = FileRef::new(
            "two_sum.py",
            FileType::Code,
            "def two_sum(nums, target):\n    \"\"\"Find pair indices.\"\"\"\n    if not nums:\n        return []\n    return []\n",
            "act-1",
        );
        solution.metadata.functions = vec!["two_sum".to_string()];
        solution.metadata.complexity = 4;

        let ctx = ctx_with(
            TaskType::CodingTask,
            vec![EvidenceType::CodeImplementation],
            vec![solution],
        );
        assert!(rules.check(&ctx));

        // No code construct at all
        let prose = FileRef::new("solution.py", FileType::Code, "just words", "act-1");
        let ctx = ctx_with(
            TaskType::CodingTask,
            vec![EvidenceType::CodeImplementation],
            vec![prose],
        );
        assert!(!rules.check(&ctx));
    }

    #[test]
    fn test_coding_task_accepts_separate_documentation_evidence() {
        let rules = CompletionRules::new();
        let mut bare = FileRef::new(
            "lib.js",
            FileType::Code,
            "function add(a, b) { return a + b }",
            "act-1",
        );
        bare.metadata.functions = vec!["add".to_string()];

        let ctx = ctx_with(
            TaskType::CodingTask,
            vec![EvidenceType::CodeImplementation, EvidenceType::Documentation],
            vec![bare],
        );
        assert!(rules.check(&ctx));
    }

    #[test]
    fn test_research_task_structure_and_gathering() {
        let rules = CompletionRules::new();

        let report = FileRef::new(
            "report.md",
            FileType::Documentation,
            format!(
                "# Findings\n\n{}\n\n## Conclusion\n\nDone.",
                "Detailed analysis. ".repeat(10)
            ),
            "act-1",
        );
        let ctx = ctx_with(
            TaskType::ResearchTask,
            vec![EvidenceType::Synthesis],
            vec![report.clone()],
        );
        assert!(rules.check(&ctx));

        // Too short
        let stub = FileRef::new("report.md", FileType::Documentation, "# Findings", "act-1");
        let ctx = ctx_with(TaskType::ResearchTask, vec![EvidenceType::Synthesis], vec![stub]);
        assert!(!rules.check(&ctx));

        // Structured document but no gathering signal
        let ctx = ctx_with(TaskType::ResearchTask, vec![], vec![report]);
        assert!(!rules.check(&ctx));
    }

    #[test]
    fn test_general_task_needs_output_content() {
        let rules = CompletionRules::new();
        let output = FileRef::new("deploy.log", FileType::Output, "server started", "act-1");
        let ctx = ctx_with(
            TaskType::GeneralTask,
            vec![EvidenceType::FileCreation, EvidenceType::Execution],
            vec![output],
        );
        assert!(rules.check(&ctx));

        let empty = FileRef::new("deploy.log", FileType::Output, "   ", "act-1");
        let ctx = ctx_with(
            TaskType::GeneralTask,
            vec![EvidenceType::FileCreation, EvidenceType::Execution],
            vec![empty],
        );
        assert!(!rules.check(&ctx));
    }

    #[test]
    fn test_statelessness() {
        let rules = CompletionRules::new();
        let ctx = ctx_with(
            TaskType::GeneralTask,
            vec![EvidenceType::FileCreation, EvidenceType::Execution],
            vec![FileRef::new("out", FileType::Output, "data", "act-1")],
        );
        let clone = ctx.clone();
        assert_eq!(rules.check(&ctx), rules.check(&clone));
    }

    #[test]
    fn test_evidence_coverage() {
        let rules = CompletionRules::new();
        let ctx = ctx_with(TaskType::SimpleQuestion, vec![EvidenceType::FileCreation], vec![]);
        assert_eq!(rules.evidence_coverage(&ctx), 0.5);

        let full = ctx_with(
            TaskType::SimpleQuestion,
            vec![EvidenceType::FileCreation, EvidenceType::Synthesis],
            vec![],
        );
        assert_eq!(rules.evidence_coverage(&full), 1.0);
    }
}
