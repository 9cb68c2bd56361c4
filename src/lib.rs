//! # frontier-core
//!
//! A failure-aware best-first search core for LLM tool-using agents.
//!
//! The library couples a scored frontier search over candidate plans with a
//! per-task evidence memory and an LLM validator. Each iteration the
//! orchestrator proposes plans, rewrites risky ones against a failure
//! catalogue, scores and picks one, executes it through a tool bridge, and
//! ingests the outcome as typed evidence until the validator confirms
//! completion or a stop condition fires.
//!
//! ## Core Components
//!
//! - **tools / llm**: thin adapters over the tool bridge and chat-completion
//!   endpoints; expected tool failures stay in-band, rate limiting and retry
//!   stay inside the LLM adapter
//! - **memory**: task contexts, actions, evidence derivation, file registry,
//!   and code analysis
//! - **planning**: LLM plan proposal plus the failure catalogue
//! - **completion / validator**: acceptance rules as data, and the LLM judge
//!   that reads the completion proof
//! - **orchestrator**: the best-first search loop tying it all together
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use frontier_core::{
//!     BfsOrchestrator, HttpToolClient, LlmClientConfig, OpenAiCompatClient,
//!     SearchConfig, TaskType,
//! };
//!
//! let tools = Arc::new(HttpToolClient::new("http://localhost:8700"));
//! let llm = Arc::new(OpenAiCompatClient::new(LlmClientConfig::new(api_key)));
//! let orchestrator = BfsOrchestrator::new(tools, llm, SearchConfig::from_env());
//!
//! let report = orchestrator.run("What is 2+2?", TaskType::SimpleQuestion).await?;
//! println!("{}: {}", report.status, report.reason);
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod llm;
pub mod loop_prevention;
pub mod memory;
pub mod orchestrator;
pub mod planning;
pub mod tools;
pub mod trajectory;
pub mod validator;

// Re-exports for convenience
pub use completion::CompletionRules;
pub use config::{SearchConfig, ValidatorMode};
pub use error::{Error, Result};
pub use llm::{
    ChatMessage, ChatRole, LlmClient, LlmClientConfig, OpenAiCompatClient, RateLimit, RetryConfig,
    ScriptedLlm,
};
pub use loop_prevention::{LoopConfig, LoopDetection, LoopPrevention};
pub use memory::{
    Action, CodeDocumentation, CodeRef, CompletionProof, Evidence, EvidenceType, FileMetadata,
    FileRef, FileRegistry, FileType, MemoryManager, MemoryQuery, TaskContext, TaskContextExport,
    TaskMetadata, TaskType,
};
pub use orchestrator::{BfsOrchestrator, SearchMetrics, TaskReport, Termination};
pub use planning::{
    FailureCatalogue, FailurePattern, PlanMetadata, PlanNode, Planner, Scenario, ScenarioOutcome,
};
pub use tools::{HttpToolClient, StaticToolClient, ToolClient, ToolErrorKind, ToolResult, ToolSpec};
pub use trajectory::{SearchEvent, SearchEventType};
pub use validator::{ValidationResult, Validator};
