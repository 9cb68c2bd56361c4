//! Per-task memory: contexts, actions, evidence, and file artifacts.
//!
//! The [`MemoryManager`] owns every [`TaskContext`] from creation to cleanup.
//! Actions are appended in strict execution order and each append derives its
//! evidence before the next action is processed, so readers (validator,
//! completion rules, loop prevention) always see a consistent snapshot.
//!
//! ## Example
//!
//! ```rust,ignore
//! use frontier_core::memory::{MemoryManager, TaskType};
//!
//! let memory = MemoryManager::new();
//! let task_id = memory.create_task("What is 2+2?", TaskType::SimpleQuestion);
//!
//! memory.add_action(&task_id, action)?;
//! let proof = memory.completion_proof(&task_id)?;
//! assert!(proof.has_file_creation);
//! ```

mod code_docs;
mod manager;
mod proptest;
mod registry;
mod types;

pub use code_docs::{CodeDocumentation, CodeRef};
pub use manager::{MemoryManager, MemoryQuery};
pub use registry::FileRegistry;
pub use types::{
    Action, CompletionProof, Evidence, EvidenceType, FileMetadata, FileRef, FileType, TaskContext,
    TaskContextExport, TaskMetadata, TaskType, EXPORT_FORMAT_VERSION,
};
