//! Tool bridge adapter.
//!
//! The search core drives external tools through the [`ToolClient`] trait:
//! `list_tools` describes the catalogue with JSON schemas, `execute` runs a
//! tool by name. Expected tool failures never surface as `Err` — they come
//! back in-band as [`ToolResult::Err`] with a structured kind, so the
//! orchestrator can demerit the plan and keep searching.

mod client;
mod types;

pub use client::{HttpToolClient, StaticToolClient, ToolClient};
pub use types::{ToolErrorKind, ToolResult, ToolSpec};
