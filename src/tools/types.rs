//! Tool catalogue and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default per-tool execution timeout in seconds.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// A tool advertised by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, unique within the catalogue.
    pub name: String,
    /// Human-readable description used in planner prompts.
    pub description: String,
    /// JSON schema for the tool's parameters.
    pub parameters: Value,
    /// Category label (e.g. "filesystem", "calculation", "remote_exec").
    pub category: String,
    /// Execution timeout for this tool.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Value::Object(serde_json::Map::new()),
            category: "general".to_string(),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Structured failure classes for tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Tool name not in the catalogue.
    NotFound,
    /// Execution exceeded the tool's declared timeout.
    Timeout,
    /// Parameters rejected by the tool's schema.
    InvalidParams,
    /// The tool ran and reported a failure.
    Execution,
    /// The bridge itself was unreachable or misbehaved.
    Transport,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "tool_not_found",
            Self::Timeout => "timeout",
            Self::InvalidParams => "invalid_params",
            Self::Execution => "execution",
            Self::Transport => "transport",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a tool execution.
///
/// A sum type instead of a loose payload: evidence derivation and failure
/// handling switch on the variant and the error kind, never on duck-typing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Ok {
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<HashMap<String, Value>>,
    },
    Err {
        kind: ToolErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<HashMap<String, Value>>,
    },
}

impl ToolResult {
    /// Successful result with a value.
    pub fn ok(value: Value) -> Self {
        Self::Ok { value, meta: None }
    }

    /// Failed result with a kind and message.
    pub fn err(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Err {
            kind,
            message: message.into(),
            meta: None,
        }
    }

    /// Attach metadata to either variant.
    pub fn with_meta(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        match self {
            Self::Ok { value: v, meta } => Self::Ok {
                value: v,
                meta: Some(insert(meta, key, value)),
            },
            Self::Err {
                kind,
                message,
                meta,
            } => Self::Err {
                kind,
                message,
                meta: Some(insert(meta, key, value)),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The success value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Ok { value, .. } => Some(value),
            Self::Err { .. } => None,
        }
    }

    /// The failure kind, if any.
    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { kind, .. } => Some(*kind),
        }
    }
}

fn insert(
    meta: Option<HashMap<String, Value>>,
    key: impl Into<String>,
    value: impl Into<Value>,
) -> HashMap<String, Value> {
    let mut map = meta.unwrap_or_default();
    map.insert(key.into(), value.into());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_accessors() {
        let ok = ToolResult::ok(json!({"answer": 4}));
        assert!(ok.is_ok());
        assert_eq!(ok.value().unwrap()["answer"], 4);
        assert_eq!(ok.error_kind(), None);

        let err = ToolResult::err(ToolErrorKind::NotFound, "tool_not_found");
        assert!(!err.is_ok());
        assert_eq!(err.error_kind(), Some(ToolErrorKind::NotFound));
    }

    #[test]
    fn test_serde_tagging() {
        let err = ToolResult::err(ToolErrorKind::Timeout, "deadline exceeded");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "err");
        assert_eq!(json["kind"], "timeout");

        let back: ToolResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.error_kind(), Some(ToolErrorKind::Timeout));
    }

    #[test]
    fn test_spec_default_timeout() {
        let spec = ToolSpec::new("calculate", "Evaluate arithmetic");
        assert_eq!(spec.timeout_secs, DEFAULT_TOOL_TIMEOUT_SECS);
    }
}
