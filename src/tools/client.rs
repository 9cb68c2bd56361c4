//! Tool client trait, the HTTP bridge implementation, and a scripted double.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::{ToolErrorKind, ToolResult, ToolSpec, DEFAULT_TOOL_TIMEOUT_SECS};

/// Tool execution surface used by the orchestrator.
///
/// `execute` reports expected tool failures in-band as [`ToolResult::Err`];
/// an `Err(Error)` from this trait means the adapter itself is broken.
/// Retries are the orchestrator's concern, never the adapter's.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// List the available tools with their JSON schemas.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>>;

    /// Execute a tool by name.
    async fn execute(&self, name: &str, params: Value) -> Result<ToolResult>;

    /// Whether the bridge reports itself healthy.
    async fn health(&self) -> Result<bool>;
}

// Bridge wire types
#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    tool_name: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Tool client over the HTTP bridge (`GET /tools`, `POST /execute`,
/// `GET /health`).
pub struct HttpToolClient {
    base_url: String,
    http: Client,
    /// Declared timeouts, filled lazily from `list_tools`.
    timeouts: Mutex<HashMap<String, u64>>,
}

impl HttpToolClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS * 2))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            timeouts: Mutex::new(HashMap::new()),
        }
    }

    fn timeout_for(&self, name: &str) -> Duration {
        let secs = self
            .timeouts
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    async fn post_execute(&self, name: &str, params: Value) -> ToolResult {
        let url = format!("{}/execute", self.base_url);
        let request = ExecuteRequest {
            tool_name: name,
            params,
        };

        let response = match self.http.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = name, error = %e, "tool bridge unreachable");
                return ToolResult::err(ToolErrorKind::Transport, e.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ToolResult::err(ToolErrorKind::Transport, e.to_string()),
        };

        if !status.is_success() {
            return ToolResult::err(
                ToolErrorKind::Transport,
                format!("bridge returned {}: {}", status, body),
            );
        }

        match serde_json::from_str::<ExecuteResponse>(&body) {
            Ok(parsed) if parsed.success => ToolResult::ok(parsed.result),
            Ok(parsed) => {
                let message = parsed.error.unwrap_or_else(|| "tool failed".to_string());
                let kind = match message.as_str() {
                    "tool_not_found" => ToolErrorKind::NotFound,
                    "timeout" => ToolErrorKind::Timeout,
                    "invalid_params" => ToolErrorKind::InvalidParams,
                    _ => ToolErrorKind::Execution,
                };
                ToolResult::err(kind, message)
            }
            Err(e) => ToolResult::err(
                ToolErrorKind::Transport,
                format!("unparseable bridge response: {}", e),
            ),
        }
    }
}

#[async_trait]
impl ToolClient for HttpToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let url = format!("{}/tools", self.base_url);
        let tools: Vec<ToolSpec> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::tool(format!("GET /tools failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::tool(format!("unparseable /tools response: {}", e)))?;

        let mut timeouts = self.timeouts.lock().unwrap();
        for tool in &tools {
            timeouts.insert(tool.name.clone(), tool.timeout_secs);
        }

        Ok(tools)
    }

    async fn execute(&self, name: &str, params: Value) -> Result<ToolResult> {
        debug!(tool = name, "executing tool");
        let deadline = self.timeout_for(name);

        match timeout(deadline, self.post_execute(name, params)).await {
            Ok(result) => Ok(result),
            Err(_) => Ok(ToolResult::err(
                ToolErrorKind::Timeout,
                format!("timed out after {}s", deadline.as_secs()),
            )),
        }
    }

    async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response: HealthResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::tool(format!("GET /health failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::tool(format!("unparseable /health response: {}", e)))?;

        Ok(response.status == "ok" || response.status == "healthy")
    }
}

type Handler = Box<dyn Fn(&Value) -> ToolResult + Send + Sync>;

/// In-memory tool client with programmable handlers, for tests and
/// offline runs.
#[derive(Default)]
pub struct StaticToolClient {
    tools: Vec<ToolSpec>,
    handlers: HashMap<String, Handler>,
    executed: Mutex<Vec<(String, Value)>>,
}

impl StaticToolClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with a handler computing its result.
    pub fn with_tool<F>(mut self, spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(&Value) -> ToolResult + Send + Sync + 'static,
    {
        self.handlers.insert(spec.name.clone(), Box::new(handler));
        self.tools.push(spec);
        self
    }

    /// Register a tool that always returns the same value.
    pub fn with_fixed_tool(self, spec: ToolSpec, value: Value) -> Self {
        self.with_tool(spec, move |_| ToolResult::ok(value.clone()))
    }

    /// Register a tool that always fails the same way.
    pub fn with_failing_tool(
        self,
        spec: ToolSpec,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        self.with_tool(spec, move |_| ToolResult::err(kind, message.clone()))
    }

    /// Executions recorded so far as `(tool, params)` pairs.
    pub fn executions(&self) -> Vec<(String, Value)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolClient for StaticToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        Ok(self.tools.clone())
    }

    async fn execute(&self, name: &str, params: Value) -> Result<ToolResult> {
        self.executed
            .lock()
            .unwrap()
            .push((name.to_string(), params.clone()));

        match self.handlers.get(name) {
            Some(handler) => Ok(handler(&params)),
            None => Ok(ToolResult::err(ToolErrorKind::NotFound, "tool_not_found")),
        }
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_client_dispatch() {
        let client = StaticToolClient::new().with_fixed_tool(
            ToolSpec::new("calculate", "Evaluate arithmetic").with_category("calculation"),
            json!("4"),
        );

        let result = client
            .execute("calculate", json!({"expression": "2+2"}))
            .await
            .unwrap();
        assert_eq!(result.value(), Some(&json!("4")));

        let executions = client.executions();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].0, "calculate");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_in_band_error() {
        let client = StaticToolClient::new();
        let result = client.execute("missing", json!({})).await.unwrap();
        assert_eq!(result.error_kind(), Some(ToolErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_failing_tool_reports_kind() {
        let client = StaticToolClient::new().with_failing_tool(
            ToolSpec::new("flaky", "Always fails"),
            ToolErrorKind::Execution,
            "disk full",
        );

        let result = client.execute("flaky", json!({})).await.unwrap();
        assert_eq!(result.error_kind(), Some(ToolErrorKind::Execution));
        assert!(!result.is_ok());
    }
}
