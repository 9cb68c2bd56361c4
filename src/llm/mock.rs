//! Scripted LLM client for tests and offline runs.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::client::LlmClient;
use super::types::ChatMessage;

/// One scripted reply, or a scripted failure.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text.
    Text(String),
    /// Fail with a transient error.
    Transient(String),
    /// Fail with a permanent error.
    Permanent(String),
}

/// An [`LlmClient`] that replays a fixed script of responses.
///
/// Each `invoke` consumes the next scripted reply; the full prompt history is
/// captured so tests can assert on what the core actually asked. An exhausted
/// script fails permanently, which surfaces runaway loops in tests instead of
/// hanging them.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    script: Arc<Mutex<Vec<ScriptedReply>>>,
    captured: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply.
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push(ScriptedReply::Text(text.into()));
        self
    }

    /// Queue a transient failure.
    pub fn push_transient(&self, message: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push(ScriptedReply::Transient(message.into()));
        self
    }

    /// Queue a permanent failure.
    pub fn push_permanent(&self, message: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push(ScriptedReply::Permanent(message.into()));
        self
    }

    /// Number of invocations so far.
    pub fn call_count(&self) -> usize {
        self.captured.lock().unwrap().len()
    }

    /// Message lists passed to each invocation, in order.
    pub fn captured_prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        self.captured.lock().unwrap().push(messages.to_vec());

        let next = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        };

        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Transient(message)) => Err(Error::llm_transient(message)),
            Some(ScriptedReply::Permanent(message)) => Err(Error::llm_permanent(message)),
            None => Err(Error::llm_permanent("scripted LLM exhausted")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let llm = ScriptedLlm::new();
        llm.push_text("first").push_text("second");

        let messages = [ChatMessage::user("hi")];
        assert_eq!(llm.invoke(&messages).await.unwrap(), "first");
        assert_eq!(llm.invoke(&messages).await.unwrap(), "second");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_permanent() {
        let llm = ScriptedLlm::new();
        let err = llm.invoke(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::LlmPermanent(_)));
    }

    #[tokio::test]
    async fn test_captures_prompts() {
        let llm = ScriptedLlm::new();
        llm.push_text("ok");
        llm.invoke(&[ChatMessage::system("sys"), ChatMessage::user("q")])
            .await
            .unwrap();

        let captured = llm.captured_prompts();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0][1].content, "q");
    }
}
