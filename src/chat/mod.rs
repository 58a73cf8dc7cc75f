//! AI chat counselor
//!
//! `POST /api/gemini-chat` forwards the conversation to an LLM provider and
//! re-emits the reply as a framed token stream (see [`frame`]). The
//! provider sits behind [`ChatProvider`] so the route can be exercised
//! without network access.

pub mod client;
pub mod frame;
pub mod gemini;
pub mod lines;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ChatConfig;

pub use client::{ChatStreamConsumer, IncrementalMarkdown, CONNECTION_ERROR_MESSAGE};
pub use frame::{encode_error, encode_text, Frame, FrameDecoder};
pub use gemini::GeminiProvider;

/// Sent in place of provider details when a stream fails midway
const STREAM_ERROR_MESSAGE: &str = "The assistant stopped responding. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of the chat route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Conversation has no messages")]
    EmptyConversation,

    #[error("Chat is not configured")]
    Disabled,

    #[error("Provider error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Stream of reply fragments
pub type FragmentStream = BoxStream<'static, Result<String, ChatError>>;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a reply. Errors returned here happen before any output.
    async fn stream_reply(&self, messages: &[ChatMessage]) -> Result<FragmentStream, ChatError>;
}

pub struct ChatService {
    provider: Option<Arc<dyn ChatProvider>>,
    max_history: usize,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ChatProvider>, max_history: usize) -> Self {
        Self {
            provider: Some(provider),
            max_history: max_history.max(1),
        }
    }

    /// A service that refuses every request
    pub fn disabled() -> Self {
        Self {
            provider: None,
            max_history: 1,
        }
    }

    /// Gemini when an API key is configured, otherwise disabled
    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        if !config.is_enabled() {
            tracing::warn!("Chat API key not set; chat route disabled");
            return Ok(Self::disabled());
        }
        let provider = GeminiProvider::from_config(config)?;
        tracing::info!(model = %config.model, "Chat provider configured");
        Ok(Self::new(Arc::new(provider), config.max_history))
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Start a reply and encode it as frames.
    ///
    /// Blank messages are dropped and only the most recent `max_history`
    /// turns are forwarded. A provider failure after the first fragment
    /// ends the stream with a single error frame.
    pub async fn stream_frames(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<BoxStream<'static, String>, ChatError> {
        let provider = self.provider.as_ref().ok_or(ChatError::Disabled)?;

        let mut messages: Vec<ChatMessage> = messages
            .into_iter()
            .filter(|m| !m.content.trim().is_empty())
            .collect();
        if messages.is_empty() {
            return Err(ChatError::EmptyConversation);
        }
        if messages.len() > self.max_history {
            messages.drain(..messages.len() - self.max_history);
        }

        let fragments = provider.stream_reply(&messages).await?;

        let frames = fragments
            .scan(false, |failed, item| {
                let out = if *failed {
                    None
                } else {
                    match item {
                        Ok(text) => Some(encode_text(&text)),
                        Err(e) => {
                            tracing::error!("Chat stream failed: {}", e);
                            *failed = true;
                            Some(encode_error(STREAM_ERROR_MESSAGE))
                        }
                    }
                };
                futures::future::ready(out)
            })
            .boxed();
        Ok(frames)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    async fn collect(service: &ChatService, messages: Vec<ChatMessage>) -> String {
        service
            .stream_frames(messages)
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    #[tokio::test]
    async fn test_frames_each_fragment() {
        let service = ChatService::new(Arc::new(ScriptedProvider::replying(&["Hello", " there"])), 10);
        let body = collect(&service, vec![ChatMessage::user("hi")]).await;
        assert_eq!(body, "0:\"Hello\"\n0:\" there\"\n");
    }

    #[tokio::test]
    async fn test_midstream_error_ends_with_error_frame() {
        let provider = ScriptedProvider {
            script: vec![
                Ok("partial".to_string()),
                Err("reset".to_string()),
                Ok("never sent".to_string()),
            ],
            ..Default::default()
        };
        let service = ChatService::new(Arc::new(provider), 10);
        let body = collect(&service, vec![ChatMessage::user("hi")]).await;

        assert!(body.starts_with("0:\"partial\"\n3:"));
        assert!(!body.contains("never sent"));
    }

    #[tokio::test]
    async fn test_empty_and_disabled() {
        let service = ChatService::new(Arc::new(ScriptedProvider::default()), 10);
        assert!(matches!(
            service.stream_frames(vec![ChatMessage::user("   ")]).await.err(),
            Some(ChatError::EmptyConversation)
        ));
        assert!(matches!(
            ChatService::disabled().stream_frames(vec![ChatMessage::user("hi")]).await.err(),
            Some(ChatError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_history_truncated_to_most_recent() {
        let provider = Arc::new(ScriptedProvider::replying(&["ok"]));
        let service = ChatService::new(provider.clone(), 2);
        let messages = vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
        ];
        collect(&service, messages).await;

        let received = provider.received.lock().await;
        assert_eq!(received[0], vec![ChatMessage::assistant("two"), ChatMessage::user("three")]);
    }

    #[test]
    fn test_request_deserializes_roles() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#,
        )
        .unwrap();
        assert_eq!(request.messages[1].role, Role::Assistant);
        assert!(serde_json::from_str::<ChatRequest>(r#"{"messages":[{"role":"system","content":"x"}]}"#).is_err());
    }
}
