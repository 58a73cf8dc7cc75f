//! Client side of the chat route
//!
//! Posts a conversation, decodes the framed reply as it arrives and reports
//! the growing message after every chunk. Used by the `hopeline-chat`
//! terminal client; any Rust client can reuse it.

use futures::StreamExt;
use std::time::Duration;

use super::frame::{Frame, FrameDecoder};
use super::{ChatMessage, ChatRequest};
use crate::services::markdown::MarkdownRenderer;

/// Shown to the user for any transport failure
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Sorry, I'm having trouble connecting right now. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    /// Connect error, non-2xx status or broken body
    #[error("{}", CONNECTION_ERROR_MESSAGE)]
    Connection(String),

    /// The server ended the stream with an error frame
    #[error("{0}")]
    Server(String),
}

/// Outcome of one exchange. `text` holds whatever arrived before a failure.
#[derive(Debug)]
pub struct ChatReply {
    pub text: String,
    pub error: Option<ConsumeError>,
}

pub struct ChatStreamConsumer {
    client: reqwest::Client,
    endpoint: String,
}

impl ChatStreamConsumer {
    /// `endpoint` is the full URL of the chat route
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Send the conversation and stream the reply.
    ///
    /// `on_update` receives the accumulated reply after every chunk that
    /// added text. No retries.
    pub async fn send<F>(&self, messages: &[ChatMessage], mut on_update: F) -> ChatReply
    where
        F: FnMut(&str),
    {
        let mut text = String::new();

        let response = match self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest {
                messages: messages.to_vec(),
            })
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => return failed(text, format!("status {}", r.status())),
            Err(e) => return failed(text, e.to_string()),
        };

        let mut decoder = FrameDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => return failed(text, e.to_string()),
            };
            if let Some(message) = apply(&mut text, decoder.push(&chunk)) {
                return ChatReply {
                    text,
                    error: Some(ConsumeError::Server(message)),
                };
            }
            on_update(&text);
        }

        let error = apply(&mut text, decoder.finish().into_iter().collect()).map(ConsumeError::Server);
        on_update(&text);
        ChatReply { text, error }
    }
}

fn failed(text: String, detail: String) -> ChatReply {
    tracing::warn!("Chat request failed: {}", detail);
    ChatReply {
        text,
        error: Some(ConsumeError::Connection(detail)),
    }
}

/// Append text frames; stop at the first error frame and return its message
fn apply(text: &mut String, frames: Vec<Frame>) -> Option<String> {
    for frame in frames {
        match frame {
            Frame::Text(t) => text.push_str(&t),
            Frame::Error(message) => return Some(message),
        }
    }
    None
}

/// Re-renders a growing markdown message to HTML
pub struct IncrementalMarkdown {
    renderer: MarkdownRenderer,
    source: String,
    html: String,
}

impl IncrementalMarkdown {
    pub fn new() -> Self {
        Self {
            renderer: MarkdownRenderer::new(),
            source: String::new(),
            html: String::new(),
        }
    }

    /// Replace the source with the accumulated message and re-render
    pub fn update(&mut self, accumulated: &str) -> &str {
        if accumulated != self.source {
            self.source.clear();
            self.source.push_str(accumulated);
            self.html = self.renderer.render(&self.source);
        }
        &self.html
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

impl Default for IncrementalMarkdown {
    fn default() -> Self {
        Self::new()
    }
}
