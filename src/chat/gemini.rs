//! Gemini `streamGenerateContent` provider
//!
//! Requests use `alt=sse`; every `data:` line carries a JSON chunk whose
//! text lives at `candidates[0].content.parts[*].text`.

use anyhow::Context;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;

use super::{ChatError, ChatMessage, ChatProvider, FragmentStream, Role};
use super::lines::LineBuffer;
use crate::config::ChatConfig;

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    system_prompt: String,
}

impl GeminiProvider {
    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("Chat API key is not configured")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

/// Provider request body; assistant turns are `model` on the wire
pub fn build_request(system_prompt: &str, messages: &[ChatMessage]) -> Value {
    let contents: Vec<Value> = messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if !system_prompt.trim().is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system_prompt }] });
    }
    body
}

/// Text carried by one SSE payload.
///
/// `Ok(None)` for chunks without text (safety ratings, usage metadata) and
/// for payloads that are not JSON.
pub fn extract_text(payload: &str) -> Result<Option<String>, ChatError> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            tracing::debug!("Skipping non-JSON SSE payload");
            return Ok(None);
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error");
        return Err(ChatError::Upstream(message.to_string()));
    }

    let text: String = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

/// Splits an SSE body into `data:` payloads
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    lines: LineBuffer,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.lines
            .push(chunk)
            .iter()
            .filter_map(|line| data_payload(line))
            .collect()
    }

    pub fn finish(&mut self) -> Option<String> {
        self.lines.finish().and_then(|line| data_payload(&line))
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    (!data.is_empty() && data != "[DONE]").then(|| data.to_string())
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: SseLineBuffer,
    pending: VecDeque<Result<String, ChatError>>,
    done: bool,
}

impl SseState {
    fn queue(&mut self, payload: &str) {
        match extract_text(payload) {
            Ok(Some(text)) => self.pending.push_back(Ok(text)),
            Ok(None) => {}
            Err(e) => {
                self.pending.push_back(Err(e));
                self.done = true;
            }
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn stream_reply(&self, messages: &[ChatMessage]) -> Result<FragmentStream, ChatError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(&self.system_prompt, messages))
            .send()
            .await
            .map_err(|e| ChatError::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = extract_text(&body)
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::warn!(%status, "Chat provider rejected request: {}", detail);
            return Err(ChatError::Upstream(format!("provider returned {}", status)));
        }

        let state = SseState {
            body: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            lines: SseLineBuffer::default(),
            pending: VecDeque::new(),
            done: false,
        };

        let fragments = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        for payload in state.lines.push(&chunk) {
                            state.queue(&payload);
                            if state.done {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        state
                            .pending
                            .push_back(Err(ChatError::Upstream(format!("stream interrupted: {}", e))));
                    }
                    None => {
                        state.done = true;
                        if let Some(payload) = state.lines.finish() {
                            state.queue(&payload);
                        }
                    }
                }
            }
        });

        Ok(fragments.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::lines::MAX_LINE_BYTES;

    #[test]
    fn test_build_request_maps_roles() {
        let body = build_request(
            "Be kind",
            &[ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "hello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be kind");

        assert!(build_request("", &[ChatMessage::user("hi")]).get("systemInstruction").is_none());
    }

    #[test]
    fn test_extract_text() {
        let chunk = r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"}}]}"#;
        assert_eq!(extract_text(chunk).unwrap().as_deref(), Some("Hello"));

        let metadata = r#"{"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(extract_text(metadata).unwrap(), None);
        assert_eq!(extract_text("not json").unwrap(), None);

        let error = r#"{"error":{"code":429,"message":"quota exceeded"}}"#;
        assert!(matches!(extract_text(error), Err(ChatError::Upstream(m)) if m == "quota exceeded"));
    }

    #[test]
    fn test_sse_lines_across_chunks() {
        let mut lines = SseLineBuffer::default();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\r\n\r\n: comment\nevent: x\n"), vec!["{\"a\":1}".to_string()]);
        assert!(lines.push(b"data: [DONE]\n").is_empty());
        assert!(lines.push(b"data: tail").is_empty());
        assert_eq!(lines.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn test_sse_recovers_after_overlong_line() {
        let mut lines = SseLineBuffer::default();
        let chunk = vec![b'a'; 64 * 1024];
        for _ in 0..(2 * MAX_LINE_BYTES / chunk.len()) {
            assert!(lines.push(&chunk).is_empty());
        }
        assert_eq!(lines.push(b"\ndata: ok\n"), vec!["ok".to_string()]);
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(GeminiProvider::from_config(&ChatConfig::default()).is_err());

        let config = ChatConfig {
            api_key: Some("k".to_string()),
            base_url: "http://localhost:9/".to_string(),
            ..Default::default()
        };
        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(
            provider.endpoint(),
            format!("http://localhost:9/v1beta/models/{}:streamGenerateContent?alt=sse", config.model)
        );
    }
}
