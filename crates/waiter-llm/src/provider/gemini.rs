//! Gemini `streamGenerateContent` over SSE.
//!
//! Gemini delivers each function call whole, without the start/fragment
//! split of the other providers, and usually without an id. Calls are
//! translated into a start event with a generated id followed by a single
//! argument fragment.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{EventStream, Provider, ProviderSettings};
use crate::error::LlmError;
use crate::event::{FinishReason, StreamEvent};
use crate::prompt::{Prompt, PromptMessage, SILENCE_PLACEHOLDER};
use crate::sse;

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<EventStream, LlmError> {
        let body = request_body(&self.settings, prompt);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.settings.base_url, self.settings.model
        );
        debug!(model = %self.settings.model, messages = prompt.messages.len(), "opening content stream");

        let mut frames = sse::open(&self.settings.retry, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.settings.api_key)
                .json(&body)
        })
        .await?;

        Ok(Box::pin(try_stream! {
            while let Some(frame) = frames.next().await {
                let chunk: Chunk = serde_json::from_str(&frame?.data)?;
                for event in map_chunk(chunk)? {
                    yield event;
                }
            }
        }))
    }
}

/// Contents must open with a user turn; adjacent parts of the same role are
/// folded into one turn.
fn request_body(settings: &ProviderSettings, prompt: &Prompt) -> Value {
    let mut contents: Vec<(&'static str, Vec<Value>)> = Vec::new();
    let mut push = |role: &'static str, part: Value| match contents.last_mut() {
        Some((last, parts)) if *last == role => parts.push(part),
        _ => contents.push((role, vec![part])),
    };

    if !matches!(prompt.messages.first(), Some(PromptMessage::User(_))) {
        push("user", json!({"text": SILENCE_PLACEHOLDER}));
    }

    for message in &prompt.messages {
        match message {
            PromptMessage::User(text) => push("user", json!({"text": text})),
            PromptMessage::Assistant(text) => push("model", json!({"text": text})),
            PromptMessage::ToolCall(invocation) => push(
                "model",
                json!({
                    "functionCall": {
                        "name": invocation.name,
                        "args": if invocation.arguments.is_object() {
                            invocation.arguments.clone()
                        } else {
                            json!({})
                        },
                    }
                }),
            ),
            PromptMessage::ToolResult(result) => push(
                "user",
                json!({
                    "functionResponse": {
                        "name": result.name,
                        "response": {"output": result.output, "is_error": result.is_error},
                    }
                }),
            ),
        }
    }

    let contents: Vec<Value> = contents
        .into_iter()
        .map(|(role, parts)| json!({"role": role, "parts": parts}))
        .collect();

    let declarations: Vec<Value> = prompt
        .tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            })
        })
        .collect();

    json!({
        "systemInstruction": {"parts": [{"text": prompt.system}]},
        "contents": contents,
        "tools": [{"functionDeclarations": declarations}],
        "toolConfig": {"functionCallingConfig": {"mode": "AUTO"}},
        "generationConfig": {
            "temperature": settings.temperature,
            "maxOutputTokens": settings.max_tokens,
        },
    })
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

fn map_chunk(chunk: Chunk) -> Result<Vec<StreamEvent>, LlmError> {
    if let Some(error) = chunk.error {
        return Err(LlmError::Provider(error.message));
    }

    let mut events = Vec::new();
    // Only the first candidate is ever requested.
    if let Some(candidate) = chunk.candidates.into_iter().next() {
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::Text(text));
            }
            if let Some(call) = part.function_call {
                let id = call
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                events.push(StreamEvent::ToolCallStart {
                    id,
                    name: call.name,
                });
                let arguments = if call.args.is_null() {
                    json!({})
                } else {
                    call.args
                };
                events.push(StreamEvent::ToolCallArguments(arguments.to_string()));
            }
        }
        if let Some(reason) = candidate.finish_reason {
            events.push(StreamEvent::TurnComplete(FinishReason::from_provider(&reason)));
        }
    }
    Ok(events)
}
