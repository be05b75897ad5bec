//! OpenAI Chat Completions over SSE.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{EventStream, Provider, ProviderSettings};
use crate::error::LlmError;
use crate::event::{FinishReason, StreamEvent};
use crate::prompt::{Prompt, PromptMessage};
use crate::sse;

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<EventStream, LlmError> {
        let body = request_body(&self.settings, prompt);
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        debug!(model = %self.settings.model, messages = prompt.messages.len(), "opening completion stream");

        let mut frames = sse::open(&self.settings.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.settings.api_key)
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

fn request_body(settings: &ProviderSettings, prompt: &Prompt) -> Value {
    let mut messages = vec![json!({"role": "system", "content": prompt.system})];
    for message in &prompt.messages {
        messages.push(match message {
            PromptMessage::User(content) => json!({"role": "user", "content": content}),
            PromptMessage::Assistant(content) => json!({"role": "assistant", "content": content}),
            PromptMessage::ToolCall(invocation) => json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": invocation.id,
                    "type": "function",
                    "function": {
                        "name": invocation.name,
                        "arguments": invocation.arguments.to_string(),
                    }
                }]
            }),
            PromptMessage::ToolResult(result) => json!({
                "role": "tool",
                "tool_call_id": result.invocation_id,
                "content": result.output,
            }),
        });
    }

    let tools: Vec<Value> = prompt
        .tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect();

    json!({
        "model": settings.model,
        "messages": messages,
        "tools": tools,
        "tool_choice": "auto",
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens,
        "stream": true,
    })
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

fn map_chunk(chunk: Chunk) -> Result<Vec<StreamEvent>, LlmError> {
    if let Some(error) = chunk.error {
        return Err(LlmError::Provider(error.message));
    }

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                events.push(StreamEvent::Text(content));
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let function = call.function.unwrap_or(FunctionDelta {
                    name: None,
                    arguments: None,
                });
                // Only the first fragment of a call carries its id.
                if let Some(id) = call.id {
                    events.push(StreamEvent::ToolCallStart {
                        id,
                        name: function.name.unwrap_or_default(),
                    });
                }
                if let Some(arguments) = function.arguments.filter(|a| !a.is_empty()) {
                    events.push(StreamEvent::ToolCallArguments(arguments));
                }
            }
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::TurnComplete(FinishReason::from_provider(&reason)));
        }
    }
    Ok(events)
}
