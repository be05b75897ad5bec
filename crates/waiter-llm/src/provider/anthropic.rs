//! Anthropic Messages API over SSE.

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

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<EventStream, LlmError> {
        let body = request_body(&self.settings, prompt);
        let url = format!("{}/v1/messages", self.settings.base_url);
        debug!(model = %self.settings.model, messages = prompt.messages.len(), "opening message stream");

        let mut frames = sse::open(&self.settings.retry, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
        })
        .await?;

        Ok(Box::pin(try_stream! {
            while let Some(frame) = frames.next().await {
                let event: MessageEvent = serde_json::from_str(&frame?.data)?;
                if let Some(event) = map_event(event)? {
                    yield event;
                }
            }
        }))
    }
}

/// Messages must alternate roles and start with the user, so adjacent
/// messages of the same role are folded into one message with several
/// content blocks.
fn request_body(settings: &ProviderSettings, prompt: &Prompt) -> Value {
    let mut messages: Vec<(&'static str, Vec<Value>)> = Vec::new();
    let mut push = |role: &'static str, block: Value| match messages.last_mut() {
        Some((last, blocks)) if *last == role => blocks.push(block),
        _ => messages.push((role, vec![block])),
    };

    if !matches!(prompt.messages.first(), Some(PromptMessage::User(_))) {
        push("user", json!({"type": "text", "text": SILENCE_PLACEHOLDER}));
    }

    for message in &prompt.messages {
        match message {
            PromptMessage::User(content) => push("user", json!({"type": "text", "text": content})),
            PromptMessage::Assistant(content) => {
                push("assistant", json!({"type": "text", "text": content}))
            }
            PromptMessage::ToolCall(invocation) => push(
                "assistant",
                json!({
                    "type": "tool_use",
                    "id": invocation.id,
                    "name": invocation.name,
                    "input": if invocation.arguments.is_object() {
                        invocation.arguments.clone()
                    } else {
                        json!({})
                    },
                }),
            ),
            PromptMessage::ToolResult(result) => push(
                "user",
                json!({
                    "type": "tool_result",
                    "tool_use_id": result.invocation_id,
                    "content": result.output,
                    "is_error": result.is_error,
                }),
            ),
        }
    }

    let messages: Vec<Value> = messages
        .into_iter()
        .map(|(role, content)| json!({"role": role, "content": content}))
        .collect();

    let tools: Vec<Value> = prompt
        .tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.parameters,
            })
        })
        .collect();

    json!({
        "model": settings.model,
        "system": prompt.system,
        "messages": messages,
        "tools": tools,
        "tool_choice": {"type": "auto"},
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens,
        "stream": true,
    })
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageEvent {
    MessageStart,
    ContentBlockStart { content_block: ContentBlock },
    ContentBlockDelta { delta: BlockDelta },
    ContentBlockStop,
    MessageDelta { delta: MessageDelta },
    MessageStop,
    Ping,
    Error { error: ApiError },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

fn map_event(event: MessageEvent) -> Result<Option<StreamEvent>, LlmError> {
    Ok(match event {
        MessageEvent::ContentBlockStart { content_block } => match content_block {
            ContentBlock::Text { text } if !text.is_empty() => Some(StreamEvent::Text(text)),
            ContentBlock::ToolUse { id, name } => Some(StreamEvent::ToolCallStart { id, name }),
            ContentBlock::Text { .. } | ContentBlock::Other => None,
        },
        MessageEvent::ContentBlockDelta { delta } => match delta {
            BlockDelta::TextDelta { text } if !text.is_empty() => Some(StreamEvent::Text(text)),
            BlockDelta::InputJsonDelta { partial_json } if !partial_json.is_empty() => {
                Some(StreamEvent::ToolCallArguments(partial_json))
            }
            _ => None,
        },
        MessageEvent::MessageDelta { delta } => delta
            .stop_reason
            .map(|reason| StreamEvent::TurnComplete(FinishReason::from_provider(&reason))),
        MessageEvent::Error { error } => return Err(LlmError::Provider(error.message)),
        MessageEvent::MessageStart
        | MessageEvent::ContentBlockStop
        | MessageEvent::MessageStop
        | MessageEvent::Ping
        | MessageEvent::Unknown => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::tools;
    use std::sync::Arc;
    use waiter_types::{ToolInvocation, ToolResult};

    fn event(data: &str) -> Option<StreamEvent> {
        map_event(serde_json::from_str(data).unwrap()).unwrap()
    }

    #[test]
    fn maps_message_events() {
        assert_eq!(
            event(r#"{"type":"message_start","message":{"id":"msg_1","role":"assistant"}}"#),
            None
        );
        assert_eq!(
            event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Got it"}}"#),
            Some(StreamEvent::Text("Got it".to_string()))
        );
        assert_eq!(
            event(r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"end_call","input":{}}}"#),
            Some(StreamEvent::ToolCallStart {
                id: "toolu_1".to_string(),
                name: "end_call".to_string()
            })
        );
        assert_eq!(
            event(r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"message\": \"Bye"}}"#),
            Some(StreamEvent::ToolCallArguments("{\"message\": \"Bye".to_string()))
        );
        assert_eq!(
            event(r#"{"type":"message_delta","delta":{"stop_reason":"tool_use","stop_sequence":null},"usage":{"output_tokens":30}}"#),
            Some(StreamEvent::TurnComplete(FinishReason::ToolUse))
        );
        assert_eq!(event(r#"{"type":"ping"}"#), None);
        assert_eq!(event(r#"{"type":"message_stop"}"#), None);
    }

    #[test]
    fn stream_error_event_fails() {
        let error = map_event(
            serde_json::from_str(
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            )
            .unwrap(),
        )
        .unwrap_err();
        assert!(matches!(error, LlmError::Provider(message) if message == "Overloaded"));
    }

    #[test]
    fn request_starts_with_user_and_folds_tool_turns() {
        let invocation = ToolInvocation {
            id: "toolu_1".to_string(),
            name: "add_to_order".to_string(),
            arguments: json!({"item_id": "wings", "quantity": 1, "message": "Done"}),
        };
        let prompt = Prompt {
            system: "system".to_string(),
            messages: vec![
                PromptMessage::Assistant("Welcome!".to_string()),
                PromptMessage::User("wings".to_string()),
                PromptMessage::ToolCall(invocation.clone()),
                PromptMessage::ToolResult(ToolResult::error(&invocation, "Item wings not found in menu")),
            ],
            tools: Arc::new(tools::palette()),
        };
        let settings = ProviderSettings {
            model: "claude-3-haiku-20240307".to_string(),
            base_url: "http://localhost".to_string(),
            api_key: "key".to_string(),
            temperature: 0.0,
            max_tokens: 256,
            retry: RetryPolicy::none(),
        };

        let body = request_body(&settings, &prompt);
        assert_eq!(body["tool_choice"], json!({"type": "auto"}));
        assert_eq!(body["system"], "system");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"][0]["text"], SILENCE_PLACEHOLDER);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[3]["content"][0]["type"], "tool_use");
        assert_eq!(messages[3]["content"][0]["input"]["item_id"], "wings");
        assert_eq!(messages[4]["content"][0]["type"], "tool_result");
        assert_eq!(messages[4]["content"][0]["is_error"], true);
    }
}
