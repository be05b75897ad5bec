//! Scripted provider for tests.
//!
//! Each call to [`Provider::stream`] consumes the next [`MockReply`] and
//! records the prompt it was given, so tests can assert both on what the
//! agent emitted and on what it asked the model.

use async_stream::stream;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{EventStream, Provider};
use crate::error::LlmError;
use crate::event::{FinishReason, StreamEvent};
use crate::prompt::Prompt;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Streams the events, then ends.
    Events(Vec<StreamEvent>),
    /// Streams the events, then fails with a stream error.
    Broken(Vec<StreamEvent>, String),
    /// Fails to open the stream.
    Unreachable(String),
}

impl MockReply {
    /// A plain answer streamed in one fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Events(vec![
            StreamEvent::Text(text.into()),
            StreamEvent::TurnComplete(FinishReason::Completed),
        ])
    }

    /// A plain answer streamed fragment by fragment.
    pub fn chunked(fragments: &[&str]) -> Self {
        let mut events: Vec<_> = fragments
            .iter()
            .map(|fragment| StreamEvent::Text((*fragment).to_string()))
            .collect();
        events.push(StreamEvent::TurnComplete(FinishReason::Completed));
        Self::Events(events)
    }

    /// A single tool call whose arguments arrive in one fragment.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::raw_tool_call(id, name, &[&arguments.to_string()])
    }

    /// A single tool call with the argument text split into `fragments`.
    pub fn raw_tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        fragments: &[&str],
    ) -> Self {
        let mut events = vec![StreamEvent::ToolCallStart {
            id: id.into(),
            name: name.into(),
        }];
        events.extend(
            fragments
                .iter()
                .map(|fragment| StreamEvent::ToolCallArguments((*fragment).to_string())),
        );
        events.push(StreamEvent::TurnComplete(FinishReason::ToolUse));
        Self::Events(events)
    }
}

#[derive(Debug, Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<Prompt>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Waits `delay` before every streamed event.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues another reply.
    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<EventStream, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.clone());

        // An exhausted script ends the turn with no text.
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                MockReply::Events(vec![StreamEvent::TurnComplete(FinishReason::Completed)])
            });

        let (events, failure) = match reply {
            MockReply::Events(events) => (events, None),
            MockReply::Broken(events, message) => (events, Some(message)),
            MockReply::Unreachable(message) => return Err(LlmError::Transport(message)),
        };
        let delay = self.delay;

        Ok(Box::pin(stream! {
            for event in events {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(event);
            }
            if let Some(message) = failure {
                yield Err(LlmError::Stream(message));
            }
        }))
    }
}
