//! Server-sent event transport shared by the HTTP providers.

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use reqwest_eventsource::{retry, Event, EventSource};
use std::pin::Pin;
use tracing::trace;

use crate::error::LlmError;
use crate::retry::{with_retry, RetryPolicy};

/// One `data:` payload and its optional `event:` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, LlmError>> + Send>>;

/// Opens an SSE stream, retrying the connection under `policy`.
///
/// The stream is considered open once the server has answered with a success
/// status. Failures after that point are yielded as stream errors and are
/// never retried. The stream ends on a `[DONE]` sentinel or when the server
/// closes the connection.
pub async fn open<F>(policy: &RetryPolicy, request: F) -> Result<FrameStream, LlmError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut source = with_retry(policy, || connect(request())).await?;

    Ok(Box::pin(try_stream! {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if message.data == "[DONE]" {
                        break;
                    }
                    trace!(event = %message.event, "provider frame");
                    yield SseFrame {
                        event: message.event,
                        data: message.data,
                    };
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(error) => Err(map_error(error).await)?,
            }
        }
        source.close();
    }))
}

async fn connect(request: reqwest::RequestBuilder) -> Result<EventSource, LlmError> {
    let mut source = EventSource::new(request)
        .map_err(|error| LlmError::Config(format!("request cannot be streamed: {error}")))?;
    source.set_retry_policy(Box::new(retry::Never));

    match source.next().await {
        Some(Ok(Event::Open)) => Ok(source),
        Some(Ok(Event::Message(_))) => Err(LlmError::Stream(
            "received data before the stream was opened".to_string(),
        )),
        Some(Err(error)) => {
            source.close();
            Err(map_error(error).await)
        }
        None => Err(LlmError::Transport(
            "connection closed before the stream was opened".to_string(),
        )),
    }
}

async fn map_error(error: reqwest_eventsource::Error) -> LlmError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => LlmError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        },
        reqwest_eventsource::Error::Transport(error) => LlmError::Transport(error.to_string()),
        other => LlmError::Stream(other.to_string()),
    }
}
