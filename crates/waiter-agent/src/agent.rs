//! The streaming reconciliation loop.
//!
//! [`Agent::run`] drives one user turn: it streams a model completion,
//! forwards text as it arrives, assembles at most one tool call per model
//! turn, executes it, and opens a new model turn with the result until the
//! model answers in plain text, hangs up, or the tool chain bound is hit.

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};
use waiter_llm::{PromptBuilder, Provider, StreamEvent};
use waiter_menu::{Menu, OrderStore};
use waiter_types::{ResponseEvent, ToolExchange, TurnRequest};

use crate::accumulator::{FinishedCall, ToolCallAccumulator};
use crate::dispatch::Outcome;
use crate::sanitize::sanitize;
use crate::sink::{OrderSink, SinkError};
use crate::watermark::Watermark;

/// Spoken when a turn fails for reasons outside the conversation.
pub const DEFAULT_APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";

/// Per-deployment agent behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Fixed closing line sent with `end_call`.
    pub ending_sentence: String,
    pub apology: String,
    /// Tool executions allowed within one user turn.
    pub max_tool_chain: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            ending_sentence: "Thank you for your order. Have a great day!".to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
            max_tool_chain: 8,
        }
    }
}

/// Collaborators shared by every call handled by the process.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub provider: Arc<dyn Provider>,
    pub prompts: PromptBuilder,
    pub menu: Arc<Menu>,
    pub sink: Arc<dyn OrderSink>,
    pub settings: AgentSettings,
}

/// The agent for one call. Owns that call's order.
#[derive(Debug)]
pub struct Agent {
    call_id: String,
    context: Arc<AgentContext>,
    order: Mutex<OrderStore>,
}

impl Agent {
    pub fn new(call_id: impl Into<String>, context: Arc<AgentContext>) -> Self {
        let order = OrderStore::new(Arc::clone(&context.menu));
        Self {
            call_id: call_id.into(),
            context,
            order: Mutex::new(order),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub(crate) fn menu(&self) -> &Menu {
        &self.context.menu
    }

    /// The greeting sent as response 0 when the call connects.
    pub fn begin_message(&self) -> ResponseEvent {
        let greeting = &self.context.prompts.profile().begin_sentence;
        ResponseEvent::complete(0, sanitize(greeting))
    }

    /// Runs `f` with exclusive access to the order.
    ///
    /// Overlapping turns of the same call interleave at this granularity;
    /// the last writer wins.
    pub fn with_order<R>(&self, f: impl FnOnce(&mut OrderStore) -> R) -> R {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut order)
    }

    /// Hands the current order to the sink.
    pub async fn persist(&self) -> Result<(), SinkError> {
        let snapshot = self.with_order(|order| order.snapshot());
        self.context.sink.persist(&self.call_id, &snapshot).await
    }

    /// Persists a non-empty order when the connection goes away. Failures
    /// are logged.
    pub async fn flush(&self) {
        if self.with_order(|order| order.is_empty()) {
            debug!(call_id = %self.call_id, "no order to flush");
            return;
        }
        match self.persist().await {
            Ok(()) => info!(call_id = %self.call_id, "order flushed on disconnect"),
            Err(error) => warn!(call_id = %self.call_id, %error, "flushing order failed"),
        }
    }

    /// Produces the response events for one turn request.
    ///
    /// The stream always ends with exactly one event that has
    /// `content_complete` set, unless `watermark` moves past the request's
    /// id, in which case it stops at the next checkpoint without a terminal
    /// event.
    pub fn run(
        self: Arc<Self>,
        request: TurnRequest,
        watermark: Watermark,
    ) -> impl Stream<Item = ResponseEvent> + Send + 'static {
        stream! {
            let response_id = request.response_id;
            let settings = &self.context.settings;
            let today = chrono::Local::now().date_naive();

            let mut exchanges: Vec<ToolExchange> = Vec::new();
            let mut last_executed: Option<(String, Value)> = None;

            loop {
                if watermark.is_superseded(response_id) {
                    debug!(call_id = %self.call_id, response_id, "turn superseded before model call");
                    return;
                }

                let prompt = self.context.prompts.build(
                    &request.transcript,
                    request.kind,
                    &exchanges,
                    today,
                );
                let mut events = match self.context.provider.stream(&prompt).await {
                    Ok(events) => events,
                    Err(error) => {
                        error!(call_id = %self.call_id, response_id, %error, "failed to open model stream");
                        if !watermark.is_superseded(response_id) {
                            yield ResponseEvent::complete(response_id, sanitize(&settings.apology));
                        }
                        return;
                    }
                };

                let mut pending = ToolCallAccumulator::default();
                let mut detected: Option<FinishedCall> = None;

                while let Some(event) = events.next().await {
                    if watermark.is_superseded(response_id) {
                        debug!(call_id = %self.call_id, response_id, "turn superseded mid-stream");
                        return;
                    }
                    match event {
                        Ok(StreamEvent::Text(text)) => {
                            let text = sanitize(&text);
                            if !text.is_empty() {
                                yield ResponseEvent::partial(response_id, text);
                            }
                        }
                        Ok(StreamEvent::ToolCallStart { id, name }) => {
                            if let Err(overlap) = pending.start(id, name) {
                                warn!(
                                    call_id = %self.call_id,
                                    response_id,
                                    open = %overlap.open,
                                    rejected = %overlap.rejected,
                                    "second tool call in one model turn, ignoring the rest of the stream"
                                );
                                break;
                            }
                        }
                        Ok(StreamEvent::ToolCallArguments(fragment)) => {
                            pending.push(&fragment);
                        }
                        Ok(StreamEvent::TurnComplete(reason)) => {
                            let Some(call) = pending.finish() else {
                                debug!(call_id = %self.call_id, response_id, ?reason, "model turn complete");
                                break;
                            };
                            if is_repeat(&last_executed, &call) {
                                debug!(call_id = %self.call_id, tool = %call.invocation.name, "skipping repeated tool call");
                                continue;
                            }
                            detected = Some(call);
                            break;
                        }
                        Err(error) => {
                            error!(call_id = %self.call_id, response_id, %error, "model stream failed");
                            yield ResponseEvent::complete(response_id, sanitize(&settings.apology));
                            return;
                        }
                    }
                }

                // A stream that ended or was cut short with a call still open
                // is finalised with what has been accumulated.
                let call = detected.or_else(|| {
                    pending.finish().filter(|call| !is_repeat(&last_executed, call))
                });
                let Some(call) = call else {
                    yield ResponseEvent::complete(response_id, "");
                    return;
                };

                if exchanges.len() >= settings.max_tool_chain {
                    warn!(
                        call_id = %self.call_id,
                        response_id,
                        limit = settings.max_tool_chain,
                        tool = %call.invocation.name,
                        "tool chain limit reached, ending turn"
                    );
                    yield ResponseEvent::complete(response_id, "");
                    return;
                }

                // No new side effects once a newer request has been accepted.
                if watermark.is_superseded(response_id) {
                    debug!(call_id = %self.call_id, response_id, tool = %call.invocation.name, "turn superseded before tool execution");
                    return;
                }

                let FinishedCall { invocation, parse_error } = call;
                let outcome = match parse_error {
                    Some(error) => {
                        warn!(call_id = %self.call_id, tool = %invocation.name, %error, "tool arguments are not valid JSON");
                        Outcome::error(&invocation, format!("could not parse arguments: {error}"))
                    }
                    None => {
                        debug!(call_id = %self.call_id, response_id, tool = %invocation.name, "executing tool");
                        let outcome = self.execute(&invocation).await;
                        last_executed = Some((invocation.name.clone(), invocation.arguments.clone()));
                        outcome
                    }
                };

                if watermark.is_superseded(response_id) {
                    return;
                }

                match outcome {
                    Outcome::Continue { result, say } => {
                        if let Some(say) = say {
                            let say = sanitize(&say);
                            if !say.trim().is_empty() {
                                yield ResponseEvent::partial(response_id, say);
                            }
                        }
                        exchanges.push(ToolExchange { invocation, result });
                    }
                    Outcome::EndCall { say } => {
                        let say = sanitize(&say);
                        if !say.trim().is_empty() {
                            yield ResponseEvent::partial(response_id, say);
                        }
                        yield ResponseEvent::hang_up(response_id, sanitize(&settings.ending_sentence));
                        return;
                    }
                }
            }
        }
    }
}

/// Whether `call` repeats the previously executed invocation exactly.
fn is_repeat(last_executed: &Option<(String, Value)>, call: &FinishedCall) -> bool {
    call.parse_error.is_none()
        && last_executed.as_ref().is_some_and(|(name, arguments)| {
            *name == call.invocation.name && *arguments == call.invocation.arguments
        })
}
