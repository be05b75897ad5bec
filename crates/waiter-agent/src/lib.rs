//! Conversation engine of the Waiter agent.
//!
//! Turns a transcript into a stream of [`ResponseEvent`]s by reconciling the
//! model's streamed text and tool calls with the call's order, and forwards
//! finished orders to an [`OrderSink`].
//!
//! [`ResponseEvent`]: waiter_types::ResponseEvent

pub mod accumulator;
pub mod agent;
pub mod dispatch;
pub mod sanitize;
pub mod sink;
pub mod watermark;

pub use agent::{Agent, AgentContext, AgentSettings, DEFAULT_APOLOGY};
pub use dispatch::{Outcome, ToolCall};
pub use sanitize::sanitize;
pub use sink::{HttpOrderSink, MemoryOrderSink, OrderSink, SinkError};
pub use watermark::Watermark;
