//! Model-facing half of the Waiter agent.
//!
//! Builds provider-neutral prompts from the call transcript, describes the
//! tool palette, and streams completions from OpenAI, Anthropic or Gemini as
//! a uniform sequence of [`StreamEvent`]s.

pub mod error;
pub mod event;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod sse;
pub mod tools;

pub use error::LlmError;
pub use event::{FinishReason, StreamEvent};
pub use prompt::{AgentProfile, Prompt, PromptBuilder, PromptMessage};
pub use provider::{EventStream, LlmConfig, Provider, ProviderKind};
pub use retry::RetryPolicy;
pub use tools::{ToolSpec, TOOL_SCHEMA_VERSION};
