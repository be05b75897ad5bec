//! Shared types for the Waiter voice ordering agent.
//!
//! This crate holds the conversation model every other crate speaks:
//! transcript utterances, the websocket wire events exchanged with the voice
//! platform, and the transient tool invocation/result records produced while
//! a model turn is reconciled.
//!
//! It deliberately depends on nothing but `serde`, so that the menu, LLM,
//! agent and server crates can share these definitions without cycles.

pub mod tool;
pub mod wire;

pub use tool::{ToolExchange, ToolInvocation, ToolResult};
pub use wire::{CallConfig, InboundEvent, OutboundEvent, ResponseEvent};

use serde::{Deserialize, Serialize};

/// Who spoke an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The voice agent (our side of the call).
    Agent,
    /// The caller.
    User,
}

/// A single transcribed utterance in the call history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl Utterance {
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Returns `true` if the utterance carries no speech (ASR produced an
    /// empty or whitespace-only segment).
    pub fn is_silent(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Why a model turn was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// The caller finished speaking and expects an answer.
    ResponseRequired,
    /// The caller has been silent; the agent should speak proactively.
    ReminderRequired,
}

/// One request for an agent response, as accepted by the connection handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    /// Monotonically increasing id assigned by the voice platform.
    pub response_id: i64,
    pub kind: InteractionKind,
    pub transcript: Vec<Utterance>,
}
