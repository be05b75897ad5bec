//! Prompt construction.
//!
//! [`PromptBuilder::build`] is a pure function of its inputs: the builder
//! only holds immutable configuration, and the current date is passed in by
//! the caller.

use chrono::NaiveDate;
use std::sync::Arc;
use waiter_menu::Menu;
use waiter_types::{InteractionKind, Role, ToolExchange, ToolInvocation, ToolResult, Utterance};

use crate::tools::{self, ToolSpec};

/// Stand-in for a user turn with no recognised speech.
pub const SILENCE_PLACEHOLDER: &str = "...";

/// Appended as a user turn when the caller has been silent for a while.
pub const REMINDER_MARKER: &str =
    "(Now the user has not responded in a while, you would say:)";

/// Deployment-specific persona settings, fixed at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    /// Display name of the language the agent speaks, e.g. `English`.
    pub language: String,
    pub begin_sentence: String,
    /// Free-form house rules appended to the system prompt.
    pub order_instructions: String,
    pub payment_methods: Vec<String>,
}

/// One provider-neutral message of a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptMessage {
    User(String),
    Assistant(String),
    /// A tool call previously requested by the model.
    ToolCall(ToolInvocation),
    /// The output of that tool call.
    ToolResult(ToolResult),
}

/// A complete provider-neutral prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<PromptMessage>,
    pub tools: Arc<Vec<ToolSpec>>,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    profile: Arc<AgentProfile>,
    menu: Arc<Menu>,
    tools: Arc<Vec<ToolSpec>>,
}

impl PromptBuilder {
    pub fn new(profile: Arc<AgentProfile>, menu: Arc<Menu>) -> Self {
        Self {
            profile,
            menu,
            tools: Arc::new(tools::palette()),
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Builds the prompt for one model turn.
    ///
    /// `exchanges` are the tool calls already executed during the current
    /// user turn; they are replayed in order after the transcript.
    pub fn build(
        &self,
        transcript: &[Utterance],
        kind: InteractionKind,
        exchanges: &[ToolExchange],
        today: NaiveDate,
    ) -> Prompt {
        let mut messages = Vec::with_capacity(transcript.len() + exchanges.len() * 2 + 1);

        for utterance in transcript {
            match utterance.role {
                Role::Agent if utterance.is_silent() => {}
                Role::Agent => messages.push(PromptMessage::Assistant(utterance.content.clone())),
                Role::User if utterance.is_silent() => push_user(&mut messages, SILENCE_PLACEHOLDER),
                Role::User => push_user(&mut messages, utterance.content.trim()),
            }
        }

        if kind == InteractionKind::ReminderRequired {
            push_user(&mut messages, REMINDER_MARKER);
        }

        for exchange in exchanges {
            messages.push(PromptMessage::ToolCall(exchange.invocation.clone()));
            messages.push(PromptMessage::ToolResult(exchange.result.clone()));
        }

        Prompt {
            system: self.system_prompt(today),
            messages,
            tools: Arc::clone(&self.tools),
        }
    }

    fn system_prompt(&self, today: NaiveDate) -> String {
        let profile = &self.profile;
        let payment_methods = if profile.payment_methods.is_empty() {
            "any common payment method".to_string()
        } else {
            profile.payment_methods.join(", ")
        };

        let mut prompt = format!(
            "<role>\n\
             You are a friendly restaurant order assistant taking orders over the phone. \
             Help the caller navigate the menu, take the order accurately including any \
             special requests, confirm it, and collect the customer's name, delivery \
             address if needed, and payment method before saving it.\n\
             Today's date is {date}.\n\
             </role>\n\n\
             <style>\n\
             - Speak {language} only.\n\
             - Keep answers short and conversational; this is a live phone call.\n\
             - Never use markdown, lists, or emoji; everything you write is read aloud.\n\
             - Expect transcription errors. Guess what the caller meant when you can, \
             and ask them to repeat colloquially when you cannot.\n\
             </style>\n\n\
             <ordering>\n\
             - Only add items that exist on the menu, using their item ids.\n\
             - Accepted payment methods: {payment_methods}.\n\
             - Confirm the order with the caller before saving it.\n\
             </ordering>\n\n\
             <menu>\n{menu}\n</menu>\n",
            date = today.format("%A, %B %d, %Y"),
            language = profile.language,
            menu = self.menu.to_json(),
        );

        if !profile.order_instructions.trim().is_empty() {
            prompt.push_str("\n<instructions>\n");
            prompt.push_str(profile.order_instructions.trim());
            prompt.push_str("\n</instructions>\n");
        }

        prompt
    }
}

/// Appends a user turn, merging with a directly preceding user turn.
fn push_user(messages: &mut Vec<PromptMessage>, content: &str) {
    match messages.last_mut() {
        Some(PromptMessage::User(previous)) => {
            // Consecutive silences collapse into one placeholder.
            if content == SILENCE_PLACEHOLDER && previous.ends_with(SILENCE_PLACEHOLDER) {
                return;
            }
            if previous == SILENCE_PLACEHOLDER {
                previous.clear();
            } else {
                previous.push(' ');
            }
            previous.push_str(content);
        }
        _ => messages.push(PromptMessage::User(content.to_string())),
    }
}
