//! Provider-neutral stream events.

/// Why the model ended its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of the answer.
    Completed,
    /// The model stopped to have a tool executed.
    ToolUse,
    /// The output token limit was reached.
    MaxTokens,
    /// Any other provider-specific reason.
    Other(String),
}

impl FinishReason {
    /// Maps the finish/stop reason strings used by the supported providers.
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "STOP" | "stop_sequence" => Self::Completed,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolUse,
            "length" | "max_tokens" | "MAX_TOKENS" => Self::MaxTokens,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One event of a streamed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of text to be spoken.
    Text(String),

    /// The model opened a tool call.
    ToolCallStart { id: String, name: String },

    /// A fragment of the open tool call's JSON arguments. Fragments are not
    /// valid JSON on their own.
    ToolCallArguments(String),

    /// The model finished its turn.
    TurnComplete(FinishReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_provider_finish_reasons() {
        assert_eq!(FinishReason::from_provider("stop"), FinishReason::Completed);
        assert_eq!(FinishReason::from_provider("end_turn"), FinishReason::Completed);
        assert_eq!(FinishReason::from_provider("STOP"), FinishReason::Completed);
        assert_eq!(FinishReason::from_provider("tool_calls"), FinishReason::ToolUse);
        assert_eq!(FinishReason::from_provider("tool_use"), FinishReason::ToolUse);
        assert_eq!(FinishReason::from_provider("MAX_TOKENS"), FinishReason::MaxTokens);
        assert_eq!(
            FinishReason::from_provider("SAFETY"),
            FinishReason::Other("SAFETY".to_string())
        );
    }
}
