//! Assembles one streamed tool call from its fragments.

use serde_json::Value;
use waiter_types::ToolInvocation;

/// A tool call whose argument text has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedCall {
    /// `arguments` is `Value::Null` when parsing failed.
    pub invocation: ToolInvocation,
    pub parse_error: Option<String>,
}

/// Returned by [`ToolCallAccumulator::start`] when a call is already open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlappingCall {
    pub open: String,
    pub rejected: String,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Accumulating {
        id: String,
        name: String,
        arguments: String,
    },
}

/// Holds at most one open tool call per model turn.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    state: State,
}

impl ToolCallAccumulator {
    /// Opens a call. Fails if another call is still open.
    pub fn start(&mut self, id: String, name: String) -> Result<(), OverlappingCall> {
        match &self.state {
            State::Idle => {
                self.state = State::Accumulating {
                    id,
                    name,
                    arguments: String::new(),
                };
                Ok(())
            }
            State::Accumulating { id: open, .. } => Err(OverlappingCall {
                open: open.clone(),
                rejected: id,
            }),
        }
    }

    /// Appends an argument fragment. Returns `false` and drops the fragment
    /// if no call is open.
    pub fn push(&mut self, fragment: &str) -> bool {
        match &mut self.state {
            State::Accumulating { arguments, .. } => {
                arguments.push_str(fragment);
                true
            }
            State::Idle => false,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Accumulating { .. })
    }

    /// Closes the open call and parses its arguments.
    ///
    /// An empty argument buffer parses as `{}`.
    pub fn finish(&mut self) -> Option<FinishedCall> {
        let State::Accumulating {
            id,
            name,
            arguments,
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };

        let text = arguments.trim();
        let parsed = if text.is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(text)
        };

        Some(match parsed {
            Ok(arguments) => FinishedCall {
                invocation: ToolInvocation {
                    id,
                    name,
                    arguments,
                },
                parse_error: None,
            },
            Err(error) => FinishedCall {
                invocation: ToolInvocation {
                    id,
                    name,
                    arguments: Value::Null,
                },
                parse_error: Some(error.to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assembles_fragments() {
        let mut accumulator = ToolCallAccumulator::default();
        accumulator
            .start("call_1".to_string(), "add_to_order".to_string())
            .unwrap();
        for fragment in [r#"{"item_id": "pad"#, r#"_thai", "quan"#, r#"tity": 2}"#] {
            assert!(accumulator.push(fragment));
        }

        let call = accumulator.finish().unwrap();
        assert_eq!(call.parse_error, None);
        assert_eq!(call.invocation.arguments, json!({"item_id": "pad_thai", "quantity": 2}));
        assert!(!accumulator.is_open());
        assert!(accumulator.finish().is_none());
    }

    #[test]
    fn second_start_is_rejected() {
        let mut accumulator = ToolCallAccumulator::default();
        accumulator.start("a".to_string(), "show_menu".to_string()).unwrap();

        let error = accumulator
            .start("b".to_string(), "end_call".to_string())
            .unwrap_err();
        assert_eq!(error.open, "a");
        assert_eq!(error.rejected, "b");

        let call = accumulator.finish().unwrap();
        assert_eq!(call.invocation.name, "show_menu");
    }

    #[test]
    fn malformed_arguments_are_reported() {
        let mut accumulator = ToolCallAccumulator::default();
        accumulator.start("a".to_string(), "save_order".to_string()).unwrap();
        accumulator.push(r#"{"customer_name": "Sa"#);

        let call = accumulator.finish().unwrap();
        assert!(call.parse_error.is_some());
        assert_eq!(call.invocation.arguments, Value::Null);
    }

    #[test]
    fn fragments_without_a_call_are_dropped() {
        let mut accumulator = ToolCallAccumulator::default();
        assert!(!accumulator.push("{}"));

        accumulator.start("a".to_string(), "cancel_order".to_string()).unwrap();
        let call = accumulator.finish().unwrap();
        assert_eq!(call.invocation.arguments, json!({}));
    }
}
