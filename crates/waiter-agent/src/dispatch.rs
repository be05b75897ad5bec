//! Typed tool calls and their execution against the call's order.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use waiter_menu::CustomerDetails;
use waiter_types::{ToolInvocation, ToolResult};

use crate::agent::Agent;

/// A tool invocation with its arguments checked against the palette.
///
/// `message` is required for every tool, as the palette declares.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ShowMenu {
        message: String,
        #[serde(default)]
        category: Option<String>,
    },
    AddToOrder {
        message: String,
        item_id: String,
        quantity: u32,
        #[serde(default)]
        special_instructions: String,
    },
    ShowOrderSummary {
        message: String,
    },
    SaveOrder {
        message: String,
        customer_name: String,
        #[serde(default)]
        delivery_address: String,
        payment_method: String,
    },
    CancelOrder {
        message: String,
    },
    EndCall {
        message: String,
        #[serde(default)]
        reason: String,
    },
}

impl ToolCall {
    /// # Errors
    ///
    /// Fails for unknown tool names, missing required arguments and
    /// arguments of the wrong type.
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({
            "name": invocation.name,
            "arguments": invocation.arguments,
        }))
    }
}

/// What the turn does after a tool has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Speak `say` (if any), then hand `result` back to the model.
    Continue {
        result: ToolResult,
        say: Option<String>,
    },
    /// Speak `say`, then hang up.
    EndCall { say: String },
}

impl Outcome {
    fn ok(invocation: &ToolInvocation, output: impl Into<String>, say: String) -> Self {
        Self::Continue {
            result: ToolResult::ok(invocation, output),
            say: Some(say),
        }
    }

    /// Domain failures go back to the model only; nothing is spoken.
    pub(crate) fn error(invocation: &ToolInvocation, error: impl std::fmt::Display) -> Self {
        Self::Continue {
            result: ToolResult::error(invocation, format!("Error: {error}")),
            say: None,
        }
    }
}

impl Agent {
    /// Runs one parsed tool invocation.
    pub(crate) async fn execute(&self, invocation: &ToolInvocation) -> Outcome {
        let call = match ToolCall::parse(invocation) {
            Ok(call) => call,
            Err(error) => {
                warn!(call_id = %self.call_id(), tool = %invocation.name, %error, "invalid tool arguments");
                return Outcome::error(
                    invocation,
                    format!("invalid arguments for {}: {error}", invocation.name),
                );
            }
        };

        match call {
            ToolCall::ShowMenu { message, category } => {
                Outcome::ok(invocation, self.menu().render(category.as_deref()), message)
            }

            ToolCall::AddToOrder {
                message,
                item_id,
                quantity,
                special_instructions,
            } => match self.with_order(|order| order.add(&item_id, quantity, &special_instructions)) {
                Ok(line) => {
                    info!(call_id = %self.call_id(), %item_id, quantity, "item added");
                    Outcome::ok(
                        invocation,
                        format!("Added {quantity}x {} to the order.", line.name),
                        message,
                    )
                }
                Err(error) => Outcome::error(invocation, error),
            },

            ToolCall::ShowOrderSummary { message } => {
                let summary = self.with_order(|order| order.summary());
                Outcome::ok(invocation, summary, message)
            }

            ToolCall::SaveOrder {
                message,
                customer_name,
                delivery_address,
                payment_method,
            } => {
                self.with_order(|order| {
                    order.set_customer(CustomerDetails {
                        customer_name,
                        delivery_address,
                        payment_method,
                    })
                });
                match self.persist().await {
                    Ok(()) => Outcome::ok(invocation, "Order saved successfully!", message),
                    Err(error) => {
                        warn!(call_id = %self.call_id(), %error, "saving order failed");
                        Outcome::error(invocation, format!("failed to save order: {error}"))
                    }
                }
            }

            ToolCall::CancelOrder { message } => {
                self.with_order(|order| order.clear());
                info!(call_id = %self.call_id(), "order cancelled");
                Outcome::ok(invocation, "Order cancelled.", message)
            }

            ToolCall::EndCall { message, reason } => {
                info!(call_id = %self.call_id(), %reason, "model ended the call");
                if let Err(error) = self.persist().await {
                    warn!(call_id = %self.call_id(), %error, "persisting order before hang-up failed");
                }
                Outcome::EndCall { say: message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn invocation(name: &str, arguments: Value) -> ToolInvocation {
        ToolInvocation {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn parses_each_tool() {
        assert_eq!(
            ToolCall::parse(&invocation(
                "add_to_order",
                json!({"message": "Sure", "item_id": "pad_thai", "quantity": 2})
            ))
            .unwrap(),
            ToolCall::AddToOrder {
                message: "Sure".to_string(),
                item_id: "pad_thai".to_string(),
                quantity: 2,
                special_instructions: String::new(),
            }
        );
        assert_eq!(
            ToolCall::parse(&invocation("show_menu", json!({"message": "Here"}))).unwrap(),
            ToolCall::ShowMenu {
                message: "Here".to_string(),
                category: None,
            }
        );
        assert!(matches!(
            ToolCall::parse(&invocation("end_call", json!({"message": "Bye", "reason": "done"}))),
            Ok(ToolCall::EndCall { .. })
        ));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(ToolCall::parse(&invocation("add_to_order", json!({"item_id": "wings"}))).is_err());
        assert!(ToolCall::parse(&invocation(
            "add_to_order",
            json!({"item_id": "wings", "quantity": -1})
        ))
        .is_err());
        assert!(ToolCall::parse(&invocation("save_order", json!({"customer_name": "Sam"}))).is_err());
        assert!(ToolCall::parse(&invocation("order_pizza", json!({}))).is_err());
    }

    #[test]
    fn message_is_required_for_every_tool() {
        for (name, arguments) in [
            ("show_menu", json!({})),
            ("add_to_order", json!({"item_id": "wings", "quantity": 1})),
            ("show_order_summary", json!({})),
            (
                "save_order",
                json!({"customer_name": "Sam", "payment_method": "Cash"}),
            ),
            ("cancel_order", json!({})),
            ("end_call", json!({"reason": "done"})),
        ] {
            assert!(
                ToolCall::parse(&invocation(name, arguments)).is_err(),
                "{name} accepted a call without a message"
            );
        }
    }
}
