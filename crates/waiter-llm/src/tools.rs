//! The fixed tool palette offered to the model on every turn.

use serde::Serialize;
use serde_json::{json, Value};

/// Bumped whenever a tool is added or a parameter contract changes.
pub const TOOL_SCHEMA_VERSION: u32 = 2;

pub const SHOW_MENU: &str = "show_menu";
pub const ADD_TO_ORDER: &str = "add_to_order";
pub const SHOW_ORDER_SUMMARY: &str = "show_order_summary";
pub const SAVE_ORDER: &str = "save_order";
pub const CANCEL_ORDER: &str = "cancel_order";
pub const END_CALL: &str = "end_call";

/// One named operation and its JSON-schema parameter contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Builds the tool palette, in the order it is presented to the model.
///
/// Every tool takes a `message`: the sentence the agent says while the tool
/// runs.
pub fn palette() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: SHOW_MENU,
            description: "Show the menu to the customer",
            parameters: object(
                json!({
                    "message": {
                        "type": "string",
                        "description": "Message to introduce the menu"
                    },
                    "category": {
                        "type": "string",
                        "description": "Optional category to show. If not provided, show all categories."
                    }
                }),
                &["message"],
            ),
        },
        ToolSpec {
            name: ADD_TO_ORDER,
            description: "Add an item to the customer's order",
            parameters: object(
                json!({
                    "message": {
                        "type": "string",
                        "description": "Confirmation message to the customer about the item being added"
                    },
                    "item_id": {
                        "type": "string",
                        "description": "The ID of the menu item being ordered"
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "The quantity of the item being ordered"
                    },
                    "special_instructions": {
                        "type": "string",
                        "description": "Any special instructions or modifications for the item"
                    }
                }),
                &["message", "item_id", "quantity"],
            ),
        },
        ToolSpec {
            name: SHOW_ORDER_SUMMARY,
            description: "Show the current order summary to the customer",
            parameters: object(
                json!({
                    "message": {
                        "type": "string",
                        "description": "Message to introduce the order summary"
                    }
                }),
                &["message"],
            ),
        },
        ToolSpec {
            name: SAVE_ORDER,
            description: "Save the completed order once the customer has confirmed it",
            parameters: object(
                json!({
                    "message": {
                        "type": "string",
                        "description": "Confirmation message about the order being saved"
                    },
                    "customer_name": {
                        "type": "string",
                        "description": "Customer's name for the order"
                    },
                    "delivery_address": {
                        "type": "string",
                        "description": "Delivery address if applicable"
                    },
                    "payment_method": {
                        "type": "string",
                        "description": "Payment method for the order"
                    }
                }),
                &["message", "customer_name", "payment_method"],
            ),
        },
        ToolSpec {
            name: CANCEL_ORDER,
            description: "Remove every item from the current order",
            parameters: object(
                json!({
                    "message": {
                        "type": "string",
                        "description": "Message confirming the order was cancelled"
                    }
                }),
                &["message"],
            ),
        },
        ToolSpec {
            name: END_CALL,
            description: "End the call only when the user explicitly requests it or when the order is complete",
            parameters: object(
                json!({
                    "message": {
                        "type": "string",
                        "description": "The message you will say before ending the call with the customer"
                    },
                    "reason": {
                        "type": "string",
                        "description": "An internal note explaining why the call is being ended at this point"
                    }
                }),
                &["message"],
            ),
        },
    ]
}
