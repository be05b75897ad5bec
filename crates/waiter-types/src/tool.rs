//! Tool invocation records produced during a model turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call requested by the model, with its arguments parsed.
///
/// `arguments` is `Value::Null` when the streamed argument text could not be
/// parsed; the paired [`ToolResult`] then carries the parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The outcome of executing a [`ToolInvocation`], fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(invocation: &ToolInvocation, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            name: invocation.name.clone(),
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(invocation: &ToolInvocation, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            name: invocation.name.clone(),
            output: output.into(),
            is_error: true,
        }
    }
}

/// A tool invocation paired with its result, replayed in the next prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExchange {
    pub invocation: ToolInvocation,
    pub result: ToolResult,
}
