//! Arithmetic tool.
//!
//! Pure and local — no network, no state.  Division by zero is an expected
//! domain outcome and surfaces as an error payload, never a fault.

use async_trait::async_trait;
use serde_json::{Value, json};

use colloquy_engine::{InvocationContext, Tool, ToolDefinition, ToolError};

use crate::params::{require_f64, require_str};

/// Basic four-function calculator.
#[derive(Debug, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    /// Create the calculator tool.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculator".into(),
            description: "Perform basic arithmetic on two numbers. \
                          Supported operations: add, sub, mul, div."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number", "description": "First operand" },
                    "b": { "type": "number", "description": "Second operand" },
                    "op": {
                        "type": "string",
                        "enum": ["add", "sub", "mul", "div"],
                        "description": "The operation to perform"
                    }
                },
                "required": ["a", "b", "op"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: Value,
        _ctx: &InvocationContext,
    ) -> Result<Value, ToolError> {
        let a = require_f64(&arguments, "a", "calculator")?;
        let b = require_f64(&arguments, "b", "calculator")?;
        let op = require_str(&arguments, "op", "calculator")?;

        let result = match op {
            "add" => a + b,
            "sub" => a - b,
            "mul" => a * b,
            "div" => {
                if b == 0.0 {
                    return Err(ToolError::Failed {
                        tool_name: "calculator".into(),
                        reason: "division by zero".into(),
                    });
                }
                a / b
            }
            other => {
                return Err(ToolError::InvalidParams {
                    tool_name: "calculator".into(),
                    reason: format!("unsupported operation: {other}"),
                });
            }
        };

        Ok(json!({ "a": a, "b": b, "op": op, "result": result }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
