//! Arithmetic tools for the math agent.

use super::{Tool, ToolInput, ToolOutput};
use crate::error::ToolError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Binary arithmetic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    /// Every operation, in registration order
    pub const ALL: [ArithmeticOp; 4] = [
        ArithmeticOp::Add,
        ArithmeticOp::Subtract,
        ArithmeticOp::Multiply,
        ArithmeticOp::Divide,
    ];

    /// Tool name
    pub fn name(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Subtract => "subtract",
            ArithmeticOp::Multiply => "multiply",
            ArithmeticOp::Divide => "divide",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "Add two numbers and return their sum.",
            ArithmeticOp::Subtract => "Subtract b from a and return the result.",
            ArithmeticOp::Multiply => "Multiply two numbers and return the product.",
            ArithmeticOp::Divide => "Divide a by b and return the quotient. Fails if b is zero.",
        }
    }

    /// Apply the operation
    pub fn apply(&self, a: f64, b: f64) -> Result<f64, ToolError> {
        match self {
            ArithmeticOp::Add => Ok(a + b),
            ArithmeticOp::Subtract => Ok(a - b),
            ArithmeticOp::Multiply => Ok(a * b),
            ArithmeticOp::Divide if b == 0.0 => {
                Err(ToolError::Execution("division by zero".to_string()))
            }
            ArithmeticOp::Divide => Ok(a / b),
        }
    }
}

/// Tool wrapping one [`ArithmeticOp`]; takes `{"a": number, "b": number}`
#[derive(Debug, Clone)]
pub struct ArithmeticTool {
    op: ArithmeticOp,
}

impl ArithmeticTool {
    pub fn new(op: ArithmeticOp) -> Self {
        Self { op }
    }
}

fn operand(input: &Value, key: &str) -> Result<f64, ToolError> {
    input
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::InvalidInput(format!("'{}' must be a number", key)))
}

// Integral results are reported without a trailing ".0"
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[async_trait]
impl Tool for ArithmeticTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn input_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["a", "b"]
        }))
    }

    async fn invoke(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let a = operand(&input, "a")?;
        let b = operand(&input, "b")?;
        self.op.apply(a, b).map(number)
    }
}
