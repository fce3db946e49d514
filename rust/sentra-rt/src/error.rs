//! Runtime error taxonomy (§4.5, §8 "Error Handling").

use crate::registry::ToolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined name '{0}'")]
    UndefinedName(String),
    #[error("field '{field}' not found on '{base}'")]
    UndefinedField { base: String, field: String },
    #[error("type error: {0}")]
    TypeError(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("step '{step_id}' ({op}) failed: {source}")]
    Step { step_id: String, op: String, #[source] source: Box<RuntimeError> },
    #[error("step '{step_id}' escalated: {message}")]
    Escalated { step_id: String, message: String },
    #[error("unknown operation '{0}'")]
    UnknownOp(String),
}
