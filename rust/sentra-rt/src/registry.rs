//! The tool registry (§4.6): a host-populated mapping from op string to a
//! handler. Each provider crate registers its ops under a named prefix
//! into one shared dispatch table rather than hardwiring a backend into
//! the interpreter.

use sentra_core::Value;
use serde_json::Value as Json;
use std::collections::HashMap;
use thiserror::Error;

/// A `HostError` in the taxonomy of §7: raised by a tool, not by the
/// compiler or interpreter itself.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A host-provided function bound to an op name (§3 Glossary "Tool").
pub type ToolFn = Box<dyn Fn(Json) -> Result<Value, ToolError> + Send + Sync>;

struct ToolEntry {
    effects: Vec<String>,
    handler: ToolFn,
}

/// Operation name → handler, populated by the host before a `run` (§4.6).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `op`. `effects` documents what the tool
    /// touches (`"fs"`, `"network"`, …) for hosts that want to audit
    /// permissions before a run; the interpreter itself does not consult it.
    pub fn register(&mut self, op: impl Into<String>, effects: &[&str], handler: ToolFn) {
        let effects = effects.iter().map(|s| s.to_string()).collect();
        self.tools.insert(op.into(), ToolEntry { effects, handler });
    }

    pub fn contains(&self, op: &str) -> bool {
        self.tools.contains_key(op)
    }

    pub fn effects_of(&self, op: &str) -> Option<&[String]> {
        self.tools.get(op).map(|entry| entry.effects.as_slice())
    }

    pub fn call(&self, op: &str, args: Json) -> Result<Value, ToolError> {
        match self.tools.get(op) {
            Some(entry) => (entry.handler)(args),
            None => Err(ToolError::new(format!("unknown operation '{op}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unregistered_op_is_a_tool_error() {
        let registry = ToolRegistry::new();
        let err = registry.call("excel.open_workbook", json!({})).unwrap_err();
        assert!(err.message.contains("unknown operation"));
    }

    #[test]
    fn registered_op_dispatches_to_its_handler() {
        let mut registry = ToolRegistry::new();
        registry.register("set_var", &[], Box::new(|args| Ok(Value::from(args))));
        let result = registry.call("set_var", json!({"value": 5})).unwrap();
        assert_eq!(result, Value::from(json!({"value": 5})));
    }
}
