//! Stub web-automation adapter (§4.6 "Web ops … provided by a stub provider
//! recording calls without touching a network"): an in-memory call log plus
//! a canned response, rather than a real browser backend.

use sentra_core::Value;
use sentra_rt::{ToolError, ToolRegistry};
use serde_json::Value as Json;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub op: String,
    pub args: Json,
}

/// In-memory recorder for `web.*` ops. Every call succeeds and is logged;
/// `extract_field` returns an empty string unless a canned value was seeded
/// with [`WebAdapter::stub_field`].
#[derive(Clone, Default)]
pub struct WebAdapter {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    log: Vec<RecordedCall>,
    field_values: std::collections::HashMap<String, Value>,
}

impl WebAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the value `extract field SELECTOR` returns for `selector`.
    pub fn stub_field(&self, selector: impl Into<String>, value: Value) {
        self.state.lock().expect("web adapter state poisoned").field_values.insert(selector.into(), value);
    }

    pub fn call_log(&self) -> Vec<RecordedCall> {
        self.state.lock().expect("web adapter state poisoned").log.clone()
    }

    pub fn was_called(&self, op: &str) -> bool {
        self.state.lock().expect("web adapter state poisoned").log.iter().any(|c| c.op == op)
    }

    pub fn register(&self, registry: &mut ToolRegistry) {
        for op in ["web.use_system", "web.login", "web.logout", "web.goto_page", "web.enter_field", "web.click_element"] {
            let adapter = self.clone();
            let owned_op = op.to_string();
            registry.register(op, &["network"], Box::new(move |args| adapter.record(owned_op.clone(), args)));
        }

        let extract = self.clone();
        registry.register("web.extract_field", &["network"], Box::new(move |args| extract.extract_field(args)));
    }

    fn record(&self, op: String, args: Json) -> Result<Value, ToolError> {
        let mut state = self.state.lock().expect("web adapter state poisoned");
        state.log.push(RecordedCall { op, args });
        Ok(Value::Bool(true))
    }

    fn extract_field(&self, args: Json) -> Result<Value, ToolError> {
        let selector = args
            .get("selector")
            .and_then(Json::as_str)
            .ok_or_else(|| ToolError::new("'selector' is required"))?
            .to_string();
        let mut state = self.state.lock().expect("web adapter state poisoned");
        let value = state.field_values.get(&selector).cloned().unwrap_or(Value::Str(String::new()));
        state.log.push(RecordedCall { op: "web.extract_field".to_string(), args });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recorded_ops_always_succeed_and_are_logged() {
        let adapter = WebAdapter::new();
        let result = adapter.record("web.click_element".to_string(), json!({"selector": "#go"})).unwrap();
        assert_eq!(result, Value::Bool(true));
        assert!(adapter.was_called("web.click_element"));
    }

    #[test]
    fn extract_field_returns_a_stubbed_value_when_seeded() {
        let adapter = WebAdapter::new();
        adapter.stub_field("#balance", Value::Number(42.0));
        let result = adapter.extract_field(json!({"selector": "#balance"})).unwrap();
        assert_eq!(result, Value::Number(42.0));
    }

    #[test]
    fn extract_field_defaults_to_an_empty_string() {
        let adapter = WebAdapter::new();
        let result = adapter.extract_field(json!({"selector": "#unknown"})).unwrap();
        assert_eq!(result, Value::Str(String::new()));
    }
}
