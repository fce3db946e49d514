//! The interpreter environment (§3 "Interpreter environment"): a mapping
//! from name to runtime value, living for exactly one `run` call.

use sentra_core::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Env {
    vars: HashMap<String, Value>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn snapshot(&self) -> &HashMap<String, Value> {
        &self.vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut env = Env::new();
        env.set("x", Value::Number(1.0));
        assert_eq!(env.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn remove_drops_the_binding() {
        let mut env = Env::new();
        env.set("row", Value::Null);
        env.remove("row");
        assert!(!env.contains("row"));
    }
}
