//! The JSON-serializable intermediate representation (§3 "IR step", "IR program").
//!
//! Expression trees are modeled as `IrValue`, a tagged-variant tree (§9
//! "Dynamic IR arg trees"), while a step's `args` is kept as a bare
//! `serde_json::Value` object so each op can mix plain literals (a sheet
//! name, a path) with nested `IrValue` trees (a filter condition).

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// An expression lowered to its JSON-serializable IR shape (§4.4 "Expression
/// lowering"). Encodes to exactly the `{"type": ..., ...}` shapes §4.4's
/// lowering table specifies per expression variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IrValue {
    Number { value: f64 },
    String { value: String },
    Money { currency: String, amount: f64 },
    Date { value: String },
    Ref { name: String },
    Qualified { base: String, field: String },
    Comparison { left: Box<IrValue>, op: String, right: Box<IrValue> },
    Binary { op: String, left: Box<IrValue>, right: Box<IrValue> },
    Not { expr: Box<IrValue> },
    List { items: Vec<IrValue> },
    Unknown {},
}

impl IrValue {
    pub fn into_json(self) -> Json {
        serde_json::to_value(self).expect("IrValue always serializes")
    }
}

/// One compiled step (§3 "IR step"). `args` is a JSON object whose leaves
/// may be plain literals or `IrValue`-shaped reference/expression nodes;
/// for `control.for_each`/`control.if` steps it additionally carries
/// `body`/`then`/`else` arrays of nested `IrStep`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrStep {
    pub id: String,
    pub op: String,
    pub args: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
}

impl IrStep {
    pub fn new(id: impl Into<String>, op: impl Into<String>, args: Json) -> Self {
        Self { id: id.into(), op: op.into(), args, result: None, result_type: None }
    }

    pub fn with_result(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.result = Some(name.into());
        self.result_type = Some(ty.into());
        self
    }

    pub fn with_result_name(mut self, name: impl Into<String>) -> Self {
        self.result = Some(name.into());
        self
    }
}

/// `error_policy.default` (§3, §4.5 "Error policy").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    pub default: String,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self { default: "stop".to_string() }
    }
}

/// The top-level compiled program (§3 "IR program", §6 "IR JSON schema").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrProgram {
    pub version: String,
    pub steps: Vec<IrStep>,
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Default for IrProgram {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            steps: Vec::new(),
            error_policy: ErrorPolicy::default(),
            permissions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_value_encodes_to_spec_shape() {
        let v = IrValue::Ref { name: "T".into() };
        assert_eq!(v.into_json(), serde_json::json!({"type": "ref", "name": "T"}));
    }

    #[test]
    fn qualified_value_encodes_to_spec_shape() {
        let v = IrValue::Qualified { base: "T".into(), field: "Balance".into() };
        assert_eq!(
            v.into_json(),
            serde_json::json!({"type": "qualified", "base": "T", "field": "Balance"})
        );
    }

    #[test]
    fn ir_program_round_trips_through_json() {
        let mut program = IrProgram::default();
        program.steps.push(IrStep::new("step_001", "excel.open_workbook", serde_json::json!({"path": "a.xlsx"})));
        let json = serde_json::to_string(&program).unwrap();
        let back: IrProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(program, back);
    }
}
