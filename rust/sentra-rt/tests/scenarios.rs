//! Interpreter scenarios driven entirely through the public `sentra-rt` and
//! `sentra-compiler` APIs, exercising the VM from outside the crate rather
//! than through its private modules.

use sentra_compiler::compiler::ir::{ErrorPolicy, IrProgram, IrStep};
use sentra_core::Value;
use sentra_rt::{Interpreter, RuntimeError, ToolRegistry};
use serde_json::json;

fn passthrough_set_var() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(
        "set_var",
        &[],
        Box::new(|args| Ok(Value::from(args.get("value").cloned().unwrap_or(serde_json::Value::Null)))),
    );
    registry
}

#[test]
fn s5_for_each_scopes_row_to_the_loop_body() {
    let registry = passthrough_set_var();
    let mut program = IrProgram::default();
    program.steps.push(
        IrStep::new("step_001", "set_var", json!({"value": [{"Amount": 10.0}, {"Amount": 20.0}]}))
            .with_result("Items", "table"),
    );
    program.steps.push(IrStep::new(
        "step_002",
        "control.for_each",
        json!({
            "var": "row",
            "collection": {"type": "ref", "name": "Items"},
            "body": [IrStep::new(
                "step_003",
                "set_var",
                json!({"value": {"type": "qualified", "base": "row", "field": "Amount"}}),
            ).with_result("last_amount", "scalar")],
        }),
    ));

    let outcome = Interpreter::new(&registry).run(&program).unwrap();
    assert_eq!(outcome.env.get("last_amount"), Some(&Value::Number(20.0)));
    assert!(!outcome.env.contains("row"), "loop variable must not leak past the loop");
}

#[test]
fn s7_if_else_takes_the_matching_branch() {
    let registry = passthrough_set_var();
    let mut program = IrProgram::default();
    program.steps.push(
        IrStep::new("step_001", "set_var", json!({"value": 5})).with_result("Balance", "scalar"),
    );
    program.steps.push(IrStep::new(
        "step_002",
        "control.if",
        json!({
            "condition": {
                "type": "comparison",
                "left": {"type": "ref", "name": "Balance"},
                "op": "gt",
                "right": {"type": "number", "value": 0.0},
            },
            "then": [IrStep::new("step_003", "set_var", json!({"value": "positive"})).with_result("verdict", "scalar")],
            "else": [IrStep::new("step_004", "set_var", json!({"value": "non_positive"})).with_result("verdict", "scalar")],
        }),
    ));

    let outcome = Interpreter::new(&registry).run(&program).unwrap();
    assert_eq!(outcome.env.get("verdict"), Some(&Value::Str("positive".to_string())));
}

#[test]
fn s8_skip_policy_records_a_skipped_step_and_keeps_running() {
    let mut registry = passthrough_set_var();
    registry.register("web.click_element", &[], Box::new(|_| Err(sentra_rt::ToolError::new("element not found"))));

    let mut program = IrProgram::default();
    program.error_policy = ErrorPolicy { default: "stop".to_string() };
    program.steps.push(IrStep::new("step_001", "control.on_error", json!({"action": "skip"})));
    program.steps.push(IrStep::new("step_002", "web.click_element", json!({"selector": "#missing"})));
    program.steps.push(
        IrStep::new("step_003", "set_var", json!({"value": "reached"})).with_result("after", "scalar"),
    );

    let outcome = Interpreter::new(&registry).run(&program).unwrap();
    assert!(outcome.trace.iter().any(|r| r.skipped));
    assert_eq!(outcome.env.get("after"), Some(&Value::Str("reached".to_string())));
}

#[test]
fn escalate_policy_aborts_even_if_a_later_step_would_have_relaxed_it() {
    let mut registry = passthrough_set_var();
    registry.register("web.click_element", &[], Box::new(|_| Err(sentra_rt::ToolError::new("boom"))));

    let mut program = IrProgram::default();
    program.steps.push(IrStep::new("step_001", "control.on_error", json!({"action": "escalate"})));
    program.steps.push(IrStep::new("step_002", "web.click_element", json!({})));

    let err = Interpreter::new(&registry).run(&program).unwrap_err();
    assert!(matches!(err, RuntimeError::Escalated { .. }));
}
