//! IR execution (§4.5 "Interpreter algorithm"). Walks an `IrProgram`'s steps
//! in order, resolving references against a running [`Env`], dispatching
//! non-control ops to a host-supplied [`ToolRegistry`], and applying the
//! live error policy a `control.on_error` step may have changed.

use crate::condition::{eval_bool, eval_value, NoLookup};
use crate::env::Env;
use crate::error::RuntimeError;
use crate::refs::resolve_refs;
use crate::registry::ToolRegistry;
use crate::trace::TraceRecord;
use sentra_compiler::compiler::ir::{IrProgram, IrStep};
use sentra_core::Value;
use serde_json::Value as Json;

/// The live error policy (§4.5 "Error policy"), mutated in place by any
/// `control.on_error` step and consulted by every later tool-step failure
/// until the next one changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    Stop,
    Skip,
    Continue,
    Retry,
    Escalate,
}

impl ErrorAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "skip" => ErrorAction::Skip,
            "continue" => ErrorAction::Continue,
            "retry" => ErrorAction::Retry,
            "escalate" => ErrorAction::Escalate,
            _ => ErrorAction::Stop,
        }
    }
}

pub struct Interpreter<'r> {
    registry: &'r ToolRegistry,
    dry_run: bool,
}

pub struct RunOutcome {
    pub trace: Vec<TraceRecord>,
    pub env: Env,
}

impl<'r> Interpreter<'r> {
    pub fn new(registry: &'r ToolRegistry) -> Self {
        Self { registry, dry_run: false }
    }

    /// In dry-run mode (§4.5, §7 "`--dry-run`") every tool step is traced
    /// but never actually dispatched to the registry; `control.if`
    /// conditions and `control.for_each` collections are still resolved and
    /// walked so the trace covers every step a live run would reach.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run(&self, program: &IrProgram) -> Result<RunOutcome, RuntimeError> {
        let mut env = Env::new();
        let mut trace = Vec::new();
        let mut policy = ErrorAction::parse(&program.error_policy.default);
        let span = tracing::info_span!("run", steps = program.steps.len(), dry_run = self.dry_run);
        let _enter = span.enter();
        self.run_block(&program.steps, &mut env, &mut trace, &mut policy)?;
        Ok(RunOutcome { trace, env })
    }

    fn run_block(
        &self,
        steps: &[IrStep],
        env: &mut Env,
        trace: &mut Vec<TraceRecord>,
        policy: &mut ErrorAction,
    ) -> Result<(), RuntimeError> {
        for step in steps {
            self.run_step(step, env, trace, policy)?;
        }
        Ok(())
    }

    fn run_step(
        &self,
        step: &IrStep,
        env: &mut Env,
        trace: &mut Vec<TraceRecord>,
        policy: &mut ErrorAction,
    ) -> Result<(), RuntimeError> {
        match step.op.as_str() {
            "control.on_error" => {
                *policy = ErrorAction::parse(step.args.get("action").and_then(Json::as_str).unwrap_or("stop"));
                trace.push(TraceRecord::new(&step.id, &step.op, step.args.clone()));
                Ok(())
            }
            "control.comment" => {
                trace.push(TraceRecord::new(&step.id, &step.op, step.args.clone()));
                Ok(())
            }
            "control.for_each" => self.run_for_each(step, env, trace, policy),
            "control.if" => self.run_if(step, env, trace, policy),
            "set_var" => self.run_set_var(step, env, trace),
            "call_result" => {
                trace.push(TraceRecord::new(&step.id, &step.op, step.args.clone()));
                Ok(())
            }
            _ => self.run_tool_step(step, env, trace, policy),
        }
    }

    fn run_for_each(
        &self,
        step: &IrStep,
        env: &mut Env,
        trace: &mut Vec<TraceRecord>,
        policy: &mut ErrorAction,
    ) -> Result<(), RuntimeError> {
        let var = step.args.get("var").and_then(Json::as_str).unwrap_or("row").to_string();
        let collection_node = step.args.get("collection").cloned().unwrap_or(Json::Null);
        let resolved = resolve_refs(&collection_node, env);
        let rows = match Value::from(resolved) {
            Value::Table(rows) => rows,
            other => return Err(RuntimeError::TypeError(format!("'for each' expects a table, got {other:?}"))),
        };
        let body: Vec<IrStep> = serde_json::from_value(step.args.get("body").cloned().unwrap_or(Json::Array(vec![])))
            .map_err(|e| RuntimeError::TypeError(e.to_string()))?;

        let had_binding = env.contains(&var);
        let previous = env.get(&var).cloned();
        for row in rows {
            env.set(var.clone(), Value::Row(row));
            self.run_block(&body, env, trace, policy)?;
        }
        match previous {
            Some(value) if had_binding => env.set(var.clone(), value),
            _ => {
                env.remove(&var);
            }
        }
        Ok(())
    }

    fn run_if(
        &self,
        step: &IrStep,
        env: &mut Env,
        trace: &mut Vec<TraceRecord>,
        policy: &mut ErrorAction,
    ) -> Result<(), RuntimeError> {
        let condition_node = step.args.get("condition").cloned().unwrap_or(Json::Null);
        let resolved_condition = resolve_refs(&condition_node, env);
        let taken = eval_bool(&resolved_condition, &NoLookup);
        let branch_key = if taken { "then" } else { "else" };
        let branch: Vec<IrStep> = serde_json::from_value(step.args.get(branch_key).cloned().unwrap_or(Json::Array(vec![])))
            .map_err(|e| RuntimeError::TypeError(e.to_string()))?;
        self.run_block(&branch, env, trace, policy)
    }

    /// `set_var` is a pure runtime op (§4.6): it is never dispatched to the
    /// registry. Its `value` node is first reference-resolved against the
    /// current env, then decoded from its IrValue-tagged leaf shape (a bare
    /// literal, or whatever resolution left behind) into a runtime `Value`.
    fn run_set_var(&self, step: &IrStep, env: &mut Env, trace: &mut Vec<TraceRecord>) -> Result<(), RuntimeError> {
        let value_node = step.args.get("value").cloned().unwrap_or(Json::Null);
        let resolved = resolve_refs(&value_node, env);
        let value = eval_value(&resolved, &NoLookup);
        let result_json: Json = value.clone().into();
        if let Some(name) = &step.result {
            env.set(name.clone(), value);
        }
        trace.push(TraceRecord::new(&step.id, &step.op, step.args.clone()).with_result(result_json));
        Ok(())
    }

    /// Dispatches a non-control step to the tool registry (§4.5 steps 2-4).
    /// `table.*` ops additionally receive their named table's current rows
    /// in place of the bare table-name string the lowering pass emits,
    /// since that name is not a `ref`/`qualified` node and so is never
    /// touched by the generic [`resolve_refs`] pass.
    fn run_tool_step(
        &self,
        step: &IrStep,
        env: &mut Env,
        trace: &mut Vec<TraceRecord>,
        policy: &mut ErrorAction,
    ) -> Result<(), RuntimeError> {
        let mut args = resolve_refs(&step.args, env);
        if step.op.starts_with("table.") {
            substitute_table_arg(&mut args, env);
        }

        if self.dry_run {
            trace.push(TraceRecord::new(&step.id, &step.op, args).as_dry_run());
            return Ok(());
        }

        match self.call_with_policy(&step.op, args.clone(), *policy) {
            Outcome::Ok(value) => {
                let result_json: Json = value.clone().into();
                if let Some(name) = &step.result {
                    env.set(name.clone(), value);
                }
                trace.push(TraceRecord::new(&step.id, &step.op, args).with_result(result_json));
                Ok(())
            }
            Outcome::Skipped(message) => {
                if let Some(name) = &step.result {
                    env.set(name.clone(), Value::Null);
                }
                trace.push(TraceRecord::new(&step.id, &step.op, args).as_skipped(message));
                Ok(())
            }
            Outcome::Err(err) => Err(RuntimeError::Step {
                step_id: step.id.clone(),
                op: step.op.clone(),
                source: Box::new(err),
            }),
        }
    }

    /// Implements the error-policy table in §4.5: `retry` re-invokes the
    /// tool once before falling back to `stop`; `skip`/`continue` swallow
    /// the failure (the difference is purely what the caller binds `result`
    /// to); `escalate` always aborts, regardless of what a later step might
    /// set the policy to.
    fn call_with_policy(&self, op: &str, args: Json, policy: ErrorAction) -> Outcome {
        match self.registry.call(op, args.clone()) {
            Ok(value) => Outcome::Ok(value),
            Err(err) => match policy {
                ErrorAction::Retry => match self.registry.call(op, args) {
                    Ok(value) => Outcome::Ok(value),
                    Err(err) => Outcome::Err(RuntimeError::Tool(err)),
                },
                ErrorAction::Skip | ErrorAction::Continue => Outcome::Skipped(err.message),
                ErrorAction::Escalate => Outcome::Err(RuntimeError::Escalated {
                    step_id: op.to_string(),
                    message: err.message,
                }),
                ErrorAction::Stop => Outcome::Err(RuntimeError::Tool(err)),
            },
        }
    }
}

/// The three-way result of dispatching one tool call under the live error
/// policy, distinct from `Result` so "skipped, but not an error" is its own
/// state rather than overloading `Ok`/`Err`.
enum Outcome {
    Ok(Value),
    Skipped(String),
    Err(RuntimeError),
}

fn substitute_table_arg(args: &mut Json, env: &Env) {
    let Json::Object(map) = args else { return };
    let Some(Json::String(name)) = map.get("table").cloned() else { return };
    if let Some(value) = env.get(&name) {
        map.insert("table".to_string(), value.clone().into());
    }
}
