//! AST → IR lowering (§4.4). Each statement becomes one `IrStep` (or, for
//! `for each`/`if`/`else`, a step carrying nested step arrays); step ids are
//! drawn from a single counter shared across nested bodies so ids stay
//! globally ordered regardless of nesting depth.

use crate::compiler::ast::{CompareOp, ErrorAction, Expr, Program, SelectorKind, Stmt};
use crate::compiler::ir::{ErrorPolicy, IrProgram, IrStep, IrValue};
use serde_json::{json, Map, Value as Json};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LowerError {
    #[error("'{what}' is not yet supported by lowering")]
    Unsupported { what: String },
}

struct Lowerer {
    next_id: u64,
    next_handle: u64,
    /// name of the currently open workbook's handle result, if any (§9
    /// "workbook handle threading" resolution of the process-wide stack
    /// open question).
    current_workbook: Option<String>,
}

impl Lowerer {
    fn new() -> Self {
        Self { next_id: 1, next_handle: 0, current_workbook: None }
    }

    fn fresh_id(&mut self) -> String {
        let id = format!("step_{:03}", self.next_id);
        self.next_id += 1;
        id
    }

    fn fresh_handle_name(&mut self) -> String {
        let name = format!("__wb{}", self.next_handle);
        self.next_handle += 1;
        name
    }

    fn lower_program(&mut self, program: &Program) -> Result<IrProgram, LowerError> {
        let mut ir = IrProgram::default();
        ir.steps = self.lower_block(&program.statements)?;
        Ok(ir)
    }

    fn lower_block(&mut self, statements: &[Stmt]) -> Result<Vec<IrStep>, LowerError> {
        let mut steps = Vec::with_capacity(statements.len());
        for stmt in statements {
            steps.push(self.lower_stmt(stmt)?);
        }
        Ok(steps)
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<IrStep, LowerError> {
        let id = self.fresh_id();
        match stmt {
            Stmt::OpenWorkbook { path, .. } => {
                let handle_name = self.fresh_handle_name();
                self.current_workbook = Some(handle_name.clone());
                Ok(IrStep::new(id, "excel.open_workbook", json!({"path": path}))
                    .with_result(handle_name, "handle"))
            }
            Stmt::TreatRangeAsTable { sheet, range, table_name, .. } => {
                let mut args = Map::new();
                args.insert("sheet".into(), json!(sheet));
                args.insert("range".into(), json!(range));
                if let Some(handle) = &self.current_workbook {
                    args.insert("workbook".into(), IrValue::Ref { name: handle.clone() }.into_json());
                }
                Ok(IrStep::new(id, "excel.read_table", Json::Object(args)).with_result(table_name, "table"))
            }
            Stmt::SetVar { name, value, .. } => {
                let args = json!({"value": lower_expr(value)});
                Ok(IrStep::new(id, "set_var", args).with_result(name, "scalar"))
            }
            Stmt::AddColumn { table, column_name, value, .. } => {
                let args = json!({
                    "table": table,
                    "name": column_name,
                    "expr": lower_expr(value),
                });
                Ok(IrStep::new(id, "table.add_column", args).with_result(table, "table"))
            }
            Stmt::FilterTable { table, condition, .. } => {
                let args = json!({"table": table, "condition": lower_expr(condition)});
                Ok(IrStep::new(id, "table.filter", args).with_result(table, "table"))
            }
            Stmt::SortTable { table, by, ascending, .. } => {
                let args = json!({"table": table, "by": lower_expr(by), "ascending": ascending});
                Ok(IrStep::new(id, "table.sort", args).with_result(table, "table"))
            }
            Stmt::GroupTable { table, by, aggregates, .. } => {
                let args = json!({"table": table, "by": lower_expr(by), "aggregates": aggregates});
                Ok(IrStep::new(id, "table.group", args).with_result(table, "table"))
            }
            Stmt::ExportTable { source, path, .. } => {
                let args = json!({"source": lower_expr(source), "path": path});
                Ok(IrStep::new(id, "excel.export", args))
            }
            Stmt::CallResult { name, .. } => {
                let args = json!({"name": IrValue::Ref { name: name.clone() }.into_json()});
                Ok(IrStep::new(id, "call_result", args))
            }
            Stmt::UseSystem { name, version, .. } => {
                Ok(IrStep::new(id, "web.use_system", json!({"name": name, "version": version})))
            }
            Stmt::LogIn { credential, .. } => Ok(IrStep::new(id, "web.login", json!({"credential": credential}))),
            Stmt::LogOut { .. } => Ok(IrStep::new(id, "web.logout", json!({}))),
            Stmt::GoToPage { page, .. } => Ok(IrStep::new(id, "web.goto_page", json!({"page": page}))),
            Stmt::EnterField { selector, value, .. } => {
                let args = json!({"selector": selector, "value": lower_expr(value)});
                Ok(IrStep::new(id, "web.enter_field", args))
            }
            Stmt::ClickElement { selector, .. } => Ok(IrStep::new(id, "web.click_element", json!({"selector": selector}))),
            Stmt::ExtractField { var, selector_kind, selector, .. } => {
                let kind = match selector_kind {
                    SelectorKind::Field => "field",
                    SelectorKind::Element => "element",
                };
                let args = json!({"selector": selector, "kind": kind});
                Ok(IrStep::new(id, "web.extract_field", args).with_result(var, "scalar"))
            }
            Stmt::ForEach { var, collection, body, .. } => {
                let nested = self.lower_block(body)?;
                let mut args = Map::new();
                args.insert("var".into(), json!(var));
                args.insert("collection".into(), lower_expr(collection));
                args.insert("body".into(), json!(nested));
                Ok(IrStep::new(id, "control.for_each", Json::Object(args)))
            }
            Stmt::IfElse { condition, then_body, else_body, .. } => {
                let then_steps = self.lower_block(then_body)?;
                let else_steps = self.lower_block(else_body)?;
                let mut args = Map::new();
                args.insert("condition".into(), lower_expr(condition));
                args.insert("then".into(), json!(then_steps));
                args.insert("else".into(), json!(else_steps));
                Ok(IrStep::new(id, "control.if", Json::Object(args)))
            }
            Stmt::OnError { action, arg, .. } => {
                let action_str = match action {
                    ErrorAction::Retry => "retry",
                    ErrorAction::Skip => "skip",
                    ErrorAction::Stop => "stop",
                    ErrorAction::Continue => "continue",
                    ErrorAction::Escalate => "escalate",
                };
                let args = json!({"action": action_str, "arg": arg});
                Ok(IrStep::new(id, "control.on_error", args))
            }
            Stmt::Comment { text, .. } => Ok(IrStep::new(id, "control.comment", json!({"text": text}))),
        }
    }
}

/// Lowers an `Expr` tree to its JSON-serializable `IrValue` shape (§4.4
/// "Expression lowering").
fn lower_expr(expr: &Expr) -> Json {
    match expr {
        Expr::NumberLit { value, .. } => IrValue::Number { value: *value }.into_json(),
        Expr::StringLit { value, .. } => IrValue::String { value: value.clone() }.into_json(),
        Expr::MoneyLit { currency, amount, .. } => {
            IrValue::Money { currency: currency.clone(), amount: *amount }.into_json()
        }
        Expr::DateLit { iso, .. } => IrValue::Date { value: iso.clone() }.into_json(),
        Expr::Identifier { name, .. } => IrValue::Ref { name: name.clone() }.into_json(),
        Expr::QualifiedRef { base, field, .. } => {
            IrValue::Qualified { base: base.clone(), field: field.clone() }.into_json()
        }
        Expr::Comparison { left, op, right, .. } => {
            let op_str = compare_op_str(*op);
            json!({
                "type": "comparison",
                "left": lower_expr(left),
                "op": op_str,
                "right": lower_expr(right),
            })
        }
        Expr::BinaryExpr { left, op, right, .. } => {
            let op_str = match op {
                crate::compiler::ast::BoolOp::And => "and",
                crate::compiler::ast::BoolOp::Or => "or",
            };
            json!({
                "type": "binary",
                "op": op_str,
                "left": lower_expr(left),
                "right": lower_expr(right),
            })
        }
        Expr::NotExpr { inner, .. } => json!({"type": "not", "expr": lower_expr(inner)}),
    }
}

fn compare_op_str(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "eq",
        CompareOp::Ne => "ne",
        CompareOp::Lt => "lt",
        CompareOp::Le => "le",
        CompareOp::Gt => "gt",
        CompareOp::Ge => "ge",
    }
}

/// Lowers a checked `Program` to an `IrProgram` (§4.4 entry point).
/// `error_policy` seeds the program's default before any `control.on_error`
/// step mutates it at run time.
pub fn lower(program: &Program, error_policy: ErrorPolicy) -> Result<IrProgram, LowerError> {
    let span = tracing::debug_span!("lower", statements = program.statements.len());
    let _enter = span.enter();
    let mut lowerer = Lowerer::new();
    let mut ir = lowerer.lower_program(program)?;
    ir.error_policy = error_policy;
    Ok(ir)
}
