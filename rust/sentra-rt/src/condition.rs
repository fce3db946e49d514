//! Boolean-condition evaluation shared by `control.if` and the spreadsheet
//! adapter's `table.filter` (§4.3 Open Question: "a complete implementation
//! must extend the filter evaluator to full boolean algebra"). A condition
//! tree is whatever `lower_expr` produced: `comparison`, `binary` (and/or),
//! `not`, or a resolved leaf value.

use chrono::NaiveDate;
use sentra_core::{Currency, Money, Value};
use serde_json::Value as Json;

/// Resolves a `qualified` leaf's `field` name to a value — a row's column
/// for `table.filter`, or nothing at all for `control.if` (whose qualified
/// refs are already resolved against the env before reaching here).
pub trait FieldLookup {
    fn lookup(&self, field: &str) -> Option<Value>;
}

pub struct NoLookup;

impl FieldLookup for NoLookup {
    fn lookup(&self, _field: &str) -> Option<Value> {
        None
    }
}

pub struct RowLookup<'a>(pub &'a sentra_core::Row);

impl FieldLookup for RowLookup<'_> {
    fn lookup(&self, field: &str) -> Option<Value> {
        self.0.get(field).cloned()
    }
}

/// Evaluates a condition tree to a boolean. A non-boolean leaf (a bare
/// qualified ref under a `not`, for instance — `not T.Flag`) is coerced via
/// [`Value::is_truthy`].
pub fn eval_bool(node: &Json, lookup: &dyn FieldLookup) -> bool {
    if let Json::Object(map) = node {
        match map.get("type").and_then(Json::as_str) {
            Some("comparison") => {
                let left = eval_value(map.get("left").unwrap_or(&Json::Null), lookup);
                let right = eval_value(map.get("right").unwrap_or(&Json::Null), lookup);
                let op = map.get("op").and_then(Json::as_str).unwrap_or("");
                return compare(op, &left, &right);
            }
            Some("binary") => {
                let op = map.get("op").and_then(Json::as_str).unwrap_or("");
                let left = eval_bool(map.get("left").unwrap_or(&Json::Null), lookup);
                let right = eval_bool(map.get("right").unwrap_or(&Json::Null), lookup);
                return match op {
                    "and" => left && right,
                    "or" => left || right,
                    _ => false,
                };
            }
            Some("not") => {
                return !eval_bool(map.get("expr").unwrap_or(&Json::Null), lookup);
            }
            _ => {}
        }
    }
    eval_value(node, lookup).is_truthy()
}

/// Evaluates a condition leaf to a scalar [`Value`] (§4.4 "Expression
/// lowering" shapes, plus whatever a prior `resolve_refs` pass already
/// substituted in place of a `ref`/`qualified` node).
pub fn eval_value(node: &Json, lookup: &dyn FieldLookup) -> Value {
    if let Json::Object(map) = node {
        match map.get("type").and_then(Json::as_str) {
            Some("number") => return Value::Number(map.get("value").and_then(Json::as_f64).unwrap_or(0.0)),
            Some("string") => {
                return Value::Str(map.get("value").and_then(Json::as_str).unwrap_or("").to_string())
            }
            Some("date") => {
                let raw = map.get("value").and_then(Json::as_str).unwrap_or("");
                // Canonicalize to YYYY-MM-DD when the literal parses as a
                // calendar date; an unparseable literal is kept verbatim
                // rather than rejected, since this layer never fails a run.
                let normalized = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|_| raw.to_string());
                return Value::Date(normalized);
            }
            Some("money") => {
                let currency = map
                    .get("currency")
                    .and_then(Json::as_str)
                    .and_then(Currency::parse)
                    .unwrap_or(Currency::Usd);
                let amount = map.get("amount").and_then(Json::as_f64).unwrap_or(0.0);
                return Value::Money(Money { currency, amount });
            }
            Some("qualified") => {
                let field = map.get("field").and_then(Json::as_str).unwrap_or("");
                return lookup.lookup(field).unwrap_or(Value::Null);
            }
            Some("ref") => return Value::Null,
            _ => {}
        }
    }
    Value::from(node.clone())
}

/// Comparison coercions (§4.6): money reduces to its amount for numeric
/// ops; equality also succeeds when both sides are numerically coercible
/// and equal; everything else falls back to string comparison.
pub fn compare(op: &str, left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_numeric(), right.as_numeric()) {
        return match op {
            "eq" => a == b,
            "ne" => a != b,
            "lt" => a < b,
            "le" => a <= b,
            "gt" => a > b,
            "ge" => a >= b,
            _ => false,
        };
    }
    match op {
        "eq" => left == right,
        "ne" => left != right,
        "lt" => left.to_sort_key() < right.to_sort_key(),
        "le" => left.to_sort_key() <= right.to_sort_key(),
        "gt" => left.to_sort_key() > right.to_sort_key(),
        "ge" => left.to_sort_key() >= right.to_sort_key(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_core::Row;
    use serde_json::json;

    #[test]
    fn date_literal_normalizes_to_iso_form() {
        let node = json!({"type": "date", "value": "2024-01-05"});
        assert_eq!(eval_value(&node, &NoLookup), Value::Date("2024-01-05".to_string()));
    }

    #[test]
    fn unparseable_date_literal_is_kept_verbatim() {
        let node = json!({"type": "date", "value": "not-a-date"});
        assert_eq!(eval_value(&node, &NoLookup), Value::Date("not-a-date".to_string()));
    }

    #[test]
    fn money_comparison_coerces_to_amount() {
        let cond = json!({
            "type": "comparison",
            "left": {"type": "qualified", "base": "T", "field": "Balance"},
            "op": "gt",
            "right": {"type": "money", "currency": "USD", "amount": 0.0},
        });
        let mut row = Row::new();
        row.set("Balance", Value::Number(50.0));
        assert!(eval_bool(&cond, &RowLookup(&row)));
    }

    #[test]
    fn not_of_a_bare_field_uses_truthiness() {
        let cond = json!({"type": "not", "expr": {"type": "qualified", "base": "T", "field": "Flag"}});
        let mut row = Row::new();
        row.set("Flag", Value::Bool(false));
        assert!(eval_bool(&cond, &RowLookup(&row)));
    }

    #[test]
    fn and_combines_two_comparisons() {
        let cond = json!({
            "type": "binary",
            "op": "and",
            "left": {"type": "comparison", "left": {"type": "qualified", "base": "T", "field": "A"}, "op": "gt", "right": {"type": "number", "value": 0.0}},
            "right": {"type": "comparison", "left": {"type": "qualified", "base": "T", "field": "B"}, "op": "eq", "right": {"type": "number", "value": 1.0}},
        });
        let mut row = Row::new();
        row.set("A", Value::Number(5.0));
        row.set("B", Value::Number(1.0));
        assert!(eval_bool(&cond, &RowLookup(&row)));
    }

    #[test]
    fn unsupported_leaf_is_falsy() {
        let cond = json!({"type": "qualified", "base": "row", "field": "missing"});
        assert!(!eval_bool(&cond, &NoLookup));
    }
}
