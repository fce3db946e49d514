//! The runtime value model shared by the interpreter environment and the
//! tool registry boundary. Unlike the IR's literal-encoding types (see
//! `sentra-compiler::ir::IrValue`), `Value` is what actually flows through
//! an env during a `run`.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A monetary amount tagged with an ISO-4217-ish currency code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub currency: Currency,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn parse(s: &str) -> Option<Currency> {
        match s {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

/// An ordered mapping from column name to cell value — one spreadsheet row.
/// Kept as a `Vec` rather than a hash map so header order (and therefore
/// CSV/XLSX export order) is always the order the columns were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row(Vec<(String, Value)>);

impl Row {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

/// The dynamically-typed value an interpreter environment binds names to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// An ISO-8601 date string; kept distinct from `Str` so diagnostics and
    /// the `date` sentence form round-trip cleanly.
    Date(String),
    Money(Money),
    Row(Row),
    Table(Vec<Row>),
    /// An opaque handle returned by a tool (e.g. an open workbook). `kind`
    /// disambiguates handle namespaces; `id` is host-assigned and otherwise
    /// meaningless to the interpreter.
    Handle { kind: String, id: u64 },
}

impl Value {
    /// Coerce to `f64` for numeric comparisons, per the filter/sort
    /// coercion rules in §4.6: numbers pass through, money is reduced to
    /// its amount, everything else fails.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Money(m) => Some(m.amount),
            _ => None,
        }
    }

    /// Stringification used as the cross-type sort fallback (§4.6).
    pub fn to_sort_key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) | Value::Date(s) => s.clone(),
            Value::Money(m) => format!("{} {}", m.currency.as_str(), m.amount),
            Value::Row(_) | Value::Table(_) => String::new(),
            Value::Handle { kind, id } => format!("{kind}#{id}"),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) | Value::Date(s) => !s.is_empty(),
            Value::Money(m) => m.amount != 0.0,
            Value::Table(t) => !t.is_empty(),
            Value::Row(r) => !r.is_empty(),
            Value::Handle { .. } => true,
        }
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(b),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) | Value::Date(s) => Json::String(s),
            Value::Money(m) => serde_json::json!({"currency": m.currency.as_str(), "amount": m.amount}),
            Value::Row(row) => {
                let mut map = serde_json::Map::new();
                for (k, v) in row.iter() {
                    map.insert(k.to_string(), v.clone().into());
                }
                Json::Object(map)
            }
            Value::Table(rows) => Json::Array(rows.into_iter().map(|r| Value::Row(r).into()).collect()),
            Value::Handle { kind, id } => serde_json::json!({"__handle": kind, "id": id}),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            Json::String(s) => Value::Str(s),
            Json::Array(items) => {
                let rows: Option<Vec<Row>> = items
                    .iter()
                    .map(|item| match Value::from(item.clone()) {
                        Value::Row(r) => Some(r),
                        _ => None,
                    })
                    .collect();
                match rows {
                    Some(rows) => Value::Table(rows),
                    None => Value::Str(Json::Array(items).to_string()),
                }
            }
            Json::Object(map) => {
                if let Some(Json::String(kind)) = map.get("__handle") {
                    if let Some(id) = map.get("id").and_then(Json::as_u64) {
                        return Value::Handle { kind: kind.clone(), id };
                    }
                }
                if let (Some(currency), Some(amount)) = (
                    map.get("currency").and_then(Json::as_str).and_then(Currency::parse),
                    map.get("amount").and_then(Json::as_f64),
                ) {
                    return Value::Money(Money { currency, amount });
                }
                let row = map
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect();
                Value::Row(row)
            }
        }
    }
}
