//! Reference spreadsheet adapter (§4.6, §9): an in-memory tool registry
//! implementation, not a full `.xlsx` I/O backend. Workbook contents are
//! seeded in-memory fixtures keyed by the path a program's
//! `Open workbook "…"` names, wrapping that backend behind the same
//! `ToolFn` seam every other provider crate registers through rather than
//! talking to a real filesystem.

mod range;

use range::parse_range;
use sentra_core::{Row, Value};
use sentra_rt::condition::{eval_bool, eval_value, NoLookup, RowLookup};
use sentra_rt::{ToolError, ToolRegistry};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Sheet = Vec<Vec<Json>>;

#[derive(Default)]
struct State {
    fixtures: HashMap<String, HashMap<String, Sheet>>,
    handles: HashMap<u64, String>,
    next_handle: u64,
    /// Convenience stack for the colon-less form (§9): the most recently
    /// opened workbook when a `read_table` step omits `workbook`.
    stack: Vec<u64>,
}

/// The in-process spreadsheet adapter. Cheap to clone: all state lives
/// behind an `Arc<Mutex<_>>` so the same adapter can back every closure
/// registered into a [`ToolRegistry`].
#[derive(Clone, Default)]
pub struct ExcelAdapter {
    state: Arc<Mutex<State>>,
}

impl ExcelAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one sheet's grid (row 0 is the header row) under `path`, for a
    /// host or test to call before a run.
    pub fn load_fixture(&self, path: impl Into<String>, sheet: impl Into<String>, rows: Sheet) {
        let mut state = self.state.lock().expect("excel adapter state poisoned");
        state.fixtures.entry(path.into()).or_default().insert(sheet.into(), rows);
    }

    /// Registers every required op (§4.6) into `registry` under this
    /// adapter's shared state.
    pub fn register(&self, registry: &mut ToolRegistry) {
        let open = self.clone();
        registry.register(
            "excel.open_workbook",
            &["fs"],
            Box::new(move |args| open.open_workbook(args)),
        );

        let read = self.clone();
        registry.register(
            "excel.read_table",
            &["fs"],
            Box::new(move |args| read.read_table(args)),
        );

        let export = self.clone();
        registry.register("excel.export", &["fs"], Box::new(move |args| export.export(args)));

        let add_column = self.clone();
        registry.register("table.add_column", &[], Box::new(move |args| add_column.add_column(args)));

        let filter = self.clone();
        registry.register("table.filter", &[], Box::new(move |args| filter.filter(args)));

        let sort = self.clone();
        registry.register("table.sort", &[], Box::new(move |args| sort.sort(args)));

        let group = self.clone();
        registry.register("table.group", &[], Box::new(move |args| group.group(args)));
    }

    fn open_workbook(&self, args: Json) -> Result<Value, ToolError> {
        let path = args.get("path").and_then(Json::as_str).ok_or_else(|| ToolError::new("'path' is required"))?;
        let mut state = self.state.lock().expect("excel adapter state poisoned");
        if !state.fixtures.contains_key(path) {
            return Err(ToolError::new(format!("workbook not found: '{path}'")));
        }
        let id = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(id, path.to_string());
        state.stack.push(id);
        Ok(Value::Handle { kind: "workbook".to_string(), id })
    }

    fn read_table(&self, args: Json) -> Result<Value, ToolError> {
        let sheet_name = args.get("sheet").and_then(Json::as_str).ok_or_else(|| ToolError::new("'sheet' is required"))?;
        let range_spec = args.get("range").and_then(Json::as_str).ok_or_else(|| ToolError::new("'range' is required"))?;
        let range = parse_range(range_spec)?;

        let state = self.state.lock().expect("excel adapter state poisoned");
        let handle_id = match args.get("workbook").map(|v| Value::from(v.clone())) {
            Some(Value::Handle { id, .. }) => id,
            _ => *state.stack.last().ok_or_else(|| ToolError::new("no workbook is open"))?,
        };
        let path = state.handles.get(&handle_id).ok_or_else(|| ToolError::new("unknown workbook handle"))?;
        let sheet = state
            .fixtures
            .get(path)
            .and_then(|sheets| sheets.get(sheet_name))
            .ok_or_else(|| ToolError::new(format!("sheet '{sheet_name}' not found in '{path}'")))?;

        if range.end_row >= sheet.len() {
            return Err(ToolError::new(format!("range '{range_spec}' exceeds sheet '{sheet_name}' bounds")));
        }
        let slice = &sheet[range.start_row..=range.end_row];
        let header: Vec<String> = slice[0][range.start_col..=range.end_col]
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell.as_str() {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => format!("_c{i}"),
            })
            .collect();

        let mut rows = Vec::with_capacity(slice.len() - 1);
        for data_row in &slice[1..] {
            let mut row = Row::new();
            for (i, name) in header.iter().enumerate() {
                let cell = data_row.get(range.start_col + i).cloned().unwrap_or(Json::Null);
                row.set(name.clone(), Value::from(cell));
            }
            rows.push(row);
        }
        Ok(Value::Table(rows))
    }

    fn export(&self, args: Json) -> Result<Value, ToolError> {
        let source = args.get("source").cloned().unwrap_or(Json::Null);
        let path = args.get("path").and_then(Json::as_str).ok_or_else(|| ToolError::new("'path' is required"))?;
        let rows = match source {
            Json::Array(items) if !items.is_empty() => items,
            _ => return Ok(Value::Bool(true)),
        };

        if path.ends_with(".csv") {
            write_csv(path, &rows)?;
        } else {
            write_xlsx_equivalent(path, &rows)?;
        }
        Ok(Value::Bool(true))
    }

    fn add_column(&self, args: Json) -> Result<Value, ToolError> {
        let table = table_rows(&args)?;
        let name = args.get("name").and_then(Json::as_str).ok_or_else(|| ToolError::new("'name' is required"))?;
        let expr_node = args.get("expr").cloned().unwrap_or(Json::Null);
        let broadcast: Json = eval_value(&expr_node, &NoLookup).into();
        let rows: Vec<Row> = table
            .into_iter()
            .map(|mut row| {
                row.set(name.to_string(), Value::from(broadcast.clone()));
                row
            })
            .collect();
        Ok(Value::Table(rows))
    }

    fn filter(&self, args: Json) -> Result<Value, ToolError> {
        let table = table_rows(&args)?;
        let condition = args.get("condition").cloned().unwrap_or(Json::Null);
        let kept = table.into_iter().filter(|row| eval_bool(&condition, &RowLookup(row))).collect();
        Ok(Value::Table(kept))
    }

    fn sort(&self, args: Json) -> Result<Value, ToolError> {
        let mut table = table_rows(&args)?;
        let field = args
            .get("by")
            .and_then(|node| node.get("field"))
            .and_then(Json::as_str)
            .ok_or_else(|| ToolError::new("'by' must be a qualified field reference"))?;
        let ascending = args.get("ascending").and_then(Json::as_bool).unwrap_or(true);

        table.sort_by(|a, b| sort_key(a.get(field)).cmp(&sort_key(b.get(field))));
        if !ascending {
            table.reverse();
        }
        Ok(Value::Table(table))
    }

    fn group(&self, args: Json) -> Result<Value, ToolError> {
        let table = table_rows(&args)?;
        let field = args
            .get("by")
            .and_then(|node| node.get("field"))
            .and_then(Json::as_str)
            .ok_or_else(|| ToolError::new("'by' must be a qualified field reference"))?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, (Value, usize)> = HashMap::new();
        for row in &table {
            let key_value = row.get(field).cloned().unwrap_or(Value::Null);
            let key = key_value.to_sort_key();
            let entry = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                (key_value.clone(), 0)
            });
            entry.1 += 1;
        }

        let rows = order
            .into_iter()
            .map(|key| {
                let (value, count) = groups.remove(&key).expect("key was just inserted");
                let mut row = Row::new();
                row.set(field.to_string(), value);
                row.set("count", Value::Number(count as f64));
                row
            })
            .collect();
        Ok(Value::Table(rows))
    }
}

/// A sortable string key that places `Null`/missing fields before all
/// other values (§4.6 "`None` sorts before all values").
fn sort_key(value: Option<&Value>) -> (u8, String) {
    match value {
        None | Some(Value::Null) => (0, String::new()),
        Some(v) => (1, v.to_sort_key()),
    }
}

fn table_rows(args: &Json) -> Result<Vec<Row>, ToolError> {
    match args.get("table").cloned() {
        Some(Json::Array(items)) => match Value::from(Json::Array(items)) {
            Value::Table(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        },
        _ => Err(ToolError::new("'table' must resolve to a table value")),
    }
}

fn write_csv(path: &str, rows: &[Json]) -> Result<(), ToolError> {
    let headers = row_headers(rows);
    let mut writer = csv::Writer::from_path(path).map_err(|e| ToolError::new(format!("csv create failed: {e}")))?;
    writer.write_record(&headers).map_err(|e| ToolError::new(format!("csv write failed: {e}")))?;
    for row in rows {
        let record: Vec<String> = headers.iter().map(|h| cell_to_string(row.get(h))).collect();
        writer.write_record(&record).map_err(|e| ToolError::new(format!("csv write failed: {e}")))?;
    }
    writer.flush().map_err(|e| ToolError::new(format!("csv flush failed: {e}")))
}

/// A deliberately simplified, plain-text stand-in for a real `.xlsx`
/// workbook (§1, §4.6 — no `.xlsx`-writing crate exists anywhere in the
/// dependency stack this adapter draws from). One header line followed by
/// one tab-separated data line per row; good enough to round-trip through
/// `sentra trace`/tests without claiming to be an Open Packaging Conventions
/// archive.
fn write_xlsx_equivalent(path: &str, rows: &[Json]) -> Result<(), ToolError> {
    let headers = row_headers(rows);
    let mut out = String::new();
    out.push_str("sentra-xlsx-equivalent/v1\n");
    out.push_str(&headers.join("\t"));
    out.push('\n');
    for row in rows {
        let record: Vec<String> = headers.iter().map(|h| cell_to_string(row.get(h))).collect();
        out.push_str(&record.join("\t"));
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| ToolError::new(format!("xlsx-equivalent write failed: {e}")))
}

fn row_headers(rows: &[Json]) -> Vec<String> {
    match rows.first() {
        Some(Json::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn cell_to_string(cell: Option<&Json>) -> String {
    match cell {
        None | Some(Json::Null) => String::new(),
        Some(Json::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_sheet() -> Sheet {
        vec![
            vec![json!("Amount"), json!("Balance"), json!("Name")],
            vec![json!(100), json!(50), json!("Alice")],
            vec![json!(200), json!(0), json!("Bob")],
            vec![json!(300), json!(75.5), json!("Carol")],
        ]
    }

    #[test]
    fn open_workbook_rejects_unknown_paths() {
        let adapter = ExcelAdapter::new();
        let err = adapter.open_workbook(json!({"path": "missing.xlsx"})).unwrap_err();
        assert!(err.message.contains("not found"));
    }

    #[test]
    fn read_table_slices_the_requested_range_with_a_header_row() {
        let adapter = ExcelAdapter::new();
        adapter.load_fixture("data.xlsx", "Data", sample_sheet());
        let handle = adapter.open_workbook(json!({"path": "data.xlsx"})).unwrap();
        let handle_json: Json = handle.into();
        let table = adapter
            .read_table(json!({"sheet": "Data", "range": "A1C4", "workbook": handle_json}))
            .unwrap();
        match table {
            Value::Table(rows) => {
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[0].get("Name"), Some(&Value::Str("Alice".to_string())));
            }
            other => panic!("expected a table, got {other:?}"),
        }
    }

    #[test]
    fn read_table_falls_back_to_the_stack_when_workbook_is_omitted() {
        let adapter = ExcelAdapter::new();
        adapter.load_fixture("data.xlsx", "Data", sample_sheet());
        adapter.open_workbook(json!({"path": "data.xlsx"})).unwrap();
        let table = adapter.read_table(json!({"sheet": "Data", "range": "A1:C4"})).unwrap();
        assert!(matches!(table, Value::Table(rows) if rows.len() == 3));
    }

    #[test]
    fn filter_keeps_only_matching_rows() {
        let adapter = ExcelAdapter::new();
        let table = vec![
            json!({"Balance": 50}),
            json!({"Balance": 0}),
            json!({"Balance": 75.5}),
        ];
        let condition = json!({
            "type": "comparison",
            "left": {"type": "qualified", "base": "T", "field": "Balance"},
            "op": "gt",
            "right": {"type": "number", "value": 0.0},
        });
        let result = adapter.filter(json!({"table": table, "condition": condition})).unwrap();
        assert!(matches!(result, Value::Table(rows) if rows.len() == 2));
    }

    #[test]
    fn sort_is_stable_and_reverses_for_descending() {
        let adapter = ExcelAdapter::new();
        let table = vec![json!({"n": 2}), json!({"n": 1}), json!({"n": 1})];
        let by = json!({"type": "qualified", "base": "T", "field": "n"});
        let ascending = adapter.sort(json!({"table": table.clone(), "by": by.clone(), "ascending": true})).unwrap();
        let descending = adapter.sort(json!({"table": table, "by": by, "ascending": false})).unwrap();
        let Value::Table(asc_rows) = ascending else { panic!("expected a table") };
        let Value::Table(mut desc_rows) = descending else { panic!("expected a table") };
        desc_rows.reverse();
        assert_eq!(asc_rows, desc_rows);
    }

    #[test]
    fn group_counts_rows_per_distinct_key() {
        let adapter = ExcelAdapter::new();
        let table = vec![json!({"region": "east"}), json!({"region": "west"}), json!({"region": "east"})];
        let by = json!({"type": "qualified", "base": "T", "field": "region"});
        let result = adapter.group(json!({"table": table, "by": by, "aggregates": []})).unwrap();
        let Value::Table(rows) = result else { panic!("expected a table") };
        assert_eq!(rows.len(), 2);
        let east = rows.iter().find(|r| r.get("region") == Some(&Value::Str("east".to_string()))).unwrap();
        assert_eq!(east.get("count"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn add_column_broadcasts_a_constant_to_every_row() {
        let adapter = ExcelAdapter::new();
        let table = vec![json!({"a": 1}), json!({"a": 2})];
        let value = json!({"type": "string", "value": "pending"});
        let result = adapter.add_column(json!({"table": table, "name": "status", "expr": value})).unwrap();
        let Value::Table(rows) = result else { panic!("expected a table") };
        assert!(rows.iter().all(|r| r.get("status") == Some(&Value::Str("pending".to_string()))));
    }

    #[test]
    fn export_writes_csv_rows_matching_filtered_table() {
        let adapter = ExcelAdapter::new();
        let path = std::env::temp_dir().join(format!("sentra-provider-excel-test-{}.csv", std::process::id()));
        let source = json!([{"Name": "Alice", "Balance": 50}, {"Name": "Carol", "Balance": 75.5}]);
        adapter.export(json!({"source": source, "path": path.to_str().unwrap()})).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Alice"));
        assert!(content.contains("Carol"));
        std::fs::remove_file(&path).unwrap();
    }
}
