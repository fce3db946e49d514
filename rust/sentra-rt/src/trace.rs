//! Execution trace recording (§4.5 "Trace", §6 "trace file format"): one
//! JSON line per executed step, in execution order, suitable for `sentra
//! explain`/`sentra trace` to replay without re-running the program.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub step_id: String,
    pub op: String,
    pub args: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceRecord {
    pub fn new(step_id: impl Into<String>, op: impl Into<String>, args: Json) -> Self {
        Self {
            step_id: step_id.into(),
            op: op.into(),
            args,
            result: None,
            dry_run: false,
            skipped: false,
            error: None,
        }
    }

    pub fn with_result(mut self, result: Json) -> Self {
        self.result = Some(result);
        self
    }

    pub fn as_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn as_skipped(mut self, error: impl Into<String>) -> Self {
        self.skipped = true;
        self.error = Some(error.into());
        self
    }
}

/// Writes one JSON object per line (§6 "trace file format"), named by run
/// id the way `sentra --trace-dir DIR run` does.
pub fn write_trace(path: &Path, records: &[TraceRecord]) -> io::Result<()> {
    let mut file = File::create(path)?;
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

pub fn read_trace(path: &Path) -> io::Result<Vec<TraceRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(&line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trace_round_trips_through_a_file() {
        let path = std::env::temp_dir().join(format!("sentra-rt-trace-test-{}.jsonl", std::process::id()));
        let records = vec![
            TraceRecord::new("step_001", "set_var", json!({"value": 1})).with_result(json!(1)),
            TraceRecord::new("step_002", "excel.export", json!({"path": "out.csv"})).as_dry_run(),
        ];
        write_trace(&path, &records).unwrap();
        let back = read_trace(&path).unwrap();
        assert_eq!(records, back);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn skipped_record_carries_its_error() {
        let record = TraceRecord::new("step_003", "web.click_element", json!({})).as_skipped("timeout");
        assert!(record.skipped);
        assert_eq!(record.error.as_deref(), Some("timeout"));
    }
}
