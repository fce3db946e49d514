//! Sentra CLI library (§6 "CLI surface"). The binary in `src/bin/sentra.rs`
//! is a thin `clap` front end over the functions here, split between a
//! library crate holding all real logic and a minimal binary wrapper.

use sentra_compiler::compiler::ir::IrProgram;
use sentra_compiler::{compiler, CompileError, Program};
use sentra_provider_excel::ExcelAdapter;
use sentra_provider_web::WebAdapter;
use sentra_rt::{read_trace, write_trace, Interpreter, RunOutcome, RuntimeError, ToolRegistry, TraceRecord};
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Crate-wide error (§7 "A crate-wide `SentraError` enum … for the CLI's
/// single `Result<(), SentraError>` entry points").
#[derive(Debug, Error)]
pub enum SentraError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("{0}")]
    Host(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// `-v`/`-vv` raises the `tracing` filter level.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "sentra=info",
        1 => "sentra=debug,sentra_rt=debug,sentra_compiler=debug",
        _ => "debug",
    };
    let _ = tracing_subscriber::fmt().with_env_filter(level).try_init();
}

/// Builds the registry the reference CLI runs against: the spreadsheet and
/// web stub adapters under their op-name prefixes (§4.6).
pub fn build_registry() -> (ToolRegistry, ExcelAdapter, WebAdapter) {
    let mut registry = ToolRegistry::new();
    let excel = ExcelAdapter::new();
    let web = WebAdapter::new();
    excel.register(&mut registry);
    web.register(&mut registry);
    (registry, excel, web)
}

/// Loads a `--fixtures FILE` JSON document of the shape
/// `{ "<workbook path>": { "<sheet name>": [[row0 cells...], ...] } }` and
/// seeds it into `excel`. Real `.xlsx`/`.csv` parsing is an external
/// collaborator's concern (§1 Non-goals); this is the reference adapter's
/// own in-memory fixture format, used for `sentra run`/`sentra explain`
/// smoke runs and the end-to-end tests.
pub fn load_fixtures(excel: &ExcelAdapter, path: &Path) -> Result<(), SentraError> {
    let text = std::fs::read_to_string(path)?;
    let doc: Json = serde_json::from_str(&text)?;
    let workbooks = doc.as_object().ok_or_else(|| SentraError::Host("fixtures file must be a JSON object".into()))?;
    for (wb_path, sheets) in workbooks {
        let sheets = sheets.as_object().ok_or_else(|| SentraError::Host(format!("'{wb_path}' must map sheet names to grids")))?;
        for (sheet_name, grid) in sheets {
            let rows: Vec<Vec<Json>> = serde_json::from_value(grid.clone())?;
            excel.load_fixture(wb_path.clone(), sheet_name.clone(), rows);
        }
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String, SentraError> {
    Ok(std::fs::read_to_string(path)?)
}

/// `sentra parse FILE` — parse and return the statement count.
pub fn cmd_parse(path: &Path, keywords: Option<&Path>) -> Result<usize, SentraError> {
    let source = read_source(path)?;
    let tokens = sentra_compiler::lex(&source, keywords).map_err(CompileError::from)?;
    let program: Program = sentra_compiler::parse(&tokens).map_err(CompileError::from)?;
    Ok(statement_count(&program))
}

/// `sentra check FILE` — parse and check, succeeding with `Ok(())`.
pub fn cmd_check(path: &Path, keywords: Option<&Path>) -> Result<(), SentraError> {
    let source = read_source(path)?;
    let tokens = sentra_compiler::lex(&source, keywords).map_err(CompileError::from)?;
    let program = sentra_compiler::parse(&tokens).map_err(CompileError::from)?;
    sentra_compiler::check(&program).map_err(CompileError::from)?;
    Ok(())
}

/// `sentra lower FILE` — the full compiled IR program.
pub fn cmd_lower(path: &Path, keywords: Option<&Path>) -> Result<IrProgram, SentraError> {
    let source = read_source(path)?;
    sentra_compiler::compile(&source, keywords).map_err(SentraError::from)
}

pub struct RunResult {
    pub outcome: RunOutcome,
    pub trace_path: PathBuf,
}

/// `sentra run FILE [--dry-run] [--trace-dir DIR] [--fixtures FILE]` — full
/// pipeline; writes the trace alongside the source (or under `--trace-dir`)
/// with suffix `.trace.jsonl` (§6).
pub fn cmd_run(
    path: &Path,
    keywords: Option<&Path>,
    dry_run: bool,
    trace_dir: Option<&Path>,
    fixtures: Option<&Path>,
) -> Result<RunResult, SentraError> {
    let ir = cmd_lower(path, keywords)?;
    let (registry, excel, _web) = build_registry();
    if let Some(fixtures_path) = fixtures {
        load_fixtures(&excel, fixtures_path)?;
    }

    let outcome = Interpreter::new(&registry).with_dry_run(dry_run).run(&ir)?;

    let trace_path = trace_file_path(path, trace_dir);
    write_trace(&trace_path, &outcome.trace)?;
    Ok(RunResult { outcome, trace_path })
}

/// `sentra explain FILE` — each IR step's op and args in human form.
pub fn cmd_explain(path: &Path, keywords: Option<&Path>) -> Result<Vec<String>, SentraError> {
    let ir = cmd_lower(path, keywords)?;
    Ok(ir.steps.iter().map(explain_step).collect())
}

fn explain_step(step: &compiler::ir::IrStep) -> String {
    let result = match &step.result {
        Some(name) => format!(" -> {name}"),
        None => String::new(),
    };
    format!("{}: {} {}{}", step.id, step.op, step.args, result)
}

/// `sentra trace FILE` — the previously recorded trace file.
pub fn cmd_trace(path: &Path, trace_dir: Option<&Path>) -> Result<Vec<TraceRecord>, SentraError> {
    let trace_path = trace_file_path(path, trace_dir);
    Ok(read_trace(&trace_path)?)
}

fn trace_file_path(source: &Path, trace_dir: Option<&Path>) -> PathBuf {
    let file_name = source.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("program"));
    let trace_name = format!("{}.trace.jsonl", file_name.to_string_lossy());
    match trace_dir {
        Some(dir) => dir.join(trace_name),
        None => source.with_file_name(trace_name),
    }
}

fn statement_count(program: &Program) -> usize {
    program_statements(program).len()
}

fn program_statements(program: &Program) -> &[compiler::ast::Stmt] {
    // `Program` only exposes its statements through its public field; kept
    // as a named helper so callers read "statement count" rather than a
    // bare field access.
    &program.statements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str, suffix: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sentra-cli-test-{}-{}", std::process::id(), suffix));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parse_counts_statements() {
        let path = write_temp("Set x to 1.\nSet y to 2.\n", "parse.sentra");
        let count = cmd_parse(&path, None).unwrap();
        assert_eq!(count, 2);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn check_rejects_an_undeclared_table() {
        let path = write_temp("Filter Ghost where Ghost.Balance > 0.\n", "check.sentra");
        let err = cmd_check(&path, None).unwrap_err();
        assert!(matches!(err, SentraError::Compile(_)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn run_writes_a_trace_file_next_to_the_source() {
        let path = write_temp("Set x to 1.\n", "run.sentra");
        let result = cmd_run(&path, None, false, None, None).unwrap();
        assert!(result.trace_path.exists());
        assert_eq!(result.outcome.trace.len(), 1);
        std::fs::remove_file(&path).unwrap();
        std::fs::remove_file(&result.trace_path).unwrap();
    }

    #[test]
    fn run_with_fixtures_executes_the_end_to_end_filter_scenario() {
        let source_path = write_temp(
            "Open workbook \"data.xlsx\".\n\
             In sheet \"Data\", treat range A1C4 as table T.\n\
             Filter T where T.Balance > 0.\n",
            "s4.sentra",
        );
        let fixtures_path = write_temp(
            r#"{"data.xlsx": {"Data": [["Amount","Balance","Name"],[100,50,"Alice"],[200,0,"Bob"],[300,75.5,"Carol"]]}}"#,
            "s4.fixtures.json",
        );
        let result = cmd_run(&source_path, None, false, None, Some(&fixtures_path)).unwrap();
        let filtered = result.outcome.env.get("T").unwrap();
        assert!(matches!(filtered, sentra_core::Value::Table(rows) if rows.len() == 2));
        std::fs::remove_file(&source_path).unwrap();
        std::fs::remove_file(&fixtures_path).unwrap();
        std::fs::remove_file(&result.trace_path).unwrap();
    }
}
