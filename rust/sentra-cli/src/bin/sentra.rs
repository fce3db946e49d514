//! The `sentra` binary: a thin `clap` front end over `sentra_cli` (§6 "CLI
//! surface").

use clap::{Parser, Subcommand};
use sentra_cli::SentraError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sentra", version, about = "Compiler and interpreter for the Sentra controlled natural language")]
struct Cli {
    /// Overrides the keyword configuration resource (default: built-in set)
    #[arg(long, global = true)]
    keywords: Option<PathBuf>,

    /// Raises the tracing filter level; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a source file and print its statement count
    Parse { file: PathBuf },
    /// Parse and check a source file
    Check { file: PathBuf },
    /// Parse, check, and lower a source file to IR JSON
    Lower { file: PathBuf },
    /// Run a source file end to end
    Run {
        file: PathBuf,
        /// Trace every step without dispatching to the tool registry
        #[arg(long)]
        dry_run: bool,
        /// Directory to write the `.trace.jsonl` file under
        #[arg(long)]
        trace_dir: Option<PathBuf>,
        /// JSON fixture file seeding in-memory workbook content
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// Print each IR step's op and args in human form
    Explain { file: PathBuf },
    /// Print a previously recorded trace file
    Trace {
        file: PathBuf,
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    sentra_cli::init_tracing(cli.verbose);

    let result = run(cli);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "sentra failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SentraError> {
    let keywords = cli.keywords.as_deref();
    match cli.command {
        Commands::Parse { file } => {
            let count = sentra_cli::cmd_parse(&file, keywords)?;
            println!("{count} statements");
        }
        Commands::Check { file } => {
            sentra_cli::cmd_check(&file, keywords)?;
            println!("OK");
        }
        Commands::Lower { file } => {
            let ir = sentra_cli::cmd_lower(&file, keywords)?;
            println!("{}", serde_json::to_string_pretty(&ir)?);
        }
        Commands::Run { file, dry_run, trace_dir, fixtures } => {
            let result = sentra_cli::cmd_run(&file, keywords, dry_run, trace_dir.as_deref(), fixtures.as_deref())?;
            println!("completed {} steps, trace written to {}", result.outcome.trace.len(), result.trace_path.display());
        }
        Commands::Explain { file } => {
            for line in sentra_cli::cmd_explain(&file, keywords)? {
                println!("{line}");
            }
        }
        Commands::Trace { file, trace_dir } => {
            for record in sentra_cli::cmd_trace(&file, trace_dir.as_deref())? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    Ok(())
}
