//! `spa` — static program analyzer driver.
//!
//! Two-argument invocation: a SIMPLE source file and a query file (one PQL
//! query per line). Parse and extraction failures abort with a nonzero exit
//! status and a message on stderr; a single query failing during evaluation
//! prints its error to stdout and the remaining queries still run.

use clap::Parser;
use simple_spa::analyzer::Analyzer;
use simple_spa::config::Config;
use simple_spa::planner::QueryResult;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "spa")]
#[command(about = "Static program analyzer for the SIMPLE language", long_about = None)]
struct Cli {
    /// Path to a SIMPLE source file.
    source: PathBuf,
    /// Path to a file of PQL queries, one per line.
    queries: PathBuf,
}

fn format_result(result: &QueryResult) -> Vec<String> {
    match result {
        QueryResult::Boolean(true) => vec!["TRUE".to_string()],
        QueryResult::Boolean(false) => vec!["FALSE".to_string()],
        QueryResult::Rows { rows, .. } if rows.is_empty() => vec!["none".to_string()],
        QueryResult::Rows { rows, .. } => rows.iter().map(|r| r.join(" ")).collect(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_default();
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let source = match std::fs::read_to_string(&cli.source) {
        Ok(text) => text,
        Err(err) => {
            error!(path = %cli.source.display(), %err, "failed to read source file");
            eprintln!("error reading {}: {err}", cli.source.display());
            return ExitCode::FAILURE;
        }
    };

    let analyzer = match Analyzer::build(&source, config.tokenizer.into()) {
        Ok(analyzer) => analyzer,
        Err(err) => {
            error!(%err, "phase 1/2 failed");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let query_text = match std::fs::read_to_string(&cli.queries) {
        Ok(text) => text,
        Err(err) => {
            error!(path = %cli.queries.display(), %err, "failed to read query file");
            eprintln!("error reading {}: {err}", cli.queries.display());
            return ExitCode::FAILURE;
        }
    };

    for line in query_text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match analyzer.query(line) {
            Ok(result) => {
                for out_line in format_result(&result) {
                    println!("{out_line}");
                }
            }
            Err(err) => {
                println!("{err}");
            }
        }
    }

    ExitCode::SUCCESS
}
