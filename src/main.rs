#[macro_use]
mod errors;
mod repl;
mod sql;
mod storage;

use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "minidb",
    version = VERSION,
    about = "Single-file relational store."
)]
struct Cli {
    /// Path to the database file. Created on first open.
    file: Option<PathBuf>,
    /// Path of the log file.
    #[arg(long, env = "MINIDB_LOG", default_value = "minidb.log")]
    log: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stdout belongs to the shell protocol; logs go to a file.
    if let Ok(file) = OpenOptions::new().append(true).create(true).open(&cli.log) {
        tracing_subscriber::fmt()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let path = match cli.file {
        Some(path) => path,
        None => {
            println!("Must supply a database filename.");
            return ExitCode::from(1);
        }
    };

    match repl::start(&path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}
