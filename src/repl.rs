//! The REPL (Read-Eval-Print-Loop) module.
//!
//! One line is read, one statement runs to completion, and the prompt
//! comes back. Reported errors print a line and continue; storage-layer
//! errors propagate to `main`, which treats them as fatal. Stdout carries
//! only the shell protocol; diagnostics go to the log.

use crate::errors::Error;
use crate::sql;
use crate::sql::statement::Statement;
use crate::storage::table::Table;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, PartialEq)]
enum MetaCommandResult {
    Success,
    Exit,
    UnrecognizedCommand,
}

/// Runs the interactive shell against the database at `path` until
/// `.exit` or end of input.
pub fn start(path: &Path) -> Result<(), Error> {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, path = %path.display(), "Starting REPL session...");

    let mut table = Table::open(path)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("db > ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // End of input: leave silently. Only `.exit` flushes.
            info!(session_id = %session_id, "End of input.");
            return Ok(());
        }
        let input = line.strip_suffix('\n').unwrap_or(&line);
        let input = input.strip_suffix('\r').unwrap_or(input);

        if input.starts_with('.') {
            match do_meta_command(input, &mut table)? {
                MetaCommandResult::Success => continue,
                MetaCommandResult::Exit => {
                    table.close()?;
                    info!(session_id = %session_id, "Session closed.");
                    return Ok(());
                }
                MetaCommandResult::UnrecognizedCommand => {
                    println!("Unrecognized command '{}'", input);
                    continue;
                }
            }
        }

        let statement = match sql::parser::prepare(input) {
            Ok(statement) => statement,
            Err(e) if e.is_reported() => {
                println!("{}", e);
                continue;
            }
            Err(e) => return Err(e),
        };

        match execute_statement(&mut table, statement) {
            Ok(()) => {}
            Err(e) if e.is_reported() => println!("Error: {}", e),
            Err(e) => return Err(e),
        }
    }
}

fn do_meta_command(input: &str, table: &mut Table) -> Result<MetaCommandResult, Error> {
    match input {
        ".exit" => Ok(MetaCommandResult::Exit),
        ".btree" => {
            println!("Tree:");
            print!("{}", table.btree_to_string()?);
            Ok(MetaCommandResult::Success)
        }
        ".constants" => {
            println!("Constants:");
            print!("{}", table.constants_to_string());
            Ok(MetaCommandResult::Success)
        }
        _ => Ok(MetaCommandResult::UnrecognizedCommand),
    }
}

fn execute_statement(table: &mut Table, statement: Statement) -> Result<(), Error> {
    match statement {
        Statement::Insert(row) => {
            table.insert(&row)?;
        }
        Statement::Select => {
            for row in table.select()? {
                println!("{}", row);
            }
        }
    }
    println!("Executed.");
    Ok(())
}
