//! `availr`: a CLI harness exercising the interpreter, dispatch engine, and
//! fiber scheduler end to end.
//!
//! This is not a compiler front end. `spec.md` places the lexer, parser,
//! message-splitter, and macro-expander out of scope, so there is no Avail
//! source text to read here — `crate::programs` builds Level One code
//! directly with the same builder API `avail-vm`'s own tests use. This
//! binary exists only to give the workspace something runnable.

mod error;
mod programs;

use avail_vm::{FiberOutcome, Scheduler};
use clap::{Parser, Subcommand};
use error::ReplError;
use programs::Environment;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "availr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run demo Avail VM programs, or drop into an interactive loop")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Priority (0-255) the demo program's fiber runs at.
    #[arg(long, global = true, default_value_t = 128)]
    priority: u8,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// a + b
    Add { a: i64, b: i64 },
    /// a - b
    Sub { a: i64, b: i64 },
    /// a = b, as 1 or 0
    Eq { a: i64, b: i64 },
    /// The size of a tuple built from the given values
    TupleSize { values: Vec<i64> },
    /// The 1-indexed `index`th element of a tuple built from the given values
    TupleAt { index: i64, values: Vec<i64> },
    /// Interactive loop: enter any of the above commands by name
    Repl,
    /// Dump scheduler and fiber registry state to stderr
    Diagnostics,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let environment = Environment::install();
    let scheduler = Scheduler::new(Arc::new(environment.loader), Arc::new(environment.primitives));

    let result = match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => run_repl(&scheduler, cli.priority),
        Command::Diagnostics => {
            avail_vm::diagnostics::dump_diagnostics();
            Ok(())
        }
        command => run_once(&scheduler, command, cli.priority).map(|outcome| print_outcome(&outcome)),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_once(scheduler: &Scheduler, command: Command, priority: u8) -> Result<FiberOutcome, ReplError> {
    let function = match command {
        Command::Add { a, b } => programs::add(a, b),
        Command::Sub { a, b } => programs::sub(a, b),
        Command::Eq { a, b } => programs::eq(a, b),
        Command::TupleSize { values } => programs::tuple_size(&values),
        Command::TupleAt { index, values } => programs::tuple_at(index, &values)?,
        Command::Diagnostics => {
            avail_vm::diagnostics::dump_diagnostics();
            return Err(ReplError::Logic(":diagnostics has no result to print".to_string()));
        }
        Command::Repl => {
            return Err(ReplError::Logic("not a runnable program".to_string()));
        }
    };
    let handle = scheduler.spawn(function, vec![], priority);
    Ok(handle.join())
}

fn print_outcome(outcome: &FiberOutcome) {
    match outcome {
        FiberOutcome::Succeeded(value) => println!("=> {value:?}"),
        FiberOutcome::Failed(failure) => eprintln!("fiber failed: {failure}"),
    }
}

fn run_repl(scheduler: &Scheduler, priority: u8) -> Result<(), ReplError> {
    let mut editor = DefaultEditor::new()?;
    let history_path = dirs_home_history_path();
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    println!("availr — type a command (add/sub/eq/tuple-size/tuple-at), :diagnostics, or :quit");
    loop {
        match editor.readline("avail> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();
                if line == ":quit" || line == ":q" {
                    break;
                }
                if line == ":diagnostics" {
                    avail_vm::diagnostics::dump_diagnostics();
                    continue;
                }
                match parse_and_run(scheduler, line, priority) {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(err) => eprintln!("error: {err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    Ok(())
}

/// Parse a REPL line as `<command> <args...>` and run it. Reuses the same
/// `Command` enum the top-level CLI parses, via clap's argv-style parser,
/// so the two entry points never drift out of sync.
fn parse_and_run(scheduler: &Scheduler, line: &str, priority: u8) -> Result<FiberOutcome, ReplError> {
    let mut argv = vec!["availr".to_string()];
    argv.extend(line.split_whitespace().map(str::to_string));
    let cli = Cli::try_parse_from(argv).map_err(|e| ReplError::Logic(e.to_string()))?;
    let command = cli
        .command
        .ok_or_else(|| ReplError::Logic("expected a command".to_string()))?;
    run_once(scheduler, command, priority)
}

fn dirs_home_history_path() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(|home| std::path::PathBuf::from(home).join(".availr_history"))
}
