//! This crate's error type, following the teacher's
//! `codegen::error::CodeGenError` shape: a `Logic(String)` variant for
//! errors raised by this crate itself, plus one variant per wrapped source
//! error, rather than reaching for `thiserror`/`anyhow`.

#[derive(Debug)]
pub enum ReplError {
    /// A program name or argument count this harness doesn't recognize.
    Logic(String),
    /// The fiber that ran the requested program failed.
    FiberFailed(avail_vm::FiberFailure),
    Readline(rustyline::error::ReadlineError),
}

impl std::fmt::Display for ReplError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplError::Logic(s) => write!(f, "{s}"),
            ReplError::FiberFailed(failure) => write!(f, "{failure}"),
            ReplError::Readline(e) => write!(f, "line editor error: {e}"),
        }
    }
}

impl std::error::Error for ReplError {}

impl From<String> for ReplError {
    fn from(s: String) -> Self {
        ReplError::Logic(s)
    }
}

impl From<avail_vm::FiberFailure> for ReplError {
    fn from(e: avail_vm::FiberFailure) -> Self {
        ReplError::FiberFailed(e)
    }
}

impl From<rustyline::error::ReadlineError> for ReplError {
    fn from(e: rustyline::error::ReadlineError) -> Self {
        ReplError::Readline(e)
    }
}
