//! Avail VM: the interpreter, fiber scheduler, primitive registry, and
//! module loader that together execute Level One compiled code (spec.md §1,
//! §4.4, §4.5, §5).
//!
//! # Why two globals maps on `Fiber`
//!
//! spec.md's GLOSSARY distinguishes a fiber's "heritable" globals (copied
//! into a forked child) from its ordinary ones (private to the fiber that
//! set them). The original implementation keeps one map and tags each entry
//! with a heritability bit; this core re-implementation keeps two maps
//! instead, trading a denser representation for a fork operation that is a
//! single `HashMap::clone` with no per-entry filtering (see DESIGN.md).
//!
//! # Modules
//!
//! - `error`: tiers 2 and 3 of the error model (tier 1 lives in `avail-core`)
//! - `fiber`: lifecycle state machine, trace flags, globals, join handles
//! - `registry`: the module loader stand-in resolving sends to methods
//! - `primitive`: the numbered primitive table and the built-in set
//! - `interpreter`: the L1 execution loop, sends, and reification
//! - `scheduler`: the priority fiber scheduler and worker pool
//! - `diagnostics`: SIGQUIT dump (behind the `diagnostics` feature)
//! - `watchdog`: stuck-fiber detection thread

pub mod diagnostics;
pub mod error;
pub mod fiber;
pub mod interpreter;
pub mod primitive;
pub mod registry;
pub mod scheduler;
pub mod watchdog;

pub use error::{FiberFailure, PrimitiveFailure};
pub use fiber::{Fiber, FiberJoinHandle, FiberOutcome, FiberState, TraceFlags};
pub use interpreter::{Interpreter, InterpreterError};
pub use primitive::{Outcome, PrimitiveFn, PrimitiveRegistry};
pub use registry::ModuleLoader;
pub use scheduler::Scheduler;
