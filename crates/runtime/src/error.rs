//! Tier 2 and tier 3 of the three-tier error model (spec.md §7; tier 1,
//! `avail_core::GeneratorError`, lives in `avail-core`).

use avail_core::{Continuation, ErrorCode, Value};
use std::fmt;

/// Tier 2: a primitive failed, pushing a reason code into its failure
/// variable rather than succeeding (spec.md §7, §4.4). The interpreter
/// continues by running the backing L1 body so the language itself can
/// handle the failure; `PrimitiveFailure` is how that reason code travels
/// from `crate::primitive` back into `crate::interpreter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveFailure {
    pub primitive: avail_core::PrimitiveNumber,
    pub code: ErrorCode,
}

impl fmt::Display for PrimitiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "primitive {} failed: {}", self.primitive, self.code)
    }
}

impl std::error::Error for PrimitiveFailure {}

/// Tier 3: an uncaught exception that propagated all the way to a fiber's
/// outermost frame (spec.md §7). The fiber transitions to `aborted` and
/// this is what its failure continuation receives.
#[derive(Debug, Clone)]
pub struct FiberFailure {
    pub reason: Value,
    /// The continuation active when the failure escaped, retained for
    /// diagnostics (SIGQUIT dumps print it).
    pub at: Option<Continuation>,
}

impl FiberFailure {
    pub fn new(reason: Value, at: Option<Continuation>) -> Self {
        FiberFailure { reason, at }
    }
}

impl fmt::Display for FiberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uncaught fiber failure: {:?}", self.reason)
    }
}

impl std::error::Error for FiberFailure {}
