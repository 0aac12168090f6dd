//! Interpreter-visible error codes (spec.md §6) and the generator's own
//! fatal-assertion error type (spec.md §4.1, §7 tier 1).
//!
//! Following the teacher's `codegen::error::CodeGenError` shape rather than
//! reaching for `thiserror`: a small hand-rolled enum that implements
//! `std::error::Error` and converts cleanly with `?`.

use std::fmt;

/// Stable, numbered, interpreter-visible error codes (spec.md §6).
///
/// These are the codes a failing primitive pushes into its failure
/// variable (tier 2 in spec.md §7) and the codes `avail-dispatch` raises
/// on a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    IncorrectArgumentType = 1,
    IncorrectNumberOfArguments = 2,
    NoMethod = 3,
    NoMethodDefinition = 4,
    AmbiguousMethodDefinition = 5,
    CannotCreateContinuationForInfalliblePrimitiveFunction = 6,
    LoadingIsOver = 7,
    SpecialAtom = 8,
    FiberIsTerminated = 9,
    JavaFieldNotAvailable = 10,
    IoError = 11,
    PermissionDenied = 12,
    NoFile = 13,
    FileExists = 14,
    InvalidPath = 15,
    InvalidHandle = 16,
    SerializationFailed = 17,
    CannotConvertNotANumberToInteger = 18,
    SubscriptOutOfBounds = 19,
    TypeRestrictionMustAcceptOnlyTypes = 20,
}

impl ErrorCode {
    /// The symbolic name, stable across releases (spec.md §6 calls these
    /// names out explicitly as part of the interpreter-visible surface).
    pub fn symbolic_name(self) -> &'static str {
        match self {
            ErrorCode::IncorrectArgumentType => "incorrect-argument-type",
            ErrorCode::IncorrectNumberOfArguments => "incorrect-number-of-arguments",
            ErrorCode::NoMethod => "no-method",
            ErrorCode::NoMethodDefinition => "no-method-definition",
            ErrorCode::AmbiguousMethodDefinition => "ambiguous-method-definition",
            ErrorCode::CannotCreateContinuationForInfalliblePrimitiveFunction => {
                "cannot-create-continuation-for-infallible-primitive-function"
            }
            ErrorCode::LoadingIsOver => "loading-is-over",
            ErrorCode::SpecialAtom => "special-atom",
            ErrorCode::FiberIsTerminated => "fiber-is-terminated",
            ErrorCode::JavaFieldNotAvailable => "java-field-not-available",
            ErrorCode::IoError => "io-error",
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::NoFile => "no-file",
            ErrorCode::FileExists => "file-exists",
            ErrorCode::InvalidPath => "invalid-path",
            ErrorCode::InvalidHandle => "invalid-handle",
            ErrorCode::SerializationFailed => "serialization-failed",
            ErrorCode::CannotConvertNotANumberToInteger => {
                "cannot-convert-not-a-number-to-integer"
            }
            ErrorCode::SubscriptOutOfBounds => "subscript-out-of-bounds",
            ErrorCode::TypeRestrictionMustAcceptOnlyTypes => {
                "type-restriction-must-accept-only-types"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbolic_name())
    }
}

/// A tier-1 error (spec.md §7): a contract violation by the *producer* of
/// compiled code (stack depth mismatch, unknown variable, label not first).
/// These are fatal assertions, never silently corrected.
#[derive(Debug)]
pub enum GeneratorError {
    /// The statically-tracked operand-stack depth went negative or failed
    /// to match at a join point (spec.md invariant I3).
    StackUnderflow { at_instruction: usize },
    /// A `get`/`set`/`push` referenced a local, outer, or literal slot that
    /// does not exist in the block being generated.
    UnknownVariable { index: usize, kind: &'static str },
    /// A label declaration appeared somewhere other than the first
    /// statement of its block (spec.md invariant I4).
    LabelNotFirst,
    /// An attempt to `set` a label, which has no backing storage to write.
    CannotSetLabel,
    /// A literal failed to intern into a compiled-code record's literal
    /// pool (spec.md invariant I5), which should be structurally
    /// impossible via the public `LiteralPool` API.
    LiteralPoolCorrupt,
    /// A primitive failed with an `ErrorCode` outside the set it declared
    /// at registration time. The original Avail implementation validates a
    /// primitive's failure reason against its declared failure-variable
    /// type; a mismatch here means the primitive itself is buggy, not the
    /// calling code, so it is a fatal contract violation rather than a
    /// tier-2 failure the language can catch.
    UndeclaredPrimitiveFailure {
        primitive: crate::compiled_code::PrimitiveNumber,
        code: ErrorCode,
    },
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::StackUnderflow { at_instruction } => {
                write!(f, "operand stack underflow at instruction {at_instruction}")
            }
            GeneratorError::UnknownVariable { index, kind } => {
                write!(f, "unknown {kind} variable at index {index}")
            }
            GeneratorError::LabelNotFirst => {
                write!(f, "label declaration must be the first statement in its block")
            }
            GeneratorError::CannotSetLabel => write!(f, "cannot set a label binding"),
            GeneratorError::LiteralPoolCorrupt => {
                write!(f, "literal pool invariant violated: duplicate interned literal")
            }
            GeneratorError::UndeclaredPrimitiveFailure { primitive, code } => {
                write!(f, "primitive {primitive} failed with undeclared error code {code}")
            }
        }
    }
}

impl std::error::Error for GeneratorError {}
