//! Dispatch-engine error conditions (spec.md §4.3, §6).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No definition's argument-tuple type admits the given arguments.
    NoMethodDefinition,
    /// More than one maximally-specific definition admits the given
    /// arguments; the caller must disambiguate.
    AmbiguousMethodDefinition,
    /// `Method::add_definition` was asked to add a definition whose
    /// argument-tuple type exactly matches one already present.
    DuplicateSignature,
    /// The argument tuple's arity does not match the method's declared
    /// arity.
    IncorrectNumberOfArguments,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoMethodDefinition => write!(f, "no-method-definition"),
            DispatchError::AmbiguousMethodDefinition => write!(f, "ambiguous-method-definition"),
            DispatchError::DuplicateSignature => {
                write!(f, "a definition with this argument-tuple type already exists")
            }
            DispatchError::IncorrectNumberOfArguments => write!(f, "incorrect-number-of-arguments"),
        }
    }
}

impl std::error::Error for DispatchError {}
