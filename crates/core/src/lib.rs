//! Avail Core: the object model shared by every other crate in this workspace.
//!
//! This crate provides the language-level values the Avail virtual machine
//! operates on: tagged values, tuples, sets, maps, atoms, variables,
//! functions, compiled code, and continuations, plus the
//! mutable/immutable/shared lifecycle that governs how they may be touched.
//!
//! # Modules
//!
//! - `mutability`: the three-point mutability lattice and its atomic tag
//! - `error`: interpreter-visible error codes and the generator's own
//!   fatal-assertion error type
//! - `types`: the type lattice used by the dispatch engine and by L1/L2
//!   type propagation
//! - `atom`: nominal identity values
//! - `variable`: mutable cells with write reactors
//! - `tuple`, `hamt`, `set`, `map`: the composite collections
//! - `compiled_code`: the in-memory compiled-code record (§6)
//! - `function`: a compiled-code paired with captured outer values
//! - `continuation`: first-class activation records
//! - `value`: the `Value` enum tying all of the above together

pub mod atom;
pub mod compiled_code;
pub mod continuation;
pub mod error;
pub mod function;
pub mod hamt;
pub mod map;
pub mod mutability;
pub mod set;
pub mod tuple;
pub mod types;
pub mod value;
pub mod variable;

pub use atom::Atom;
pub use compiled_code::{CompiledCode, FinalUse, PrimitiveFlags, PrimitiveNumber, SlotClass, SlotKind};
pub use continuation::Continuation;
pub use error::{ErrorCode, GeneratorError};
pub use function::Function;
pub use map::AvailMap;
pub use mutability::{Mutability, MutabilityCell};
pub use set::AvailSet;
pub use tuple::{Tuple, TupleRepr};
pub use types::{AvailType, FunctionType, IntegerRange, TupleType};
pub use value::Value;
pub use variable::Variable;
