//! `Value`: the single tagged union every other object-model type and every
//! VM register ultimately holds (spec.md §2, §3).
//!
//! Cloning a `Value` is `Arc`-cheap for every composite variant; `Integer`
//! and `Float` are copied by value, the same trade the teacher's runtime
//! makes for its own `Value::Int`/`Value::Float` cases.

use crate::atom::Atom;
use crate::compiled_code::CompiledCode;
use crate::continuation::Continuation;
use crate::function::Function;
use crate::map::AvailMap;
use crate::mutability::Mutability;
use crate::set::AvailSet;
use crate::tuple::Tuple;
use crate::types::{AvailType, IntegerRange};
use crate::variable::Variable;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    /// Compared and hashed by bit pattern (`to_bits`), not IEEE equality —
    /// the same structural-equality trade the teacher makes for its map
    /// keys, extended here to `Eq`/`Hash` on `Value` itself so it can be
    /// used as a HAMT key without a NaN-poisons-everything footgun.
    Float(f64),
    Atom(Atom),
    Tuple(Tuple),
    Set(AvailSet),
    Map(AvailMap),
    Variable(Variable),
    Function(Function),
    CompiledCode(CompiledCode),
    Continuation(Continuation),
}

impl Value {
    pub fn kind(&self) -> AvailType {
        match self {
            Value::Integer(n) => AvailType::Integer(IntegerRange::exactly(*n)),
            Value::Float(_) => AvailType::Float,
            Value::Atom(_) => AvailType::Atom,
            Value::Tuple(t) => t.kind(),
            Value::Set(s) => s.kind(),
            Value::Map(m) => m.kind(),
            Value::Variable(v) => AvailType::Variable(Box::new(v.content_type().clone())),
            Value::Function(f) => f.kind(),
            Value::CompiledCode(_) => AvailType::CompiledCode,
            Value::Continuation(_) => AvailType::Continuation,
        }
    }

    pub fn mutability(&self) -> Mutability {
        match self {
            Value::Integer(_) | Value::Float(_) | Value::Atom(_) => Mutability::Shared,
            Value::Tuple(t) => t.mutability(),
            Value::Set(s) => s.mutability(),
            Value::Map(m) => m.mutability(),
            Value::Variable(v) => v.mutability(),
            // Functions, compiled code, and continuations are treated as
            // immutable data once built; this crate never mutates them
            // after construction, so they report `Shared` unconditionally.
            Value::Function(_) | Value::CompiledCode(_) | Value::Continuation(_) => Mutability::Shared,
        }
    }

    /// Transition this value (and, for composites, everything it directly
    /// contains) from `Mutable` to `Immutable`. A no-op for already
    /// `Immutable`/`Shared` values and for the always-`Shared` scalar kinds.
    pub fn make_immutable(&self) -> Mutability {
        match self {
            Value::Tuple(t) => t.make_immutable(),
            Value::Set(s) => s.make_immutable(),
            Value::Map(m) => m.make_immutable(),
            Value::Variable(v) => v.make_immutable(),
            _ => self.mutability(),
        }
    }

    /// Transition this value to `Shared`, the final, cross-fiber-safe point
    /// in the mutability lattice (spec.md §5).
    pub fn make_shared(&self) -> Mutability {
        match self {
            Value::Tuple(t) => t.make_shared(),
            Value::Set(s) => s.make_shared(),
            Value::Map(m) => m.make_shared(),
            Value::Variable(v) => v.make_shared(),
            _ => self.mutability(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Variable(a), Value::Variable(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::CompiledCode(a), Value::CompiledCode(b)) => a == b,
            (Value::Continuation(a), Value::Continuation(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Integer(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Atom(a) => a.hash(state),
            Value::Tuple(t) => t.hash(state),
            Value::Set(s) => s.hash(state),
            Value::Map(m) => m.hash(state),
            Value::Variable(v) => v.hash(state),
            Value::Function(f) => f.hash(state),
            Value::CompiledCode(c) => c.hash(state),
            Value::Continuation(c) => c.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_nan_is_hashable_and_self_equal() {
        let a = Value::Float(f64::NAN);
        let b = Value::Float(f64::NAN);
        assert_eq!(a, b);
    }

    #[test]
    fn integer_kind_is_exact_range() {
        let v = Value::Integer(7);
        assert_eq!(v.kind(), AvailType::Integer(IntegerRange::exactly(7)));
    }

    #[test]
    fn scalars_are_always_shared() {
        assert_eq!(Value::Integer(1).mutability(), Mutability::Shared);
        assert_eq!(Value::Atom(Atom::new("x")).mutability(), Mutability::Shared);
    }
}
