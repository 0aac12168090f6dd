//! Variables: mutable cells with a declared content type and a set of
//! write reactors invoked on each committed write (spec.md §3, §5).
//!
//! A `Variable` is always reached through `Arc`, so promoting it to
//! `Shared` and then reading/writing it from another fiber is safe: writes
//! are serialized by an internal lock and are therefore linearizable per
//! variable (spec.md §5 invariant O3).

use crate::atom::Atom;
use crate::function::Function;
use crate::mutability::{Mutability, MutabilityCell};
use crate::types::AvailType;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableAccessError {
    /// The value being written is not an instance of the variable's
    /// declared content type.
    TypeMismatch,
    /// The variable has never been assigned.
    Unassigned,
}

struct VariableInner {
    content_type: AvailType,
    value: RwLock<Option<Value>>,
    mutability: MutabilityCell,
    write_reactors: RwLock<HashMap<Atom, Function>>,
}

/// A mutable cell holding at most one value of a declared type.
#[derive(Clone)]
pub struct Variable(Arc<VariableInner>);

impl Variable {
    pub fn new(content_type: AvailType) -> Self {
        Variable(Arc::new(VariableInner {
            content_type,
            value: RwLock::new(None),
            mutability: MutabilityCell::new(),
            write_reactors: RwLock::new(HashMap::new()),
        }))
    }

    pub fn content_type(&self) -> &AvailType {
        &self.0.content_type
    }

    pub fn get(&self) -> Result<Value, VariableAccessError> {
        self.0
            .value
            .read()
            .unwrap()
            .clone()
            .ok_or(VariableAccessError::Unassigned)
    }

    /// Write `value`, returning the write reactors that must now be
    /// invoked (the interpreter, not this crate, runs them — `avail-core`
    /// has no notion of invocation).
    pub fn set(&self, value: Value) -> Result<Vec<Function>, VariableAccessError> {
        if !self.0.content_type.accepts(&value) {
            return Err(VariableAccessError::TypeMismatch);
        }
        *self.0.value.write().unwrap() = Some(value);
        Ok(self.0.write_reactors.read().unwrap().values().cloned().collect())
    }

    /// Atomically swap in a new value and return the old one, for
    /// `get_and_set_atomic`-style primitives (spec.md §5, O2/O3).
    pub fn get_and_set(&self, value: Value) -> Result<(Option<Value>, Vec<Function>), VariableAccessError> {
        if !self.0.content_type.accepts(&value) {
            return Err(VariableAccessError::TypeMismatch);
        }
        let mut slot = self.0.value.write().unwrap();
        let old = slot.replace(value);
        drop(slot);
        Ok((old, self.0.write_reactors.read().unwrap().values().cloned().collect()))
    }

    pub fn add_write_reactor(&self, key: Atom, reactor: Function) {
        self.0.write_reactors.write().unwrap().insert(key, reactor);
    }

    pub fn remove_write_reactor(&self, key: &Atom) {
        self.0.write_reactors.write().unwrap().remove(key);
    }

    pub fn mutability(&self) -> Mutability {
        self.0.mutability.get()
    }

    pub fn make_immutable(&self) -> Mutability {
        self.0.mutability.make_immutable()
    }

    pub fn make_shared(&self) -> Mutability {
        self.0.mutability.make_shared()
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Variable({})", self.0.content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntegerRange;

    #[test]
    fn type_guard_rejects_wrong_kind() {
        let v = Variable::new(AvailType::Integer(IntegerRange::ALL));
        assert_eq!(v.set(Value::Float(1.0)), Err(VariableAccessError::TypeMismatch));
        assert!(v.set(Value::Integer(5)).is_ok());
        assert_eq!(v.get(), Ok(Value::Integer(5)));
    }

    #[test]
    fn unassigned_read_fails() {
        let v = Variable::new(AvailType::Top);
        assert_eq!(v.get(), Err(VariableAccessError::Unassigned));
    }
}
