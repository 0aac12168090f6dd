//! Tuples: ordered sequences with specialized byte/nybble/int/object
//! representations (spec.md §3).
//!
//! Mutation-in-place follows the mutable/immutable/shared lifecycle: a
//! destructive operation (`canDestroy = true`) may reuse the backing
//! storage only when the tuple is still `Mutable` and this is the only
//! live reference (`Arc::get_mut`), exactly mirroring the check the
//! teacher's inline `dup`/`drop` codegen makes before choosing a fast path
//! versus a cloning one.

use crate::mutability::{Mutability, MutabilityCell};
use crate::types::{AvailType, IntegerRange, TupleType};
use crate::value::Value;
use std::sync::Arc;

/// The specialized backing storage for a tuple's elements.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleRepr {
    Object(Vec<Value>),
    /// Packed as one byte per element (each in 0..=255); a real Avail VM
    /// bit-packs nybble tuples tighter still, which this core
    /// re-implementation does not — see DESIGN.md.
    Byte(Vec<u8>),
    Nybble(Vec<u8>),
    Int(Vec<i64>),
}

impl TupleRepr {
    fn len(&self) -> usize {
        match self {
            TupleRepr::Object(v) => v.len(),
            TupleRepr::Byte(v) => v.len(),
            TupleRepr::Nybble(v) => v.len(),
            TupleRepr::Int(v) => v.len(),
        }
    }

    fn get(&self, index: usize) -> Option<Value> {
        match self {
            TupleRepr::Object(v) => v.get(index).cloned(),
            TupleRepr::Byte(v) => v.get(index).map(|b| Value::Integer(*b as i64)),
            TupleRepr::Nybble(v) => v.get(index).map(|n| Value::Integer(*n as i64)),
            TupleRepr::Int(v) => v.get(index).map(|i| Value::Integer(*i)),
        }
    }

    fn element_type(&self) -> AvailType {
        match self {
            TupleRepr::Object(v) => v
                .iter()
                .map(Value::kind)
                .fold(AvailType::Bottom, |acc, t| acc.join(&t)),
            TupleRepr::Byte(_) => AvailType::Integer(IntegerRange { min: 0, max: 255 }),
            TupleRepr::Nybble(_) => AvailType::Integer(IntegerRange { min: 0, max: 15 }),
            TupleRepr::Int(_) => AvailType::Integer(IntegerRange::ALL),
        }
    }

    fn to_vec(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i).unwrap()).collect()
    }
}

struct TupleInner {
    mutability: MutabilityCell,
    repr: TupleRepr,
}

/// An ordered, possibly-specialized sequence of values.
#[derive(Clone)]
pub struct Tuple(Arc<TupleInner>);

impl Tuple {
    pub fn from_values(values: Vec<Value>) -> Self {
        Tuple(Arc::new(TupleInner {
            mutability: MutabilityCell::new(),
            repr: TupleRepr::Object(values),
        }))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Tuple(Arc::new(TupleInner {
            mutability: MutabilityCell::new(),
            repr: TupleRepr::Byte(bytes),
        }))
    }

    pub fn from_nybbles(nybbles: Vec<u8>) -> Self {
        debug_assert!(nybbles.iter().all(|n| *n < 16));
        Tuple(Arc::new(TupleInner {
            mutability: MutabilityCell::new(),
            repr: TupleRepr::Nybble(nybbles),
        }))
    }

    pub fn from_ints(ints: Vec<i64>) -> Self {
        Tuple(Arc::new(TupleInner {
            mutability: MutabilityCell::new(),
            repr: TupleRepr::Int(ints),
        }))
    }

    pub fn empty() -> Self {
        Tuple::from_values(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.repr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based element access (Avail's surface language is 1-based;
    /// that convention belongs to the out-of-scope front end).
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.repr.get(index)
    }

    pub fn as_vec(&self) -> Vec<Value> {
        self.0.repr.to_vec()
    }

    pub fn kind(&self) -> AvailType {
        AvailType::Tuple(TupleType {
            element_type: Box::new(self.0.repr.element_type()),
            size_range: IntegerRange::exactly(self.len() as i64),
        })
    }

    pub fn mutability(&self) -> Mutability {
        self.0.mutability.get()
    }

    pub fn make_immutable(&self) -> Mutability {
        if let TupleRepr::Object(values) = &self.0.repr {
            for v in values {
                v.make_immutable();
            }
        }
        self.0.mutability.make_immutable()
    }

    pub fn make_shared(&self) -> Mutability {
        if let TupleRepr::Object(values) = &self.0.repr {
            for v in values {
                v.make_shared();
            }
        }
        self.0.mutability.make_shared()
    }

    /// Append one value. When `can_destroy` is set and this tuple is the
    /// sole owner of a `Mutable` backing store, the append happens in
    /// place (via `Arc::get_mut`); otherwise a fresh tuple is produced.
    pub fn append(&mut self, value: Value, can_destroy: bool) -> Tuple {
        if can_destroy && self.mutability() == Mutability::Mutable {
            if let Some(inner) = Arc::get_mut(&mut self.0) {
                match &mut inner.repr {
                    TupleRepr::Object(v) => {
                        v.push(value);
                        return self.clone();
                    }
                    TupleRepr::Int(v) => {
                        if let Value::Integer(i) = value {
                            v.push(i);
                            return self.clone();
                        }
                    }
                    _ => {}
                }
            }
        }
        let mut values = self.as_vec();
        values.push(value);
        Tuple::from_values(values)
    }

    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut values = self.as_vec();
        values.extend(other.as_vec());
        Tuple::from_values(values)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.as_vec() == other.as_vec()
    }
}
impl Eq for Tuple {}

impl std::hash::Hash for Tuple {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for v in self.as_vec() {
            v.hash(state);
        }
    }
}

impl std::fmt::Debug for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_size_scenario() {
        // spec.md §8 scenario 1: <10,20,30> has size 3.
        let t = Tuple::from_values(vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)]);
        assert_eq!(t.len(), 3);
        let AvailType::Tuple(ty) = t.kind() else {
            panic!("expected tuple type")
        };
        assert_eq!(ty.size_range, IntegerRange::exactly(3));
    }

    #[test]
    fn append_in_place_when_destroyable() {
        let mut t = Tuple::from_values(vec![Value::Integer(1)]);
        let result = t.append(Value::Integer(2), true);
        assert_eq!(result.as_vec(), vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn append_copies_when_shared() {
        let mut t = Tuple::from_values(vec![Value::Integer(1)]);
        t.make_immutable();
        let original = t.clone();
        let result = t.append(Value::Integer(2), true);
        assert_eq!(original.as_vec(), vec![Value::Integer(1)]);
        assert_eq!(result.as_vec(), vec![Value::Integer(1), Value::Integer(2)]);
    }
}
