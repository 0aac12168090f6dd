//! Sets, backed by the persistent HAMT (spec.md §3).

use crate::hamt::{hash_of, HamtNode};
use crate::mutability::{Mutability, MutabilityCell};
use crate::types::AvailType;
use crate::value::Value;
use std::sync::Arc;

struct SetInner {
    mutability: MutabilityCell,
    root: Arc<HamtNode<Value, ()>>,
    size: usize,
}

/// An unordered collection of distinct values.
#[derive(Clone)]
pub struct AvailSet(Arc<SetInner>);

impl AvailSet {
    pub fn empty() -> Self {
        AvailSet(Arc::new(SetInner {
            mutability: MutabilityCell::new(),
            root: Arc::new(HamtNode::Empty),
            size: 0,
        }))
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut set = AvailSet::empty();
        for v in values {
            set = set.with_inserted(v);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.0.size
    }

    pub fn is_empty(&self) -> bool {
        self.0.size == 0
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.root.get(hash_of(value), 0, value).is_some()
    }

    /// Returns a new set with `value` present; structurally shares with
    /// `self` wherever the value did not need to be inserted.
    pub fn with_inserted(&self, value: Value) -> AvailSet {
        let (root, inserted) = self.0.root.insert(hash_of(&value), 0, value, ());
        AvailSet(Arc::new(SetInner {
            mutability: MutabilityCell::new(),
            root,
            size: if inserted { self.0.size + 1 } else { self.0.size },
        }))
    }

    pub fn with_removed(&self, value: &Value) -> AvailSet {
        let (root, removed) = self.0.root.remove(hash_of(value), 0, value);
        AvailSet(Arc::new(SetInner {
            mutability: MutabilityCell::new(),
            root,
            size: if removed { self.0.size - 1 } else { self.0.size },
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.root.iter().map(|(k, _)| k)
    }

    /// Union with `other`, always inserting the smaller set's elements into
    /// the larger one's shape rather than the reverse (spec.md §8 scenario
    /// 2). When `can_destroy` is set and `self` is both the larger set and
    /// the sole owner of a `Mutable` backing store, the insert happens in
    /// place via `Arc::get_mut`, mirroring `Tuple::append`'s limited
    /// destructive scope — the HAMT trie nodes themselves are still
    /// persistent, so only the outer wrapper allocation is avoided.
    pub fn union(&mut self, other: &AvailSet, can_destroy: bool) -> AvailSet {
        if self.len() >= other.len() {
            if can_destroy && self.mutability() == Mutability::Mutable {
                if let Some(inner) = Arc::get_mut(&mut self.0) {
                    for v in other.iter() {
                        let (root, inserted) = inner.root.insert(hash_of(v), 0, v.clone(), ());
                        inner.root = root;
                        if inserted {
                            inner.size += 1;
                        }
                    }
                    return self.clone();
                }
            }
            let mut result = self.clone();
            for v in other.iter() {
                result = result.with_inserted(v.clone());
            }
            result
        } else {
            let mut result = other.clone();
            for v in self.iter() {
                result = result.with_inserted(v.clone());
            }
            result
        }
    }

    pub fn intersect(&self, other: &AvailSet) -> AvailSet {
        AvailSet::from_values(self.iter().filter(|v| other.contains(v)).cloned())
    }

    pub fn kind(&self) -> AvailType {
        let element_type = self
            .iter()
            .map(Value::kind)
            .fold(AvailType::Bottom, |acc, t| acc.join(&t));
        AvailType::Set(Box::new(element_type))
    }

    pub fn mutability(&self) -> Mutability {
        self.0.mutability.get()
    }

    pub fn make_immutable(&self) -> Mutability {
        for v in self.iter() {
            v.make_immutable();
        }
        self.0.mutability.make_immutable()
    }

    pub fn make_shared(&self) -> Mutability {
        for v in self.iter() {
            v.make_shared();
        }
        self.0.mutability.make_shared()
    }
}

impl PartialEq for AvailSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}
impl Eq for AvailSet {}

impl std::hash::Hash for AvailSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Order-independent: XOR each element's individual hash together.
        let combined = self.iter().fold(0u64, |acc, v| acc ^ hash_of(v));
        combined.hash(state);
    }
}

impl std::fmt::Debug for AvailSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_dedups() {
        let s = AvailSet::from_values([Value::Integer(1), Value::Integer(1), Value::Integer(2)]);
        assert_eq!(s.len(), 2);
        assert!(s.contains(&Value::Integer(1)));
    }

    #[test]
    fn persistent_insert_does_not_mutate_original() {
        let a = AvailSet::from_values([Value::Integer(1)]);
        let b = a.with_inserted(Value::Integer(2));
        assert!(!a.contains(&Value::Integer(2)));
        assert!(b.contains(&Value::Integer(2)));
    }

    #[test]
    fn union_and_intersect() {
        let mut a = AvailSet::from_values([Value::Integer(1), Value::Integer(2)]);
        let b = AvailSet::from_values([Value::Integer(2), Value::Integer(3)]);
        assert_eq!(a.union(&b, false).len(), 3);
        assert_eq!(a.intersect(&b), AvailSet::from_values([Value::Integer(2)]));
    }

    #[test]
    fn union_iterates_the_smaller_set() {
        let mut small = AvailSet::from_values([Value::Integer(1)]);
        let large = AvailSet::from_values([Value::Integer(2), Value::Integer(3), Value::Integer(4)]);
        let result = small.union(&large, false);
        assert_eq!(result.len(), 4);
        assert!(result.contains(&Value::Integer(1)));
        assert!(result.contains(&Value::Integer(4)));
    }

    #[test]
    fn union_of_two_mutable_sets_can_destroy_in_place() {
        let mut a = AvailSet::from_values([Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        let b = AvailSet::from_values([Value::Integer(3), Value::Integer(4)]);
        assert_eq!(a.mutability(), Mutability::Mutable);

        let result = a.union(&b, true);
        assert_eq!(result.len(), 4);
        assert!(result.contains(&Value::Integer(4)));
    }
}
