//! Maps, backed by the persistent HAMT (spec.md §3).

use crate::hamt::{hash_of, HamtNode};
use crate::mutability::{Mutability, MutabilityCell};
use crate::types::AvailType;
use crate::value::Value;
use std::sync::Arc;

struct MapInner {
    mutability: MutabilityCell,
    root: Arc<HamtNode<Value, Value>>,
    size: usize,
}

/// An unordered key-value association, keys compared by value equality.
#[derive(Clone)]
pub struct AvailMap(Arc<MapInner>);

impl AvailMap {
    pub fn empty() -> Self {
        AvailMap(Arc::new(MapInner {
            mutability: MutabilityCell::new(),
            root: Arc::new(HamtNode::Empty),
            size: 0,
        }))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut map = AvailMap::empty();
        for (k, v) in pairs {
            map = map.with_inserted(k, v);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.0.size
    }

    pub fn is_empty(&self) -> bool {
        self.0.size == 0
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.root.get(hash_of(key), 0, key).cloned()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.0.root.get(hash_of(key), 0, key).is_some()
    }

    pub fn with_inserted(&self, key: Value, value: Value) -> AvailMap {
        let (root, inserted) = self.0.root.insert(hash_of(&key), 0, key, value);
        AvailMap(Arc::new(MapInner {
            mutability: MutabilityCell::new(),
            root,
            size: if inserted { self.0.size + 1 } else { self.0.size },
        }))
    }

    pub fn with_removed(&self, key: &Value) -> AvailMap {
        let (root, removed) = self.0.root.remove(hash_of(key), 0, key);
        AvailMap(Arc::new(MapInner {
            mutability: MutabilityCell::new(),
            root,
            size: if removed { self.0.size - 1 } else { self.0.size },
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.0.root.iter()
    }

    pub fn kind(&self) -> AvailType {
        let (key_type, value_type) = self.iter().fold(
            (AvailType::Bottom, AvailType::Bottom),
            |(kt, vt), (k, v)| (kt.join(&k.kind()), vt.join(&v.kind())),
        );
        AvailType::Map {
            key: Box::new(key_type),
            value: Box::new(value_type),
        }
    }

    pub fn mutability(&self) -> Mutability {
        self.0.mutability.get()
    }

    pub fn make_immutable(&self) -> Mutability {
        for (k, v) in self.iter() {
            k.make_immutable();
            v.make_immutable();
        }
        self.0.mutability.make_immutable()
    }

    pub fn make_shared(&self) -> Mutability {
        for (k, v) in self.iter() {
            k.make_shared();
            v.make_shared();
        }
        self.0.mutability.make_shared()
    }
}

impl PartialEq for AvailMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k).as_ref() == Some(v))
    }
}
impl Eq for AvailMap {}

impl std::hash::Hash for AvailMap {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let combined = self
            .iter()
            .fold(0u64, |acc, (k, v)| acc ^ (hash_of(k) ^ hash_of(v).rotate_left(1)));
        combined.hash(state);
    }
}

impl std::fmt::Debug for AvailMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter().map(|(k, v)| (k, v))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_roundtrip() {
        let m = AvailMap::from_pairs([(Value::Integer(1), Value::Integer(10))]);
        assert_eq!(m.get(&Value::Integer(1)), Some(Value::Integer(10)));
        assert_eq!(m.get(&Value::Integer(2)), None);
    }

    #[test]
    fn replace_keeps_size() {
        let m = AvailMap::from_pairs([(Value::Integer(1), Value::Integer(10))]);
        let m = m.with_inserted(Value::Integer(1), Value::Integer(20));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&Value::Integer(1)), Some(Value::Integer(20)));
    }

    #[test]
    fn persistence() {
        let a = AvailMap::from_pairs([(Value::Integer(1), Value::Integer(10))]);
        let b = a.with_inserted(Value::Integer(2), Value::Integer(20));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
    }
}
