//! Atoms: nominal-identity values used as dictionary keys and method names
//! (spec.md §3, GLOSSARY).
//!
//! Identity, not name, is what makes two atoms equal — two atoms created
//! with the same name are distinct values, exactly like Avail's own
//! `AtomDescriptor`. We track identity with a process-wide monotonic
//! counter, the same lock-free idiom the teacher's scheduler uses for
//! strand IDs (`NEXT_STRAND_ID`).

use crate::value::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ATOM_ID: AtomicU64 = AtomicU64::new(1);

struct AtomInner {
    id: u64,
    name: String,
    /// Special atoms (e.g. the bootstrap true/false pair) are interpreter
    /// wired-in constants; the generator and interpreter may special-case
    /// them, and the dispatch engine treats them as an `Enumeration` type
    /// to model Avail's boolean type without a dedicated `Bool` value kind.
    special: bool,
    properties: Mutex<HashMap<Atom, Value>>,
}

/// A nominal value with process-wide-unique identity and an optional
/// property map.
#[derive(Clone)]
pub struct Atom(Arc<AtomInner>);

impl Atom {
    pub fn new(name: impl Into<String>) -> Self {
        Atom(Arc::new(AtomInner {
            id: NEXT_ATOM_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            special: false,
            properties: Mutex::new(HashMap::new()),
        }))
    }

    pub fn new_special(name: impl Into<String>) -> Self {
        Atom(Arc::new(AtomInner {
            id: NEXT_ATOM_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            special: true,
            properties: Mutex::new(HashMap::new()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_special(&self) -> bool {
        self.0.special
    }

    pub fn set_property(&self, key: Atom, value: Value) {
        self.0.properties.lock().unwrap().insert(key, value);
    }

    pub fn get_property(&self, key: &Atom) -> Option<Value> {
        self.0.properties.lock().unwrap().get(key).cloned()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Atom {}

impl std::hash::Hash for Atom {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Atom(#{} {:?})", self.0.id, self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_different_identity() {
        let a = Atom::new("foo");
        let b = Atom::new("foo");
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn properties_roundtrip() {
        let a = Atom::new("widget");
        let key = Atom::new("color");
        a.set_property(key.clone(), Value::Integer(7));
        assert_eq!(a.get_property(&key), Some(Value::Integer(7)));
    }
}
