//! A minimal stand-in for Avail's module loader (spec.md §1 names it an
//! out-of-scope external collaborator: "the module loader installs methods
//! into the dispatch engine"). This crate needs *some* way to resolve a
//! send's literal message atom to an `avail_dispatch::Method` in order to
//! exercise the interpreter end to end; `ModuleLoader` is that minimal
//! mechanism, not a reimplementation of Avail's module/bundle-tree system.

use avail_core::Atom;
use avail_dispatch::Method;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-wide (well, loader-wide) table from message atom identity to the
/// method it names. Mirrors the "writer discipline that excludes concurrent
/// lookups" spec.md §5 calls for during a module-loading window: definition
/// changes take the write lock, lookups take the read lock.
#[derive(Default)]
pub struct ModuleLoader {
    bundles: RwLock<HashMap<Atom, Arc<Method>>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        ModuleLoader::default()
    }

    /// Install a new method under `message`, or return the existing one if
    /// already installed with the same arity.
    pub fn define_method(&self, message: Atom, arity: usize) -> Arc<Method> {
        let mut bundles = self.bundles.write().unwrap();
        bundles
            .entry(message)
            .or_insert_with(|| Arc::new(Method::new(arity)))
            .clone()
    }

    pub fn resolve(&self, message: &Atom) -> Option<Arc<Method>> {
        self.bundles.read().unwrap().get(message).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_is_idempotent_by_atom_identity() {
        let loader = ModuleLoader::new();
        let message = Atom::new("foo:");
        let a = loader.define_method(message.clone(), 1);
        let b = loader.define_method(message.clone(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(loader.resolve(&message).is_some());
    }

    #[test]
    fn distinct_atoms_with_same_name_are_distinct_bundles() {
        let loader = ModuleLoader::new();
        let a = loader.define_method(Atom::new("foo:"), 1);
        let b = loader.define_method(Atom::new("foo:"), 1);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
