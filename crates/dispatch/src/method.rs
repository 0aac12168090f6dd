//! Methods, definitions, and bundles (spec.md §4.3, GLOSSARY).
//!
//! A **definition** pairs a fixed-arity argument-type tuple with the
//! `Function` to invoke when a send's arguments match it. A **method** is
//! the full, mutable set of definitions sharing an arity and a dispatch
//! tree built over them. A **bundle** is the name a method is known by at
//! a call site — kept as a thin wrapper since this core re-implementation
//! has no parsing layer to give bundles their usual message-pattern role.

use crate::error::DispatchError;
use crate::tree::DispatchTree;
use avail_core::{AvailType, Function};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub argument_types: Vec<AvailType>,
    pub function: Function,
}

impl Definition {
    pub fn new(argument_types: Vec<AvailType>, function: Function) -> Self {
        Definition {
            argument_types,
            function,
        }
    }
}

struct MethodState {
    definitions: Vec<Definition>,
    tree: DispatchTree,
}

/// A method: a fixed arity and the (growable) set of definitions sharing
/// it, plus the dispatch tree built lazily over that set.
pub struct Method {
    arity: usize,
    state: RwLock<MethodState>,
}

impl Method {
    pub fn new(arity: usize) -> Self {
        Method {
            arity,
            state: RwLock::new(MethodState {
                definitions: Vec::new(),
                tree: DispatchTree::new(vec![AvailType::Top; arity]),
            }),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Add a definition, rejecting an argument-tuple type identical to one
    /// already present (spec.md §4.3: "Identical signatures are forbidden
    /// at method-definition time").
    pub fn add_definition(&self, definition: Definition) -> Result<(), DispatchError> {
        if definition.argument_types.len() != self.arity {
            return Err(DispatchError::IncorrectNumberOfArguments);
        }
        let mut state = self.state.write().unwrap();
        if state
            .definitions
            .iter()
            .any(|d| d.argument_types == definition.argument_types)
        {
            return Err(DispatchError::DuplicateSignature);
        }
        state.definitions.push(definition);
        // Adding a definition invalidates every memoized expansion that
        // already ran over the prior, smaller definition set.
        state.tree = DispatchTree::new(vec![AvailType::Top; self.arity]);
        Ok(())
    }

    pub fn definitions(&self) -> Vec<Definition> {
        self.state.read().unwrap().definitions.clone()
    }

    pub fn lookup_by_types(&self, types: &[AvailType]) -> Result<Vec<Definition>, DispatchError> {
        if types.len() != self.arity {
            return Err(DispatchError::IncorrectNumberOfArguments);
        }
        let state = self.state.read().unwrap();
        state.tree.lookup_by_types(&state.definitions, types)
    }

    pub fn lookup_by_values(
        &self,
        values: &[avail_core::Value],
    ) -> Result<Vec<Definition>, DispatchError> {
        if values.len() != self.arity {
            return Err(DispatchError::IncorrectNumberOfArguments);
        }
        let types: Vec<AvailType> = values.iter().map(|v| v.kind()).collect();
        self.lookup_by_types(&types)
    }
}

/// The name a method is known by at a call site.
pub struct Bundle {
    name: String,
    method: Arc<Method>,
}

impl Bundle {
    pub fn new(name: impl Into<String>, method: Arc<Method>) -> Self {
        Bundle {
            name: name.into(),
            method,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }
}
