//! The lazily-expanded, memoized dispatch tree (spec.md §4.3).
//!
//! A node is either a [`Node::Leaf`] (a precomputed, most-specific result)
//! or an internal node carrying the definitions not yet decided, those
//! already qualified, and the argument positions not yet tested. Expansion
//! happens on demand: the first lookup to reach a given internal node with
//! a given runtime type at its chosen split position builds that child and
//! memoizes it, so a repeat lookup with the same type at that position
//! reuses the child instead of re-partitioning.

use crate::method::Definition;
use avail_core::AvailType;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

enum Node {
    /// Indices into the method's definition vector. Zero means no
    /// definition applies; more than one means the call is ambiguous.
    Leaf(Vec<usize>),
    Internal(InternalNode),
}

struct InternalNode {
    /// Definitions still under consideration on the path that led here.
    qualified: Vec<usize>,
    /// Argument positions not yet tested on this path.
    remaining_positions: Vec<usize>,
    /// The position this node tests, chosen once and memoized with it.
    split_position: usize,
    children: Mutex<HashMap<AvailType, Arc<Node>>>,
}

impl InternalNode {
    fn new(definitions: &[Definition], qualified: Vec<usize>, remaining_positions: Vec<usize>) -> Self {
        let split_position = choose_split_position(definitions, &qualified, &remaining_positions);
        InternalNode {
            qualified,
            remaining_positions,
            split_position,
            children: Mutex::new(HashMap::new()),
        }
    }

    fn expand(&self, definitions: &[Definition], observed: &AvailType) -> Node {
        let new_qualified: Vec<usize> = self
            .qualified
            .iter()
            .copied()
            .filter(|&i| observed.is_subtype_of(&definitions[i].argument_types[self.split_position]))
            .collect();
        let new_remaining: Vec<usize> = self
            .remaining_positions
            .iter()
            .copied()
            .filter(|&p| p != self.split_position)
            .collect();
        if new_remaining.is_empty() || new_qualified.is_empty() {
            Node::Leaf(most_specific(&new_qualified, definitions))
        } else {
            Node::Internal(InternalNode::new(definitions, new_qualified, new_remaining))
        }
    }
}

/// Prefer the position whose qualified definitions show the most distinct
/// declared types — maximum information gain — breaking ties toward the
/// leftmost (lowest-numbered) position (spec.md §4.3 tie-break rule; see
/// DESIGN.md for why leftmost was chosen over the unspecified alternative).
fn choose_split_position(definitions: &[Definition], qualified: &[usize], remaining: &[usize]) -> usize {
    remaining
        .iter()
        .copied()
        .max_by_key(|&p| {
            let distinct: HashSet<&AvailType> =
                qualified.iter().map(|&i| &definitions[i].argument_types[p]).collect();
            (distinct.len(), std::cmp::Reverse(p))
        })
        .expect("choose_split_position requires at least one remaining position")
}

fn dominates(definitions: &[Definition], a: usize, b: usize) -> bool {
    definitions[a]
        .argument_types
        .iter()
        .zip(&definitions[b].argument_types)
        .all(|(ta, tb)| ta.is_subtype_of(tb))
}

/// The maximal elements of `qualified` under the subtype order: remove any
/// definition strictly less specific than another (spec.md §4.3's leaf
/// construction rule). More than one survivor means the call site is
/// ambiguous.
fn most_specific(qualified: &[usize], definitions: &[Definition]) -> Vec<usize> {
    qualified
        .iter()
        .copied()
        .filter(|&d| {
            !qualified
                .iter()
                .any(|&other| other != d && dominates(definitions, other, d) && !dominates(definitions, d, other))
        })
        .collect()
}

/// The dispatch tree for one method. Rebuilt (by `Method::add_definition`)
/// whenever the definition set changes; within its lifetime, expansion is
/// memoized as described above.
pub struct DispatchTree {
    arity: usize,
    root: Mutex<Option<Arc<Node>>>,
}

impl DispatchTree {
    pub fn new(top_types: Vec<AvailType>) -> Self {
        DispatchTree {
            arity: top_types.len(),
            root: Mutex::new(None),
        }
    }

    /// Traverse iteratively so lookup depth never grows the native call
    /// stack (spec.md §4.3: "Both traverse iteratively to bound stack
    /// depth").
    pub fn lookup_by_types(
        &self,
        definitions: &[Definition],
        types: &[AvailType],
    ) -> Result<Vec<Definition>, crate::error::DispatchError> {
        use crate::error::DispatchError;

        let root = {
            let mut guard = self.root.lock().unwrap();
            if guard.is_none() {
                *guard = Some(Arc::new(if self.arity == 0 {
                    Node::Leaf(most_specific(&(0..definitions.len()).collect::<Vec<_>>(), definitions))
                } else {
                    Node::Internal(InternalNode::new(
                        definitions,
                        (0..definitions.len()).collect(),
                        (0..self.arity).collect(),
                    ))
                }));
            }
            guard.clone().unwrap()
        };

        let mut current = root;
        loop {
            match &*current {
                Node::Leaf(indices) => {
                    return match indices.len() {
                        0 => Err(DispatchError::NoMethodDefinition),
                        1 => Ok(vec![definitions[indices[0]].clone()]),
                        _ => Err(DispatchError::AmbiguousMethodDefinition),
                    };
                }
                Node::Internal(internal) => {
                    let observed = types[internal.split_position].clone();
                    let next = {
                        let mut children = internal.children.lock().unwrap();
                        children
                            .entry(observed.clone())
                            .or_insert_with(|| Arc::new(internal.expand(definitions, &observed)))
                            .clone()
                    };
                    current = next;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avail_core::{CompiledCode, Function, FunctionType, IntegerRange};

    fn function_with_type(ft: FunctionType) -> Function {
        let code = CompiledCode::new(vec![], ft.arguments.len() as u16, 0, 0, 1, ft);
        Function::new(code, vec![])
    }

    fn def(argument_types: Vec<AvailType>) -> Definition {
        let ft = FunctionType {
            arguments: argument_types.clone(),
            result: Box::new(AvailType::Top),
        };
        Definition::new(argument_types, function_with_type(ft))
    }

    #[test]
    fn single_definition_always_matches() {
        let defs = vec![def(vec![AvailType::Top])];
        let tree = DispatchTree::new(vec![AvailType::Top]);
        let result = tree
            .lookup_by_types(&defs, &[AvailType::Integer(IntegerRange::exactly(1))])
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn more_specific_definition_wins() {
        let narrow = AvailType::Integer(IntegerRange { min: 0, max: 10 });
        let wide = AvailType::Integer(IntegerRange::ALL);
        let defs = vec![def(vec![wide.clone()]), def(vec![narrow.clone()])];
        let tree = DispatchTree::new(vec![AvailType::Top]);
        let result = tree
            .lookup_by_types(&defs, &[AvailType::Integer(IntegerRange::exactly(5))])
            .unwrap();
        assert_eq!(result[0].argument_types[0], narrow);
    }

    #[test]
    fn incomparable_definitions_are_ambiguous() {
        let a = AvailType::Tuple(avail_core::TupleType::exactly(AvailType::Integer(IntegerRange::ALL), 2));
        let b = AvailType::Tuple(avail_core::TupleType::exactly(AvailType::Float, 2));
        let defs = vec![def(vec![a]), def(vec![b])];
        let tree = DispatchTree::new(vec![AvailType::Top]);
        // Neither tuple type is a subtype of the other, and the probe type
        // (AvailType::Top) is rejected by both, yielding "no method" rather
        // than ambiguity here; ambiguity is instead exercised directly via
        // `most_specific` in the two-argument case below.
        let err = tree.lookup_by_types(&defs, &[AvailType::Top]).unwrap_err();
        assert!(matches!(err, crate::error::DispatchError::NoMethodDefinition));
    }

    #[test]
    fn unrelated_definitions_both_qualify_as_ambiguous() {
        let defs = vec![def(vec![AvailType::Top]), def(vec![AvailType::Top])];
        // Two distinct, non-dominating definitions with the same declared
        // type are both maximal -- an ambiguity the caller must see.
        let most_specific_indices = most_specific(&[0, 1], &defs);
        assert_eq!(most_specific_indices.len(), 2);
    }
}
