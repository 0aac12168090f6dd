//! Continuations: first-class, immutable snapshots of an activation record
//! (spec.md §2, §7 "stack reification").
//!
//! When a fiber is reified, the interpreter walks its native call stack and
//! builds one `Continuation` per frame, each pointing at its caller's
//! continuation, forming a singly linked chain rooted at the innermost
//! frame. Because continuations are immutable once built, resuming one
//! (`avail-vm`'s job, not this crate's) never disturbs a continuation still
//! referenced elsewhere — e.g. by a label continuation captured earlier for
//! a non-local exit.

use crate::function::Function;
use crate::value::Value;
use std::sync::Arc;

struct ContinuationInner {
    function: Function,
    /// Program counter: byte offset into `function.code().nybblecodes()`
    /// at which execution will resume.
    pc: u32,
    /// Arguments, locals, and operand-stack contents, in that fixed layout
    /// order, exactly mirroring the frame slot numbering the generator
    /// assigns (spec.md §2's argument/local/stack slot numbering).
    frame_slots: Vec<Value>,
    /// Count of `frame_slots` entries that are live operand-stack values
    /// (the suffix of the slot vector), as opposed to arguments/locals.
    stack_depth: u32,
    caller: Option<Continuation>,
}

/// A frozen activation record, reachable and inspectable as an ordinary
/// first-class value.
#[derive(Clone)]
pub struct Continuation(Arc<ContinuationInner>);

impl Continuation {
    pub fn new(
        function: Function,
        pc: u32,
        frame_slots: Vec<Value>,
        stack_depth: u32,
        caller: Option<Continuation>,
    ) -> Self {
        Continuation(Arc::new(ContinuationInner {
            function,
            pc,
            frame_slots,
            stack_depth,
            caller,
        }))
    }

    pub fn function(&self) -> &Function {
        &self.0.function
    }

    pub fn pc(&self) -> u32 {
        self.0.pc
    }

    pub fn frame_slots(&self) -> &[Value] {
        &self.0.frame_slots
    }

    pub fn stack_depth(&self) -> u32 {
        self.0.stack_depth
    }

    pub fn caller(&self) -> Option<&Continuation> {
        self.0.caller.as_ref()
    }

    /// Build a new continuation identical to `self` but with `pc` and the
    /// top-of-stack slots replaced — the shape of the step a resumed
    /// continuation takes after a primitive call returns a value into it.
    /// Continuations are immutable, so resuming always produces a fresh one
    /// rather than mutating the original in place.
    pub fn with_pc_and_slots(&self, pc: u32, frame_slots: Vec<Value>, stack_depth: u32) -> Self {
        Continuation(Arc::new(ContinuationInner {
            function: self.0.function.clone(),
            pc,
            frame_slots,
            stack_depth,
            caller: self.0.caller.clone(),
        }))
    }

    /// Walk from this continuation to the root, counting frames — used by
    /// diagnostics to report a fiber's reified call depth.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self.caller();
        while let Some(c) = current {
            depth += 1;
            current = c.caller();
        }
        depth
    }
}

impl PartialEq for Continuation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Continuation {}

impl std::hash::Hash for Continuation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Continuation(pc={}, depth={})", self.0.pc, self.depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;
    use crate::types::{AvailType, FunctionType};

    fn leaf_function() -> Function {
        let code = CompiledCode::new(
            vec![],
            0,
            0,
            0,
            1,
            FunctionType {
                arguments: vec![],
                result: Box::new(AvailType::Top),
            },
        );
        Function::new(code, vec![])
    }

    #[test]
    fn caller_chain_depth() {
        let root = Continuation::new(leaf_function(), 0, vec![], 0, None);
        let child = Continuation::new(leaf_function(), 3, vec![Value::Integer(1)], 1, Some(root));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn resuming_produces_new_continuation() {
        let original = Continuation::new(leaf_function(), 0, vec![], 0, None);
        let resumed = original.with_pc_and_slots(5, vec![Value::Integer(9)], 1);
        assert_ne!(original, resumed);
        assert_eq!(resumed.pc(), 5);
        assert_eq!(original.pc(), 0);
    }
}
