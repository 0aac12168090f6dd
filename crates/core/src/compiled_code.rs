//! Compiled code: the immutable record a Level One generator produces and
//! the interpreter executes (spec.md §2, §6).
//!
//! A `CompiledCode` is pure data — nybblecodes, a literal pool, and the
//! declared shapes of its locals/outers/arguments. It never holds a live
//! value for a captured variable; that is what distinguishes it from a
//! `Function`, which pairs a `CompiledCode` with the actual captured
//! `Variable`s or values closed over at the point the literal function was
//! instantiated.

use crate::types::FunctionType;
use crate::value::Value;
use std::sync::Arc;

/// Which numbered VM primitive, if any, this code's first instruction
/// invokes (spec.md §6's "primitive number, flags" pair).
pub type PrimitiveNumber = u16;

bitflags::bitflags! {
    /// Flags attached to a primitive invocation (spec.md §6). Mirrors the
    /// teacher's practice of modeling small closed option sets as bitflags
    /// rather than a `Vec<Enum>` (see `codegen::state` flag handling).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PrimitiveFlags: u16 {
        /// The generator may inline this primitive's call site rather than
        /// emitting a dispatched send.
        const CAN_INLINE = 0b0000_0000_0001;
        /// Pure and side-effect-free: foldable at compile time when every
        /// argument is a literal.
        const CAN_FOLD = 0b0000_0000_0010;
        /// On success, abandon the Level One fallback code entirely —
        /// used by primitives like addition that always succeed for valid
        /// argument types.
        const CANNOT_FAIL = 0b0000_0000_0100;
        /// Invoking this primitive has effects the optimizer must not
        /// reorder or eliminate even when the result is unused.
        const HAS_SIDE_EFFECT = 0b0000_0000_1000;
        /// Calls through a function argument (e.g. `Invoke`); the
        /// interpreter must treat the call site as potentially reentrant.
        const INVOKES = 0b0000_0001_0000;
        /// Available before the full method system is bootstrapped.
        const BOOTSTRAP = 0b0000_0010_0000;
        /// Reads interpreter- or runtime-global state outside its
        /// arguments, which blocks constant folding even when otherwise
        /// pure-looking.
        const READS_HIDDEN_GLOBAL_STATE = 0b0000_0100_0000;
        /// Writes interpreter- or runtime-global state as a side effect.
        const WRITES_HIDDEN_GLOBAL_STATE = 0b0000_1000_0000;
        /// This primitive may suspend the running fiber (e.g. a blocking
        /// read); the interpreter must be prepared to context-switch.
        const CAN_SUSPEND = 0b0001_0000_0000;
        /// Not callable directly from user-level method definitions.
        const PRIVATE = 0b0010_0000_0000;
        /// Placeholder for primitives whose behavior is not yet
        /// classified; never set by any primitive registered in this crate.
        const UNKNOWN = 0b0100_0000_0000;
    }
}

/// Whether a local or outer slot holds a plain value or a `Variable` cell
/// (spec.md §6's "local-variable kind tuple" / "outer-variable kind tuple").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Value,
    Variable,
}

/// Which numbered slot a final-use annotation refers to (spec.md §4.1's
/// final-use analysis pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClass {
    Local,
    Outer,
}

/// Records that the read of `slot` at nybble offset `instruction_offset` is
/// the last read of that slot within the block — the interpreter may clear
/// the slot immediately afterward rather than waiting for the frame to be
/// discarded, which both aids garbage collection and lets a destructive
/// primitive treat the formerly-read value as uniquely owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalUse {
    pub class: SlotClass,
    pub slot: u16,
    pub instruction_offset: usize,
}

/// An immutable, content-addressable record of nybblecodes plus the literal
/// pool and declared shapes the interpreter needs to run them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCode {
    nybblecodes: Arc<[u8]>,
    num_args: u16,
    num_locals: u16,
    num_outers: u16,
    max_stack_depth: u16,
    primitive: Option<PrimitiveNumber>,
    primitive_flags: PrimitiveFlags,
    function_type: FunctionType,
    literals: Arc<[Value]>,
    local_kinds: Arc<[SlotKind]>,
    outer_kinds: Arc<[SlotKind]>,
    final_uses: Arc<[FinalUse]>,
    /// Present once the Level Two optimizer has produced a register chunk
    /// for this code; invalidated back to `None` whenever an assumption it
    /// depended on (a method's definition set, say) changes.
    level_two_chunk: Option<Arc<[u8]>>,
    origin_name: Option<String>,
}

impl CompiledCode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nybblecodes: Vec<u8>,
        num_args: u16,
        num_locals: u16,
        num_outers: u16,
        max_stack_depth: u16,
        function_type: FunctionType,
    ) -> Self {
        CompiledCode {
            nybblecodes: nybblecodes.into(),
            num_args,
            num_locals,
            num_outers,
            max_stack_depth,
            primitive: None,
            primitive_flags: PrimitiveFlags::empty(),
            function_type,
            literals: Arc::from(Vec::new()),
            local_kinds: Arc::from(vec![SlotKind::Value; num_locals as usize]),
            outer_kinds: Arc::from(vec![SlotKind::Value; num_outers as usize]),
            final_uses: Arc::from(Vec::new()),
            level_two_chunk: None,
            origin_name: None,
        }
    }

    pub fn with_literals(mut self, literals: Vec<Value>) -> Self {
        self.literals = literals.into();
        self
    }

    pub fn with_local_kinds(mut self, kinds: Vec<SlotKind>) -> Self {
        debug_assert_eq!(kinds.len(), self.num_locals as usize);
        self.local_kinds = kinds.into();
        self
    }

    pub fn with_outer_kinds(mut self, kinds: Vec<SlotKind>) -> Self {
        debug_assert_eq!(kinds.len(), self.num_outers as usize);
        self.outer_kinds = kinds.into();
        self
    }

    pub fn with_final_uses(mut self, final_uses: Vec<FinalUse>) -> Self {
        self.final_uses = final_uses.into();
        self
    }

    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    pub fn literal_at(&self, index: usize) -> Option<&Value> {
        self.literals.get(index)
    }

    pub fn local_kind(&self, index: usize) -> Option<SlotKind> {
        self.local_kinds.get(index).copied()
    }

    pub fn outer_kind(&self, index: usize) -> Option<SlotKind> {
        self.outer_kinds.get(index).copied()
    }

    pub fn final_uses(&self) -> &[FinalUse] {
        &self.final_uses
    }

    pub fn is_final_use(&self, class: SlotClass, slot: u16, instruction_offset: usize) -> bool {
        self.final_uses.iter().any(|f| {
            f.class == class && f.slot == slot && f.instruction_offset == instruction_offset
        })
    }

    pub fn with_primitive(mut self, number: PrimitiveNumber, flags: PrimitiveFlags) -> Self {
        self.primitive = Some(number);
        self.primitive_flags = flags;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.origin_name = Some(name.into());
        self
    }

    pub fn nybblecodes(&self) -> &[u8] {
        &self.nybblecodes
    }

    pub fn num_args(&self) -> u16 {
        self.num_args
    }

    pub fn num_locals(&self) -> u16 {
        self.num_locals
    }

    pub fn num_outers(&self) -> u16 {
        self.num_outers
    }

    pub fn max_stack_depth(&self) -> u16 {
        self.max_stack_depth
    }

    pub fn primitive(&self) -> Option<(PrimitiveNumber, PrimitiveFlags)> {
        self.primitive.map(|n| (n, self.primitive_flags))
    }

    pub fn function_type(&self) -> &FunctionType {
        &self.function_type
    }

    pub fn origin_name(&self) -> Option<&str> {
        self.origin_name.as_deref()
    }

    pub fn level_two_chunk(&self) -> Option<&[u8]> {
        self.level_two_chunk.as_deref()
    }

    /// Attach an optimized Level Two chunk, returning a new record that
    /// shares everything else via `Arc`. Compiled code is immutable once
    /// built, so optimization produces a fresh value rather than mutating
    /// in place; the interpreter swaps its reference once the chunk is
    /// ready (spec.md §9 L2 invalidation protocol).
    pub fn with_level_two_chunk(&self, chunk: Vec<u8>) -> Self {
        let mut clone = self.clone();
        clone.level_two_chunk = Some(chunk.into());
        clone
    }

    pub fn without_level_two_chunk(&self) -> Self {
        let mut clone = self.clone();
        clone.level_two_chunk = None;
        clone
    }
}

/// Hashes the same content fields the derived `PartialEq` compares, so that
/// two `CompiledCode` values that are `==` always hash equal — omitting
/// `local_kinds`/`outer_kinds`/`final_uses`/`function_type`/
/// `level_two_chunk` from the hash is safe; it only needs to be a subset of
/// what equality already pins down, not every field.
impl std::hash::Hash for CompiledCode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.nybblecodes.hash(state);
        self.num_args.hash(state);
        self.num_locals.hash(state);
        self.num_outers.hash(state);
        self.max_stack_depth.hash(state);
        self.primitive.hash(state);
        self.primitive_flags.bits().hash(state);
        self.literals.hash(state);
        self.origin_name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AvailType;

    fn trivial_type() -> FunctionType {
        FunctionType {
            arguments: Vec::new(),
            result: Box::new(AvailType::Top),
        }
    }

    #[test]
    fn primitive_flags_roundtrip() {
        let code = CompiledCode::new(vec![0x01, 0x02], 0, 0, 0, 2, trivial_type())
            .with_primitive(60, PrimitiveFlags::CANNOT_FAIL);
        let (num, flags) = code.primitive().unwrap();
        assert_eq!(num, 60);
        assert!(flags.contains(PrimitiveFlags::CANNOT_FAIL));
        assert!(!flags.contains(PrimitiveFlags::CAN_SUSPEND));
    }

    #[test]
    fn level_two_chunk_attach_and_detach() {
        let code = CompiledCode::new(vec![], 1, 0, 0, 1, trivial_type());
        assert!(code.level_two_chunk().is_none());
        let optimized = code.with_level_two_chunk(vec![0xAA]);
        assert_eq!(optimized.level_two_chunk(), Some(&[0xAA][..]));
        let reverted = optimized.without_level_two_chunk();
        assert!(reverted.level_two_chunk().is_none());
    }

    #[test]
    fn equal_records_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = CompiledCode::new(vec![0x01, 0x02], 1, 1, 0, 2, trivial_type());
        let b = CompiledCode::new(vec![0x01, 0x02], 1, 1, 0, 2, trivial_type());
        assert_eq!(a, b);

        let hash_of = |c: &CompiledCode| {
            let mut hasher = DefaultHasher::new();
            c.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
