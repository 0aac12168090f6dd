//! Registers and operand kinds for the Level Two IR (spec.md §4.2).
//!
//! Every object register is in SSA-like form: a write is a new definition,
//! and a register-remap during optimization rewrites every use atomically
//! rather than mutating values in place.

use avail_core::{AvailType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(pub u32);

/// How an instruction's operand slot is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Reads the current value of a register.
    ReadPointer(RegisterId),
    /// Binds a register to the value this instruction produces.
    WritePointer(RegisterId),
    /// An ordered list of registers, e.g. a call's argument list.
    Vector(Vec<RegisterId>),
    /// A literal-pool reference, resolved at translation time.
    Literal(Value),
    /// A constant baked directly into the instruction (not pool-interned).
    Immediate(i64),
    /// A branch target: an instruction index within the same chunk.
    Pc(usize),
}

/// Bookkeeping a chunk keeps per register: its static type, an optional
/// known constant, the instruction that defined it, and how many
/// instructions read it.
#[derive(Debug, Clone)]
pub struct RegisterInfo {
    pub static_type: AvailType,
    pub constant: Option<Value>,
    pub defining_instruction: usize,
    pub use_count: u32,
}

impl RegisterInfo {
    pub fn new(static_type: AvailType, defining_instruction: usize) -> Self {
        RegisterInfo {
            static_type,
            constant: None,
            defining_instruction,
            use_count: 0,
        }
    }

    pub fn with_constant(mut self, value: Value) -> Self {
        self.constant = Some(value);
        self
    }
}
