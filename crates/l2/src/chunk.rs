//! A Level Two chunk: a sequence of instructions over registers, plus the
//! per-register bookkeeping the optimizer needs (spec.md §4.2).
//!
//! L2 is advisory. A chunk may be invalidated at any time — when a method
//! it inlined gains a new, more specific definition, say — after which the
//! owning frame falls back to interpreting the unoptimized L1 body
//! directly (spec.md §4.2, §9). `Chunk` models that with a single atomic
//! flag rather than tearing the chunk down, so a frame mid-reification can
//! still observe the chunk it was built from.

use crate::instruction::Instruction;
use crate::register::{RegisterId, RegisterInfo};
use avail_core::AvailType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct Chunk {
    instructions: Vec<Instruction>,
    registers: HashMap<RegisterId, RegisterInfo>,
    next_register: u32,
    valid: AtomicBool,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk {
            instructions: Vec::new(),
            registers: HashMap::new(),
            next_register: 0,
            valid: AtomicBool::new(true),
        }
    }

    pub fn fresh_register(&mut self, static_type: AvailType, defining_instruction: usize) -> RegisterId {
        let id = RegisterId(self.next_register);
        self.next_register += 1;
        self.registers.insert(id, RegisterInfo::new(static_type, defining_instruction));
        id
    }

    /// Append `instruction`, bumping the use count of every register it
    /// reads and, for `SetVariable`, refining the container's static type
    /// to *variable-of-T* (spec.md §4.2's named example of per-instruction
    /// type propagation).
    pub fn push(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        for used in instruction.uses() {
            if let Some(info) = self.registers.get_mut(&used) {
                info.use_count += 1;
            }
        }
        if let Instruction::SetVariable { container, value } = &instruction {
            if let Some(value_type) = self.registers.get(value).map(|i| i.static_type.clone()) {
                if let Some(container_info) = self.registers.get_mut(container) {
                    container_info.static_type = AvailType::Variable(Box::new(value_type));
                }
            }
        }
        self.instructions.push(instruction);
        index
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn register_info(&self, id: RegisterId) -> Option<&RegisterInfo> {
        self.registers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Validate that every branch declares successors within bounds and
    /// that no register is used before it is defined — the minimal shape
    /// check a translator's output must pass before the interpreter will
    /// run it.
    pub fn verify(&self) -> Result<(), ChunkError> {
        for (index, instruction) in self.instructions.iter().enumerate() {
            for target in instruction.successors(index + 1) {
                if target > self.instructions.len() {
                    return Err(ChunkError::BranchOutOfBounds { at: index, target });
                }
            }
            for used in instruction.uses() {
                let Some(info) = self.registers.get(&used) else {
                    return Err(ChunkError::UndefinedRegister { at: index, register: used });
                };
                if info.defining_instruction > index {
                    return Err(ChunkError::UseBeforeDefinition { at: index, register: used });
                }
            }
        }
        Ok(())
    }

    /// Atomically rewrite every use (and every `RegisterInfo` key) of the
    /// registers named in `mapping`, the way an optimization pass merges
    /// two SSA values discovered to be equal.
    pub fn remap_registers(&mut self, mapping: &HashMap<RegisterId, RegisterId>) {
        let resolve = |r: RegisterId| *mapping.get(&r).unwrap_or(&r);
        for instruction in &mut self.instructions {
            *instruction = remap_instruction(instruction, &resolve);
        }
        let old_registers = std::mem::take(&mut self.registers);
        for (id, info) in old_registers {
            let new_id = resolve(id);
            self.registers.entry(new_id).or_insert(info);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Mark this chunk permanently invalid; the interpreter must observe
    /// this before its next instruction dispatch and fall back to L1.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Chunk::new()
    }
}

fn remap_instruction(instruction: &Instruction, resolve: &impl Fn(RegisterId) -> RegisterId) -> Instruction {
    match instruction.clone() {
        Instruction::MoveConstant { dest, value } => Instruction::MoveConstant {
            dest: resolve(dest),
            value,
        },
        Instruction::Move { dest, src } => Instruction::Move {
            dest: resolve(dest),
            src: resolve(src),
        },
        Instruction::SetVariable { container, value } => Instruction::SetVariable {
            container: resolve(container),
            value: resolve(value),
        },
        Instruction::GetVariable { dest, container } => Instruction::GetVariable {
            dest: resolve(dest),
            container: resolve(container),
        },
        Instruction::ClearObject { dest } => Instruction::ClearObject { dest: resolve(dest) },
        Instruction::Send { dest, message, args } => Instruction::Send {
            dest: resolve(dest),
            message,
            args: args.into_iter().map(resolve).collect(),
        },
        Instruction::MakeTuple { dest, elements } => Instruction::MakeTuple {
            dest: resolve(dest),
            elements: elements.into_iter().map(resolve).collect(),
        },
        Instruction::Jump { target } => Instruction::Jump { target },
        Instruction::Return { value } => Instruction::Return { value: resolve(value) },
        Instruction::JumpIfNotEqual { left, right, if_true, if_false } => Instruction::JumpIfNotEqual {
            left: resolve(left),
            right: resolve(right),
            if_true,
            if_false,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    BranchOutOfBounds { at: usize, target: usize },
    UndefinedRegister { at: usize, register: RegisterId },
    UseBeforeDefinition { at: usize, register: RegisterId },
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkError::BranchOutOfBounds { at, target } => {
                write!(f, "instruction {at} branches to out-of-bounds target {target}")
            }
            ChunkError::UndefinedRegister { at, register } => {
                write!(f, "instruction {at} uses undefined register {register:?}")
            }
            ChunkError::UseBeforeDefinition { at, register } => {
                write!(f, "instruction {at} uses register {register:?} before its definition")
            }
        }
    }
}

impl std::error::Error for ChunkError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Operand;
    use avail_core::IntegerRange;

    #[test]
    fn set_variable_refines_container_type() {
        let mut chunk = Chunk::new();
        let container = chunk.fresh_register(AvailType::Variable(Box::new(AvailType::Top)), 0);
        let value = chunk.fresh_register(AvailType::Integer(IntegerRange::exactly(1)), 0);
        chunk.push(Instruction::MoveConstant {
            dest: value,
            value: Operand::Immediate(1),
        });
        chunk.push(Instruction::SetVariable { container, value });
        let refined = &chunk.register_info(container).unwrap().static_type;
        assert_eq!(
            *refined,
            AvailType::Variable(Box::new(AvailType::Integer(IntegerRange::exactly(1))))
        );
    }

    #[test]
    fn verify_rejects_out_of_bounds_branch() {
        let mut chunk = Chunk::new();
        chunk.push(Instruction::Jump { target: 99 });
        assert!(matches!(chunk.verify(), Err(ChunkError::BranchOutOfBounds { .. })));
    }

    #[test]
    fn remap_rewrites_every_use() {
        let mut chunk = Chunk::new();
        let a = chunk.fresh_register(AvailType::Integer(IntegerRange::ALL), 0);
        let b = chunk.fresh_register(AvailType::Integer(IntegerRange::ALL), 0);
        chunk.push(Instruction::Return { value: a });
        let mut mapping = HashMap::new();
        mapping.insert(a, b);
        chunk.remap_registers(&mapping);
        assert_eq!(chunk.instructions()[0], Instruction::Return { value: b });
    }

    #[test]
    fn invalidation_is_observable() {
        let chunk = Chunk::new();
        assert!(chunk.is_valid());
        chunk.invalidate();
        assert!(!chunk.is_valid());
    }
}
