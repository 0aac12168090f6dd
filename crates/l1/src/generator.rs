//! The Level One code generator (spec.md §4.1).
//!
//! Mirrors the teacher's `CodeGen` builder shape (`codegen::state::CodeGen`):
//! a stateful struct accumulating output and a handful of counters, built
//! incrementally through a sequence of emitter calls and finalized with a
//! single terminal method. Here the "output" is a packed nybble stream
//! instead of LLVM IR text, and "finalize" produces an
//! [`avail_core::CompiledCode`] instead of a function definition.
//!
//! Every emitter updates the statically-tracked operand-stack depth exactly
//! as the stack-delta table in spec.md §4.1 describes; `end_block` asserts
//! the block left exactly one value on the stack (its result) before
//! finalizing, the same contract-violation-is-fatal posture the spec
//! demands for stack depth mismatches.

use crate::opcode::{ExtendedOpcode, NybbleWriter, Opcode};
use avail_core::{
    AvailType, CompiledCode, FinalUse, FunctionType, GeneratorError, PrimitiveFlags,
    PrimitiveNumber, SlotClass, SlotKind, Value,
};

use crate::literal_pool::LiteralPool;

/// A declared local or outer slot: its static type and whether it backs a
/// plain value or a `Variable` cell.
#[derive(Debug, Clone)]
pub struct SlotDecl {
    pub slot_type: AvailType,
    pub kind: SlotKind,
}

impl SlotDecl {
    pub fn value(slot_type: AvailType) -> Self {
        SlotDecl {
            slot_type,
            kind: SlotKind::Value,
        }
    }

    pub fn variable(slot_type: AvailType) -> Self {
        SlotDecl {
            slot_type,
            kind: SlotKind::Variable,
        }
    }
}

struct ReadRecord {
    class: SlotClass,
    slot: u16,
    instruction_offset: usize,
}

/// Builds one compiled-code record, nybble by nybble.
pub struct Generator {
    writer: NybbleWriter,
    pool: LiteralPool,
    arg_types: Vec<AvailType>,
    locals: Vec<SlotDecl>,
    /// Index of the block's label local, if `start_block` declared one.
    /// Label slots may be pushed but never read or written (spec.md §4.1:
    /// "An attempt to `set` a label, which has no backing storage to
    /// write").
    label_slot: Option<u16>,
    outers: Vec<SlotDecl>,
    result_type: AvailType,
    stack_depth: i64,
    max_stack_depth: u16,
    statement_count: usize,
    reads: Vec<ReadRecord>,
    primitive: Option<(PrimitiveNumber, PrimitiveFlags)>,
    name: Option<String>,
}

impl Generator {
    /// Begin a new block. `locals[0]` is treated as the block's label slot
    /// when `has_label` is set, matching the invariant that a label
    /// declaration must be the first statement of its block.
    pub fn start_block(
        args: Vec<AvailType>,
        locals: Vec<SlotDecl>,
        has_label: bool,
        outers: Vec<SlotDecl>,
        result_type: AvailType,
    ) -> Self {
        Generator {
            writer: NybbleWriter::new(),
            pool: LiteralPool::new(),
            arg_types: args,
            label_slot: if has_label && !locals.is_empty() { Some(0) } else { None },
            locals,
            outers,
            result_type,
            stack_depth: 0,
            max_stack_depth: 0,
            statement_count: 0,
            reads: Vec::new(),
            primitive: None,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn here(&self) -> usize {
        self.writer.nybble_len()
    }

    fn adjust_stack(&mut self, delta: i64, at: usize) -> Result<(), GeneratorError> {
        self.stack_depth += delta;
        if self.stack_depth < 0 {
            return Err(GeneratorError::StackUnderflow { at_instruction: at });
        }
        self.max_stack_depth = self.max_stack_depth.max(self.stack_depth as u16);
        Ok(())
    }

    fn check_local(&self, index: u16) -> Result<(), GeneratorError> {
        if (index as usize) < self.locals.len() {
            Ok(())
        } else {
            Err(GeneratorError::UnknownVariable {
                index: index as usize,
                kind: "local",
            })
        }
    }

    fn check_outer(&self, index: u16) -> Result<(), GeneratorError> {
        if (index as usize) < self.outers.len() {
            Ok(())
        } else {
            Err(GeneratorError::UnknownVariable {
                index: index as usize,
                kind: "outer",
            })
        }
    }

    pub fn push_literal(&mut self, value: Value) -> Result<(), GeneratorError> {
        let at = self.here();
        let index = self.pool.intern(value);
        self.writer.push_nybble(Opcode::PushLiteral.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(1, at)
    }

    pub fn push_local(&mut self, index: u16) -> Result<(), GeneratorError> {
        self.check_local(index)?;
        let at = self.here();
        self.writer.push_nybble(Opcode::PushLocal.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(1, at)
    }

    pub fn push_outer(&mut self, index: u16) -> Result<(), GeneratorError> {
        self.check_outer(index)?;
        let at = self.here();
        self.writer.push_nybble(Opcode::PushOuter.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(1, at)
    }

    pub fn get_local(&mut self, index: u16) -> Result<(), GeneratorError> {
        self.check_local(index)?;
        if self.label_slot == Some(index) {
            return Err(GeneratorError::UnknownVariable {
                index: index as usize,
                kind: "local (label slots cannot be read)",
            });
        }
        let at = self.here();
        self.writer.push_nybble(Opcode::GetLocal.nybble());
        self.writer.push_varint(index as u64);
        self.reads.push(ReadRecord {
            class: SlotClass::Local,
            slot: index,
            instruction_offset: at,
        });
        self.adjust_stack(1, at)
    }

    pub fn get_outer(&mut self, index: u16) -> Result<(), GeneratorError> {
        self.check_outer(index)?;
        let at = self.here();
        self.writer.push_nybble(Opcode::GetOuter.nybble());
        self.writer.push_varint(index as u64);
        self.reads.push(ReadRecord {
            class: SlotClass::Outer,
            slot: index,
            instruction_offset: at,
        });
        self.adjust_stack(1, at)
    }

    pub fn set_local(&mut self, index: u16) -> Result<(), GeneratorError> {
        self.check_local(index)?;
        if self.label_slot == Some(index) {
            return Err(GeneratorError::CannotSetLabel);
        }
        let at = self.here();
        self.writer.push_nybble(Opcode::SetLocal.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(-1, at)
    }

    pub fn set_outer(&mut self, index: u16) -> Result<(), GeneratorError> {
        self.check_outer(index)?;
        let at = self.here();
        self.writer.push_nybble(Opcode::SetOuter.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(-1, at)
    }

    pub fn get_literal(&mut self, value: Value) -> Result<(), GeneratorError> {
        let at = self.here();
        let index = self.pool.intern(value);
        self.writer.push_nybble(Opcode::Extension.nybble());
        self.writer.push_nybble(ExtendedOpcode::GetLiteral.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(1, at)
    }

    pub fn set_literal(&mut self, value: Value) -> Result<(), GeneratorError> {
        let at = self.here();
        let index = self.pool.intern(value);
        self.writer.push_nybble(Opcode::Extension.nybble());
        self.writer.push_nybble(ExtendedOpcode::SetLiteral.nybble());
        self.writer.push_varint(index as u64);
        self.adjust_stack(-1, at)
    }

    pub fn get_type_at_depth(&mut self, depth: u16) -> Result<(), GeneratorError> {
        let at = self.here();
        if (depth as i64) >= self.stack_depth {
            return Err(GeneratorError::StackUnderflow { at_instruction: at });
        }
        self.writer.push_nybble(Opcode::GetTypeAtDepth.nybble());
        self.writer.push_varint(depth as u64);
        Ok(())
    }

    pub fn make_tuple(&mut self, n: u16) -> Result<(), GeneratorError> {
        let at = self.here();
        self.writer.push_nybble(Opcode::MakeTuple.nybble());
        self.writer.push_varint(n as u64);
        self.adjust_stack(-(n as i64 - 1), at)
    }

    pub fn pop(&mut self) -> Result<(), GeneratorError> {
        let at = self.here();
        self.writer.push_nybble(Opcode::Pop.nybble());
        self.adjust_stack(-1, at)
    }

    /// Emit a dynamically dispatched send of `message` (a literal atom)
    /// returning `return_type`, consuming `n` arguments already on the
    /// stack.
    pub fn call(&mut self, message: Value, return_type: Value, n: u16) -> Result<(), GeneratorError> {
        let at = self.here();
        let message_index = self.pool.intern(message);
        let return_type_index = self.pool.intern(return_type);
        self.writer.push_nybble(Opcode::Call.nybble());
        self.writer.push_varint(message_index as u64);
        self.writer.push_varint(return_type_index as u64);
        self.writer.push_varint(n as u64);
        self.adjust_stack(-(n as i64) + 1, at)
    }

    /// As [`Generator::call`], but additionally pops a tuple of argument
    /// types already pushed for the lookup (spec.md §4.1's super-send).
    pub fn super_call(
        &mut self,
        message: Value,
        return_type: Value,
        n: u16,
    ) -> Result<(), GeneratorError> {
        let at = self.here();
        let message_index = self.pool.intern(message);
        let return_type_index = self.pool.intern(return_type);
        self.writer.push_nybble(Opcode::SuperCall.nybble());
        self.writer.push_varint(message_index as u64);
        self.writer.push_varint(return_type_index as u64);
        self.writer.push_varint(n as u64);
        self.adjust_stack(-(2 * n as i64) + 1, at)
    }

    /// Build a closure over `code_index` (an index into the enclosing
    /// module's compiled-code literal table, resolved by `avail-vm`),
    /// consuming `k` outer values already on the stack.
    pub fn close_code(&mut self, code_index: u32, k: u16) -> Result<(), GeneratorError> {
        let at = self.here();
        self.writer.push_nybble(Opcode::CloseCode.nybble());
        self.writer.push_varint(code_index as u64);
        self.writer.push_varint(k as u64);
        self.adjust_stack(-(k as i64) + 1, at)
    }

    pub fn push_label(&mut self) -> Result<(), GeneratorError> {
        let Some(slot) = self.label_slot else {
            return Err(GeneratorError::UnknownVariable {
                index: 0,
                kind: "label (no label declared for this block)",
            });
        };
        let at = self.here();
        self.writer.push_nybble(Opcode::PushLabel.nybble());
        self.writer.push_varint(slot as u64);
        self.adjust_stack(1, at)
    }

    pub fn label_declaration(&mut self) -> Result<(), GeneratorError> {
        if self.statement_count != 0 {
            return Err(GeneratorError::LabelNotFirst);
        }
        if self.label_slot.is_none() {
            return Err(GeneratorError::UnknownVariable {
                index: 0,
                kind: "label (no label declared for this block)",
            });
        }
        self.writer.push_nybble(Opcode::LabelDeclaration.nybble());
        Ok(())
    }

    /// Mark the end of a top-level statement, advancing the counter
    /// `label_declaration` consults to enforce "first statement only".
    pub fn end_statement(&mut self) {
        self.statement_count += 1;
    }

    /// Attach a numbered primitive to this block (spec.md §6): the
    /// interpreter tries the primitive first and falls back to the
    /// generated nybblecode body only on primitive failure.
    pub fn primitive(&mut self, number: PrimitiveNumber, flags: PrimitiveFlags) {
        self.primitive = Some((number, flags));
    }

    /// Finalize the block: compute the maximum stack depth reached, run the
    /// final-use pass, and return the immutable compiled-code record.
    ///
    /// Fails only on the fatal, producer-side contract violations spec.md
    /// §4.1 calls out; none of them should be reachable through this
    /// struct's public API used correctly, which is why they are raised
    /// rather than silently patched over.
    pub fn end_block(self) -> Result<CompiledCode, GeneratorError> {
        if self.stack_depth != 1 {
            return Err(GeneratorError::StackUnderflow {
                at_instruction: self.here(),
            });
        }

        let mut final_uses: Vec<FinalUse> = Vec::new();
        for class in [SlotClass::Local, SlotClass::Outer] {
            let mut seen_slots = std::collections::HashSet::new();
            for read in self.reads.iter().filter(|r| r.class == class).rev() {
                if seen_slots.insert(read.slot) {
                    final_uses.push(FinalUse {
                        class,
                        slot: read.slot,
                        instruction_offset: read.instruction_offset,
                    });
                }
            }
        }

        let nybblecodes = self.writer.finish();
        let num_args = self.arg_types.len() as u16;
        let function_type = FunctionType {
            arguments: self.arg_types,
            result: Box::new(self.result_type),
        };
        let local_kinds: Vec<SlotKind> = self.locals.iter().map(|s| s.kind).collect();
        let outer_kinds: Vec<SlotKind> = self.outers.iter().map(|s| s.kind).collect();

        let mut code = CompiledCode::new(
            nybblecodes,
            num_args,
            self.locals.len() as u16,
            self.outers.len() as u16,
            self.max_stack_depth,
            function_type,
        )
        .with_literals(self.pool.into_vec())
        .with_local_kinds(local_kinds)
        .with_outer_kinds(outer_kinds)
        .with_final_uses(final_uses);

        if let Some((number, flags)) = self.primitive {
            code = code.with_primitive(number, flags);
        }
        if let Some(name) = self.name {
            code = code.with_name(name);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avail_core::IntegerRange;

    #[test]
    fn return_constant_block() {
        let mut r#gen = Generator::start_block(
            vec![],
            vec![],
            false,
            vec![],
            AvailType::Integer(IntegerRange::ALL),
        );
        r#gen.push_literal(Value::Integer(1)).unwrap();
        let code = r#gen.end_block().unwrap();
        assert_eq!(code.max_stack_depth(), 1);
        assert_eq!(code.literals(), &[Value::Integer(1)]);
    }

    #[test]
    fn underflow_is_reported() {
        let mut r#gen = Generator::start_block(
            vec![],
            vec![],
            false,
            vec![],
            AvailType::Integer(IntegerRange::ALL),
        );
        let err = r#gen.pop().unwrap_err();
        assert!(matches!(err, GeneratorError::StackUnderflow { .. }));
    }

    #[test]
    fn label_must_be_first_statement() {
        let mut r#gen = Generator::start_block(
            vec![],
            vec![SlotDecl::value(AvailType::Continuation)],
            true,
            vec![],
            AvailType::Continuation,
        );
        r#gen.push_literal(Value::Integer(0)).unwrap();
        r#gen.end_statement();
        let err = r#gen.label_declaration().unwrap_err();
        assert!(matches!(err, GeneratorError::LabelNotFirst));
    }

    #[test]
    fn cannot_set_a_label() {
        let mut r#gen = Generator::start_block(
            vec![],
            vec![SlotDecl::value(AvailType::Continuation)],
            true,
            vec![],
            AvailType::Continuation,
        );
        let err = r#gen.set_local(0).unwrap_err();
        assert!(matches!(err, GeneratorError::CannotSetLabel));
    }

    #[test]
    fn final_use_marks_last_read_only() {
        let mut r#gen = Generator::start_block(
            vec![AvailType::Integer(IntegerRange::ALL)],
            vec![SlotDecl::value(AvailType::Integer(IntegerRange::ALL))],
            false,
            vec![],
            AvailType::Integer(IntegerRange::ALL),
        );
        r#gen.get_local(0).unwrap();
        r#gen.pop().unwrap();
        r#gen.get_local(0).unwrap();
        let code = r#gen.end_block().unwrap();
        let local_final_uses: Vec<_> = code
            .final_uses()
            .iter()
            .filter(|f| f.class == avail_core::SlotClass::Local && f.slot == 0)
            .collect();
        assert_eq!(local_final_uses.len(), 1);
    }
}
