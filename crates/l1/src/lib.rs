//! Avail L1: the Level One nybblecode generator (spec.md §4.1).
//!
//! Translates a typed block description into an [`avail_core::CompiledCode`]
//! record through [`Generator`], a stateful builder in the same style as
//! the teacher's LLVM-IR-emitting `CodeGen`, retargeted from text assembly
//! to packed nybblecodes.
//!
//! # Modules
//!
//! - `opcode`: the sixteen single-nybble opcodes, the extended-opcode
//!   escape, and the variable-length nybble integer encoding
//! - `literal_pool`: deduplicating literal interning
//! - `generator`: the `start_block`/emitters/`end_block` builder contract

pub mod generator;
pub mod literal_pool;
pub mod opcode;

pub use generator::{Generator, SlotDecl};
pub use literal_pool::LiteralPool;
pub use opcode::{ExtendedOpcode, NybbleReader, NybbleWriter, Opcode};
