//! Avail L2: the register-based intermediate representation Level One
//! compiled code may be optimized into (spec.md §4.2).
//!
//! L2 is advisory: [`Chunk`] models the "any L2 chunk may be invalidated at
//! any time" contract with a single atomic flag, and `avail-vm` is expected
//! to fall back to interpreting the L1 body directly whenever it observes
//! `!chunk.is_valid()`. No translator from L1 to L2 is specified here, by
//! design — this crate specifies L2's contract *toward* such a translator,
//! not the translator itself.

pub mod chunk;
pub mod instruction;
pub mod register;

pub use chunk::{Chunk, ChunkError};
pub use instruction::Instruction;
pub use register::{Operand, RegisterId, RegisterInfo};
