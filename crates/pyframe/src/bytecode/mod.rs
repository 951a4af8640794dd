//! Bytecode representation and the virtual machine that executes it.
//!
//! # Module Structure
//!
//! - `op` - Opcode numbering and operator routing
//! - `code` - Code objects: instructions plus their side tables
//! - `builder` - `CodeBuilder` for assembling code objects with labels
//! - `decode` - Instruction decoding with operand resolution
//! - `dis` - Disassembly text
//! - `vm` - Frames, block stack and the dispatch loop

mod builder;
mod code;
mod decode;
pub(crate) mod dis;
mod op;
mod vm;

pub use builder::{BuildError, CodeBuilder, Label};
pub use code::{Code, CodeFlags, Const};
pub use decode::{DecodeError, DecodeErrorKind, Instruction, Instructions, Operand, decode};
pub use op::{BinaryOp, CompareOp, HAVE_ARGUMENT, InvalidOpcodeError, Opcode, OperandKind, Operator, UnaryOp};
pub(crate) use vm::binary_op;
pub use vm::VM;
