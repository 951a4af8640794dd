//! Instruction decoder.
//!
//! Turns the bytes at an instruction pointer into one [`Instruction`] with its operand
//! resolved against the code object's side tables. The decoder never executes anything;
//! it only validates that the stream and every index in it are in bounds.

use std::{fmt, rc::Rc};

use super::{
    code::{Code, Const},
    op::{CompareOp, HAVE_ARGUMENT, Opcode, OperandKind},
};

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<'a> {
    /// Offset of the first byte, including any `EXTENDED_ARG` prefix.
    pub offset: usize,
    /// Offset of the following instruction.
    pub next: usize,
    /// The raw opcode byte.
    pub byte: u8,
    /// `None` for bytes that name no known opcode. These decode fine and fault at dispatch.
    pub opcode: Option<Opcode>,
    pub operand: Operand<'a>,
    /// The raw argument with any `EXTENDED_ARG` prefix folded in, 0 for no-argument opcodes.
    pub arg: u32,
}

/// A resolved instruction argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    None,
    Const(&'a Const),
    /// Entry of `names`.
    Name(&'a Rc<str>),
    /// Entry of `varnames`.
    Local(&'a Rc<str>),
    /// Index into the frame's cells (`cellvars ++ freevars`), already bounds-checked.
    Free(usize),
    /// Absolute target offset, already bounds-checked.
    Jump(usize),
    Compare(CompareOp),
    Int(u32),
}

/// The instruction stream is malformed at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The instruction (or its argument bytes) would read past the end of the buffer.
    UnexpectedEnd,
    /// An argument index is outside the table its opcode designates.
    IndexOutOfRange { table: &'static str, index: u32, len: usize },
    /// A jump lands outside the instruction buffer.
    JumpOutOfRange { target: u64 },
    /// The `COMPARE_OP` argument names no comparison.
    BadCompare(u32),
    /// Too many chained `EXTENDED_ARG` prefixes for a 32-bit argument.
    ArgumentOverflow,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DecodeErrorKind::UnexpectedEnd => {
                write!(f, "instruction at offset {} reads past the end of the bytecode", self.offset)
            }
            DecodeErrorKind::IndexOutOfRange { table, index, len } => write!(
                f,
                "{table} index {index} out of range ({len} entries) at offset {}",
                self.offset
            ),
            DecodeErrorKind::JumpOutOfRange { target } => {
                write!(f, "jump target {target} out of range at offset {}", self.offset)
            }
            DecodeErrorKind::BadCompare(arg) => write!(f, "bad compare operator {arg} at offset {}", self.offset),
            DecodeErrorKind::ArgumentOverflow => write!(f, "EXTENDED_ARG overflow at offset {}", self.offset),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes the instruction starting at `offset`.
///
/// `EXTENDED_ARG` prefixes are folded into the instruction they extend, so the result never
/// has `opcode == Some(Opcode::ExtendedArg)`.
pub fn decode(code: &Code, offset: usize) -> Result<Instruction<'_>, DecodeError> {
    let bytes = &code.bytecode;
    let err = |kind| DecodeError { offset, kind };

    let mut pos = offset;
    let mut extended: u32 = 0;
    loop {
        let byte = *bytes.get(pos).ok_or_else(|| err(DecodeErrorKind::UnexpectedEnd))?;
        pos += 1;
        let has_arg = byte >= HAVE_ARGUMENT;
        let arg = if has_arg {
            let lo = *bytes.get(pos).ok_or_else(|| err(DecodeErrorKind::UnexpectedEnd))?;
            let hi = *bytes.get(pos + 1).ok_or_else(|| err(DecodeErrorKind::UnexpectedEnd))?;
            pos += 2;
            extended | u32::from(u16::from_le_bytes([lo, hi]))
        } else {
            0
        };

        let opcode = Opcode::from_repr(byte);
        if opcode == Some(Opcode::ExtendedArg) {
            if arg > u32::from(u16::MAX) {
                return Err(err(DecodeErrorKind::ArgumentOverflow));
            }
            extended = arg << 16;
            continue;
        }

        let operand = match opcode {
            Some(op) => resolve(code, op, arg, pos).map_err(err)?,
            None if has_arg => Operand::Int(arg),
            None => Operand::None,
        };
        return Ok(Instruction {
            offset,
            next: pos,
            byte,
            opcode,
            operand,
            arg,
        });
    }
}

fn resolve(code: &Code, opcode: Opcode, arg: u32, next: usize) -> Result<Operand<'_>, DecodeErrorKind> {
    let index = arg as usize;
    let out_of_range = |table, len| DecodeErrorKind::IndexOutOfRange { table, index: arg, len };
    let operand = match opcode.operand_kind() {
        OperandKind::None => Operand::None,
        OperandKind::Int => Operand::Int(arg),
        OperandKind::Const => Operand::Const(
            code.consts
                .get(index)
                .ok_or_else(|| out_of_range("consts", code.consts.len()))?,
        ),
        OperandKind::Name => Operand::Name(
            code.names
                .get(index)
                .ok_or_else(|| out_of_range("names", code.names.len()))?,
        ),
        OperandKind::Local => Operand::Local(
            code.varnames
                .get(index)
                .ok_or_else(|| out_of_range("varnames", code.varnames.len()))?,
        ),
        OperandKind::Free => {
            if index >= code.cell_count() {
                return Err(out_of_range("cells", code.cell_count()));
            }
            Operand::Free(index)
        }
        OperandKind::JumpRel => Operand::Jump(jump_target(code, next as u64 + u64::from(arg))?),
        OperandKind::JumpAbs => Operand::Jump(jump_target(code, u64::from(arg))?),
        OperandKind::Compare => {
            let op = u8::try_from(arg)
                .ok()
                .and_then(CompareOp::from_repr)
                .ok_or(DecodeErrorKind::BadCompare(arg))?;
            Operand::Compare(op)
        }
    };
    Ok(operand)
}

fn jump_target(code: &Code, target: u64) -> Result<usize, DecodeErrorKind> {
    usize::try_from(target)
        .ok()
        .filter(|t| *t < code.bytecode.len())
        .ok_or(DecodeErrorKind::JumpOutOfRange { target })
}

/// Iterator over every instruction of a code object, in stream order.
///
/// Stops after the first decode error.
pub struct Instructions<'a> {
    code: &'a Code,
    offset: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    #[must_use]
    pub fn new(code: &'a Code) -> Self {
        Self {
            code,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.code.bytecode.len() {
            return None;
        }
        let result = decode(self.code, self.offset);
        match &result {
            Ok(instr) => self.offset = instr.next,
            Err(_) => self.failed = true,
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::builder::CodeBuilder;

    fn raw(bytecode: Vec<u8>) -> Code {
        let mut code = CodeBuilder::new("t").build().expect("empty code builds");
        code.bytecode = bytecode;
        code
    }

    #[test]
    fn no_argument_opcode_advances_one() {
        let code = raw(vec![Opcode::Nop as u8, Opcode::ReturnValue as u8]);
        let instr = decode(&code, 0).unwrap();
        assert_eq!(instr.opcode, Some(Opcode::Nop));
        assert_eq!(instr.operand, Operand::None);
        assert_eq!(instr.next, 1);
    }

    #[test]
    fn const_operand_resolves() {
        let mut builder = CodeBuilder::new("t");
        builder.emit_load_const(Const::Int(42));
        builder.emit(Opcode::ReturnValue);
        let code = builder.build().unwrap();
        let instr = decode(&code, 0).unwrap();
        assert_eq!(instr.operand, Operand::Const(&Const::Int(42)));
        assert_eq!(instr.next, 3);
    }

    #[test]
    fn read_past_end_is_a_decode_fault() {
        let code = raw(vec![Opcode::LoadConst as u8, 0]);
        let err = decode(&code, 0).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnexpectedEnd);
        let err = decode(&code, 5).unwrap_err();
        assert_eq!(err.offset, 5);
        assert_eq!(err.kind, DecodeErrorKind::UnexpectedEnd);
    }

    #[test]
    fn index_out_of_range() {
        let code = raw(vec![Opcode::LoadName as u8, 3, 0]);
        let err = decode(&code, 0).unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::IndexOutOfRange {
                table: "names",
                index: 3,
                len: 0
            }
        );
    }

    #[test]
    fn extended_arg_folds_into_next_instruction() {
        // EXTENDED_ARG 1; UNPACK_SEQUENCE 2  => arg 0x1_0002
        let code = raw(vec![Opcode::ExtendedArg as u8, 1, 0, Opcode::UnpackSequence as u8, 2, 0]);
        let instr = decode(&code, 0).unwrap();
        assert_eq!(instr.opcode, Some(Opcode::UnpackSequence));
        assert_eq!(instr.operand, Operand::Int(0x1_0002));
        assert_eq!(instr.offset, 0);
        assert_eq!(instr.next, 6);
    }

    #[test]
    fn relative_jump_is_from_next_instruction() {
        let code = raw(vec![
            Opcode::JumpForward as u8,
            1,
            0,
            Opcode::Nop as u8,
            Opcode::ReturnValue as u8,
        ]);
        assert_eq!(decode(&code, 0).unwrap().operand, Operand::Jump(4));

        let bad = raw(vec![Opcode::JumpAbsolute as u8, 9, 0]);
        assert_eq!(
            decode(&bad, 0).unwrap_err().kind,
            DecodeErrorKind::JumpOutOfRange { target: 9 }
        );
    }

    #[test]
    fn unknown_opcode_decodes() {
        let code = raw(vec![0, 200, 7, 0]);
        let first = decode(&code, 0).unwrap();
        assert_eq!(first.opcode, None);
        assert_eq!(first.operand, Operand::None);
        let second = decode(&code, 1).unwrap();
        assert_eq!(second.byte, 200);
        assert_eq!(second.operand, Operand::Int(7));
    }

    #[test]
    fn iterator_walks_stream() {
        let code = raw(vec![Opcode::Nop as u8, Opcode::Nop as u8, Opcode::LoadFast as u8]);
        let decoded: Vec<_> = Instructions::new(&code).collect();
        assert_eq!(decoded.len(), 3);
        assert!(decoded[2].is_err());
    }
}
