//! Human-readable disassembly, in the layout of Python's `dis` module.
//!
//! ```text
//!   0 LOAD_CONST                 0 (2)
//!   3 LOAD_CONST                 1 (3)
//!   6 BINARY_ADD
//!   7 RETURN_VALUE
//! ```

use std::fmt::{self, Write};

use super::{
    code::{Code, Const},
    decode::{Instruction, Instructions, Operand},
};
use crate::value::Value;

/// Writes the listing of `code` and of every code object nested in its constants.
pub(crate) fn disassemble_fmt(code: &Code, f: &mut impl Write) -> fmt::Result {
    for instr in Instructions::new(code) {
        match instr {
            Ok(instr) => {
                instruction_fmt(code, &instr, f)?;
                f.write_char('\n')?;
            }
            Err(err) => writeln!(f, "{:>4} <{err}>", err.offset)?,
        }
    }
    for nested in code.consts.iter().filter_map(|c| match c {
        Const::Code(nested) => Some(nested),
        _ => None,
    }) {
        writeln!(f, "\nDisassembly of {}:", nested.name)?;
        disassemble_fmt(nested, f)?;
    }
    Ok(())
}

/// One listing line, without the trailing newline.
pub(crate) fn instruction_fmt(code: &Code, instr: &Instruction<'_>, f: &mut impl Write) -> fmt::Result {
    write!(f, "{:>4} ", instr.offset)?;
    match instr.opcode {
        Some(op) if op.has_arg() => write!(f, "{:<24} {:>3}", op.name(), instr.arg)?,
        Some(op) => f.write_str(op.name())?,
        None => write!(f, "<{}>", instr.byte)?,
    }
    match &instr.operand {
        Operand::None | Operand::Int(_) => Ok(()),
        Operand::Const(c) => write!(f, " ({})", Value::from_const(c).py_repr()),
        Operand::Name(name) | Operand::Local(name) => write!(f, " ({name})"),
        Operand::Free(index) => match code.cell_name(*index) {
            Some(name) => write!(f, " ({name})"),
            None => Ok(()),
        },
        Operand::Jump(target) => write!(f, " (to {target})"),
        Operand::Compare(op) => write!(f, " ({})", op.symbol()),
    }
}

/// Single-instruction rendering used by trace logging.
pub(crate) fn instruction_string(code: &Code, instr: &Instruction<'_>) -> String {
    let mut out = String::new();
    let _ = instruction_fmt(code, instr, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use crate::bytecode::{
        builder::CodeBuilder,
        code::Const,
        op::{CompareOp, Opcode},
    };

    #[test]
    fn listing() {
        let mut b = CodeBuilder::new("<module>");
        b.emit_load_const(Const::Int(3));
        b.emit_name(Opcode::StoreName, "x");
        b.emit_name(Opcode::LoadName, "x");
        b.emit_load_const(Const::Int(5));
        b.emit_compare(CompareOp::Lt);
        let no = b.new_label();
        b.emit_jump(Opcode::PopJumpIfFalse, no);
        b.emit_load_const("yes");
        b.emit(Opcode::ReturnValue);
        b.bind(no);
        b.emit_load_const("no");
        b.emit(Opcode::ReturnValue);
        let code = b.build().unwrap();

        let expected = "   0 LOAD_CONST                 0 (3)
   3 STORE_NAME                 0 (x)
   6 LOAD_NAME                  0 (x)
   9 LOAD_CONST                 1 (5)
  12 COMPARE_OP                 0 (<)
  15 POP_JUMP_IF_FALSE         22 (to 22)
  18 LOAD_CONST                 2 ('yes')
  21 RETURN_VALUE
  22 LOAD_CONST                 3 ('no')
  25 RETURN_VALUE
";
        assert_eq!(code.to_string(), expected);
    }

    #[test]
    fn nested_and_broken_code() {
        let mut inner = CodeBuilder::new("f");
        inner.emit_load_const(Const::None);
        inner.emit(Opcode::ReturnValue);
        let mut outer = CodeBuilder::new("<module>");
        outer.emit_load_const(inner.build().unwrap());
        let mut code = outer.build().unwrap();
        code.bytecode.push(Opcode::LoadConst as u8);

        let listing = code.to_string();
        assert!(listing.contains("(<code object f>)"), "{listing}");
        assert!(listing.contains("reads past the end"), "{listing}");
        assert!(listing.contains("Disassembly of f:\n   0 LOAD_CONST"), "{listing}");
    }
}
