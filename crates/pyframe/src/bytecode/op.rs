//! Opcode definitions for the bytecode VM.
//!
//! Bytecode is stored as raw `Vec<u8>`. The `Opcode` enum is a pure discriminant with no
//! data - operands are fetched separately from the byte stream by the decoder.
//!
//! # Operand Encoding
//!
//! - Opcodes below [`HAVE_ARGUMENT`] take no operand and occupy one byte.
//! - Opcodes at or above [`HAVE_ARGUMENT`] are followed by a 2-byte little-endian argument.
//! - `EXTENDED_ARG` supplies the high 16 bits of the following instruction's argument.
//!
//! Discriminants follow the classic CPython 2.7 numbering for the instructions provided,
//! so a disassembly reads the way Python programmers expect.

use strum::{FromRepr, IntoStaticStr};

/// First opcode that carries a 2-byte argument.
pub const HAVE_ARGUMENT: u8 = 90;

/// Opcode discriminant - just identifies the instruction type.
///
/// With `#[repr(u8)]`, each opcode is exactly 1 byte. Uses `strum::FromRepr` for
/// byte-to-opcode conversion and `IntoStaticStr` for the disassembly name.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    // === Stack Operations (no operand) ===
    /// Discard top of stack.
    PopTop = 1,
    /// Swap top two: [a, b] -> [b, a].
    RotTwo = 2,
    /// Rotate top three: [a, b, c] -> [c, a, b].
    RotThree = 3,
    /// Duplicate top of stack.
    DupTop = 4,
    /// Rotate top four: [a, b, c, d] -> [d, a, b, c].
    RotFour = 5,
    /// No operation.
    Nop = 9,

    // === Unary Operations (operator table) ===
    UnaryPositive = 10,
    UnaryNegative = 11,
    UnaryNot = 12,
    UnaryInvert = 15,

    // === Binary Operations (operator table) ===
    /// Matrix multiply. Has no operator-table entry.
    BinaryMatrixMultiply = 16,
    BinaryPower = 19,
    BinaryMultiply = 20,
    BinaryModulo = 22,
    BinaryAdd = 23,
    BinarySubtract = 24,
    /// a[b]: pop index, pop obj, push result.
    BinarySubscr = 25,
    BinaryFloorDivide = 26,
    BinaryTrueDivide = 27,
    InplaceFloorDivide = 28,
    InplaceTrueDivide = 29,

    /// Pop key, value and dict: dict[key] = value, push dict back.
    StoreMap = 54,
    InplaceAdd = 55,
    InplaceSubtract = 56,
    InplaceMultiply = 57,
    InplaceModulo = 59,
    /// obj[key] = value: stack is [value, obj, key].
    StoreSubscr = 60,
    /// del obj[key]: stack is [obj, key].
    DeleteSubscr = 61,
    BinaryLshift = 62,
    BinaryRshift = 63,
    BinaryAnd = 64,
    BinaryXor = 65,
    BinaryOr = 66,
    InplacePower = 67,
    /// Replace TOS with an iterator over it.
    GetIter = 68,
    InplaceLshift = 75,
    InplaceRshift = 76,
    InplaceAnd = 77,
    InplaceXor = 78,
    InplaceOr = 79,

    // === Block Control (no operand) ===
    /// Raise a `break` signal.
    BreakLoop = 80,
    /// Pop TOS and raise a `return` signal.
    ReturnValue = 83,
    /// Close the innermost block.
    PopBlock = 87,
    /// End of a finally/except cleanup segment: re-issue the pending signal.
    EndFinally = 88,
    /// End of an except handler body: the pending exception is handled.
    PopExcept = 89,

    // === Names (argument) ===
    /// Pop TOS into the local mapping. Operand: name index.
    StoreName = 90,
    /// Operand: name index.
    DeleteName = 91,
    /// Unpack TOS into n values. Operand: count.
    UnpackSequence = 92,
    /// Advance the iterator at TOS or pop it and jump. Operand: relative jump.
    ForIter = 93,
    /// Operand: name index.
    StoreGlobal = 97,
    /// Operand: name index.
    DeleteGlobal = 98,
    /// Push constant from pool. Operand: const index.
    LoadConst = 100,
    /// Look up locals, globals then builtins. Operand: name index.
    LoadName = 101,
    /// Operand: item count.
    BuildTuple = 102,
    /// Operand: item count.
    BuildList = 103,
    /// Push an empty dict. Operand: size hint.
    BuildMap = 105,
    /// Operand: index into the compare-operator list.
    CompareOp = 107,

    // === Jumps ===
    /// Operand: relative jump.
    JumpForward = 110,
    /// Operand: absolute jump.
    JumpIfFalseOrPop = 111,
    /// Operand: absolute jump.
    JumpIfTrueOrPop = 112,
    /// Operand: absolute jump.
    JumpAbsolute = 113,
    /// Operand: absolute jump.
    PopJumpIfFalse = 114,
    /// Operand: absolute jump.
    PopJumpIfTrue = 115,
    /// Look up globals then builtins. Operand: name index.
    LoadGlobal = 116,

    // === Blocks ===
    /// Raise a `continue` signal. Operand: absolute jump (loop head).
    ContinueLoop = 119,
    /// Operand: relative jump (loop exit).
    SetupLoop = 120,
    /// Operand: relative jump (handler).
    SetupExcept = 121,
    /// Operand: relative jump (finally body).
    SetupFinally = 122,

    // === Fast locals ===
    /// Operand: local index.
    LoadFast = 124,
    /// Operand: local index.
    StoreFast = 125,
    /// Operand: local index.
    DeleteFast = 126,

    // === Functions & Exceptions ===
    /// Operand: argument count (0, 1 or 2).
    RaiseVarargs = 130,
    /// Operand: low byte positional count, high byte keyword pair count.
    CallFunction = 131,
    /// Operand: low byte positional default count, high byte keyword-only default pair count.
    MakeFunction = 132,
    /// Like `MakeFunction`, with a tuple of cells below the code object.
    MakeClosure = 134,
    /// Push the cell itself. Operand: cell index.
    LoadClosure = 135,
    /// Push the cell contents. Operand: cell index.
    LoadDeref = 136,
    /// Pop TOS into a cell. Operand: cell index.
    StoreDeref = 137,
    /// Operand: high 16 bits of the next instruction's argument.
    ExtendedArg = 145,
}

impl Opcode {
    /// Whether the opcode is followed by a 2-byte argument.
    #[must_use]
    pub fn has_arg(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }

    /// Disassembly name, e.g. `LOAD_CONST`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Which side table (if any) the argument of this opcode indexes.
    #[must_use]
    pub fn operand_kind(self) -> OperandKind {
        match self {
            Self::LoadConst => OperandKind::Const,
            Self::StoreName
            | Self::DeleteName
            | Self::LoadName
            | Self::StoreGlobal
            | Self::DeleteGlobal
            | Self::LoadGlobal => OperandKind::Name,
            Self::LoadFast | Self::StoreFast | Self::DeleteFast => OperandKind::Local,
            Self::LoadClosure | Self::LoadDeref | Self::StoreDeref => OperandKind::Free,
            Self::ForIter | Self::JumpForward | Self::SetupLoop | Self::SetupExcept | Self::SetupFinally => {
                OperandKind::JumpRel
            }
            Self::JumpIfFalseOrPop
            | Self::JumpIfTrueOrPop
            | Self::JumpAbsolute
            | Self::PopJumpIfFalse
            | Self::PopJumpIfTrue
            | Self::ContinueLoop => OperandKind::JumpAbs,
            Self::CompareOp => OperandKind::Compare,
            op if op.has_arg() => OperandKind::Int,
            _ => OperandKind::None,
        }
    }

    /// Operator-table routing for opcodes without a dedicated handler.
    #[must_use]
    pub fn operator(self) -> Option<Operator> {
        let op = match self {
            Self::UnaryPositive => Operator::Unary(UnaryOp::Positive),
            Self::UnaryNegative => Operator::Unary(UnaryOp::Negative),
            Self::UnaryNot => Operator::Unary(UnaryOp::Not),
            Self::UnaryInvert => Operator::Unary(UnaryOp::Invert),
            Self::BinaryMatrixMultiply => Operator::Binary(BinaryOp::MatrixMultiply),
            Self::BinaryPower => Operator::Binary(BinaryOp::Power),
            Self::BinaryMultiply => Operator::Binary(BinaryOp::Multiply),
            Self::BinaryModulo => Operator::Binary(BinaryOp::Modulo),
            Self::BinaryAdd => Operator::Binary(BinaryOp::Add),
            Self::BinarySubtract => Operator::Binary(BinaryOp::Subtract),
            Self::BinarySubscr => Operator::Binary(BinaryOp::Subscr),
            Self::BinaryFloorDivide => Operator::Binary(BinaryOp::FloorDivide),
            Self::BinaryTrueDivide => Operator::Binary(BinaryOp::TrueDivide),
            Self::BinaryLshift => Operator::Binary(BinaryOp::Lshift),
            Self::BinaryRshift => Operator::Binary(BinaryOp::Rshift),
            Self::BinaryAnd => Operator::Binary(BinaryOp::And),
            Self::BinaryXor => Operator::Binary(BinaryOp::Xor),
            Self::BinaryOr => Operator::Binary(BinaryOp::Or),
            Self::InplaceFloorDivide => Operator::Inplace(BinaryOp::FloorDivide),
            Self::InplaceTrueDivide => Operator::Inplace(BinaryOp::TrueDivide),
            Self::InplaceAdd => Operator::Inplace(BinaryOp::Add),
            Self::InplaceSubtract => Operator::Inplace(BinaryOp::Subtract),
            Self::InplaceMultiply => Operator::Inplace(BinaryOp::Multiply),
            Self::InplaceModulo => Operator::Inplace(BinaryOp::Modulo),
            Self::InplacePower => Operator::Inplace(BinaryOp::Power),
            Self::InplaceLshift => Operator::Inplace(BinaryOp::Lshift),
            Self::InplaceRshift => Operator::Inplace(BinaryOp::Rshift),
            Self::InplaceAnd => Operator::Inplace(BinaryOp::And),
            Self::InplaceXor => Operator::Inplace(BinaryOp::Xor),
            Self::InplaceOr => Operator::Inplace(BinaryOp::Or),
            _ => return None,
        };
        Some(op)
    }

    /// Net change in operand-stack depth when the instruction falls through.
    ///
    /// Jumps report the non-jumping path (`FOR_ITER` pushes the next item,
    /// `JUMP_IF_*_OR_POP` pops the tested value). Block-driven pushes made while
    /// unwinding are not counted.
    #[must_use]
    pub fn stack_effect(self, arg: u32) -> i32 {
        let arg = i32::try_from(arg).unwrap_or(i32::MAX);
        let low = arg & 0xff;
        let high = (arg >> 8) & 0xff;
        match self {
            Self::PopTop | Self::ReturnValue => -1,
            Self::RotTwo | Self::RotThree | Self::RotFour | Self::Nop => 0,
            Self::DupTop => 1,
            Self::UnaryPositive | Self::UnaryNegative | Self::UnaryNot | Self::UnaryInvert => 0,
            Self::GetIter | Self::BreakLoop | Self::PopBlock | Self::EndFinally | Self::PopExcept => 0,
            Self::StoreSubscr => -3,
            Self::DeleteSubscr => -2,
            Self::StoreMap => -2,
            Self::StoreName | Self::StoreGlobal | Self::StoreFast | Self::StoreDeref => -1,
            Self::DeleteName | Self::DeleteGlobal | Self::DeleteFast => 0,
            Self::UnpackSequence => arg - 1,
            Self::ForIter => 1,
            Self::LoadConst | Self::LoadName | Self::LoadGlobal | Self::LoadFast => 1,
            Self::LoadClosure | Self::LoadDeref => 1,
            Self::BuildTuple | Self::BuildList => 1 - arg,
            Self::BuildMap => 1,
            Self::CompareOp => -1,
            Self::JumpForward | Self::JumpAbsolute | Self::ContinueLoop | Self::ExtendedArg => 0,
            Self::JumpIfFalseOrPop | Self::JumpIfTrueOrPop | Self::PopJumpIfFalse | Self::PopJumpIfTrue => -1,
            Self::SetupLoop | Self::SetupExcept | Self::SetupFinally => 0,
            Self::RaiseVarargs => -arg,
            Self::CallFunction => -(low + 2 * high),
            Self::MakeFunction => -(low + 2 * high),
            Self::MakeClosure => -(low + 2 * high) - 1,
            op => match op.operator() {
                Some(Operator::Unary(_)) => 0,
                Some(Operator::Binary(_) | Operator::Inplace(_)) => -1,
                None => 0,
            },
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_repr(byte).ok_or(InvalidOpcodeError(byte))
    }
}

/// Error returned when attempting to convert an invalid byte to an Opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOpcodeError(pub u8);

impl std::fmt::Display for InvalidOpcodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid opcode byte: {}", self.0)
    }
}

impl std::error::Error for InvalidOpcodeError {}

/// The side table an instruction argument is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No argument bytes.
    None,
    /// Constant pool index.
    Const,
    /// `names` table index (globals and module-level names).
    Name,
    /// `varnames` table index.
    Local,
    /// Index into `cellvars ++ freevars`.
    Free,
    /// Offset relative to the end of the instruction.
    JumpRel,
    /// Absolute offset.
    JumpAbs,
    /// Index into [`CompareOp`].
    Compare,
    /// Raw integer.
    Int,
}

/// Routing of an opcode through the unary or binary operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// In-place form of a binary operator (`a += b`).
    Inplace(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
    Invert,
}

impl UnaryOp {
    /// Operator symbol for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Positive => "unary +",
            Self::Negative => "unary -",
            Self::Not => "not",
            Self::Invert => "unary ~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Power,
    Multiply,
    MatrixMultiply,
    Modulo,
    Add,
    Subtract,
    Subscr,
    FloorDivide,
    TrueDivide,
    Lshift,
    Rshift,
    And,
    Xor,
    Or,
}

impl BinaryOp {
    /// Operator symbol for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Power => "** or pow()",
            Self::Multiply => "*",
            Self::MatrixMultiply => "@",
            Self::Modulo => "%",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Subscr => "[]",
            Self::FloorDivide => "//",
            Self::TrueDivide => "/",
            Self::Lshift => "<<",
            Self::Rshift => ">>",
            Self::And => "&",
            Self::Xor => "^",
            Self::Or => "|",
        }
    }
}

/// Comparison selected by the `COMPARE_OP` argument.
///
/// Order matches the classic `dis.cmp_op` list.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
pub enum CompareOp {
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "is not")]
    IsNot,
    #[strum(serialize = "exception match")]
    ExceptionMatch,
}

impl CompareOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.into()
    }
}
