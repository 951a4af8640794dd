//! Code object: compiled bytecode plus the side tables its operands index.

use std::{fmt, rc::Rc};

use serde::{Deserialize, Serialize};

/// Flag bits stored in [`Code::flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeFlags(u32);

impl CodeFlags {
    /// The code takes `*args`.
    pub const VARARGS: Self = Self(0x04);
    /// The code takes `**kwargs`.
    pub const VARKEYWORDS: Self = Self(0x08);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for CodeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// An entry of the constant pool.
///
/// Constants are plain data so a code object can be serialized; `LOAD_CONST` turns them into
/// runtime values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Vec<Const>),
    /// A nested code object, the body of a function defined inside this one.
    Code(Rc<Code>),
}

impl From<i64> for Const {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Const {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Const {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Const {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<Code> for Const {
    fn from(value: Code) -> Self {
        Self::Code(Rc::new(value))
    }
}

/// A compiled unit of bytecode.
///
/// Immutable once built. Every frame executing this code shares it through an `Rc`.
///
/// `varnames` starts with the parameters in binding order: `arg_count` positional names,
/// `kwonly_arg_count` keyword-only names, then the `*args` name if [`CodeFlags::VARARGS`]
/// is set, then the `**kwargs` name if [`CodeFlags::VARKEYWORDS`] is set. Other locals
/// follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    /// Name shown in tracebacks and error messages (`<module>` for top-level code).
    pub name: Rc<str>,
    /// Raw instruction stream.
    pub bytecode: Vec<u8>,
    pub consts: Vec<Const>,
    /// Global and module-level names, indexed by the `*_NAME`/`*_GLOBAL` opcodes.
    pub names: Vec<Rc<str>>,
    /// Fast locals, indexed by the `*_FAST` opcodes.
    pub varnames: Vec<Rc<str>>,
    /// Locals captured by nested functions. Indexed first by the deref opcodes.
    pub cellvars: Vec<Rc<str>>,
    /// Variables captured from an enclosing function. Indexed after `cellvars`.
    pub freevars: Vec<Rc<str>>,
    pub arg_count: usize,
    pub kwonly_arg_count: usize,
    pub flags: CodeFlags,
    /// Capacity hint for the operand stack.
    pub stack_size: usize,
}

impl Code {
    /// Serializes the code object with postcard.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserializes a code object previously produced by [`Code::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Number of parameter slots at the start of `varnames`.
    #[must_use]
    pub fn total_arg_count(&self) -> usize {
        let mut total = self.arg_count + self.kwonly_arg_count;
        if self.flags.contains(CodeFlags::VARARGS) {
            total += 1;
        }
        if self.flags.contains(CodeFlags::VARKEYWORDS) {
            total += 1;
        }
        total
    }

    /// Name of the cell at deref index `index` (cellvars first, then freevars).
    #[must_use]
    pub fn cell_name(&self, index: usize) -> Option<&Rc<str>> {
        self.cellvars
            .get(index)
            .or_else(|| index.checked_sub(self.cellvars.len()).and_then(|i| self.freevars.get(i)))
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cellvars.len() + self.freevars.len()
    }
}

impl fmt::Display for Code {
    /// Disassembly listing, see [`crate::bytecode::dis`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::dis::disassemble_fmt(self, f)
    }
}
