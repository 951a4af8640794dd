//! Assembler for code objects.
//!
//! `CodeBuilder` is what an external compiler (or a test) uses to produce a [`Code`]: it
//! interns operands into the side tables, encodes arguments (inserting `EXTENDED_ARG` when
//! needed), patches forward jumps through labels and tracks the operand-stack depth to fill
//! in `stack_size`.
//!
//! Emission never fails directly; the first problem is remembered and reported by
//! [`CodeBuilder::build`].

use std::{fmt, rc::Rc};

use super::{
    code::{Code, CodeFlags, Const},
    op::{CompareOp, Opcode, OperandKind},
};

/// A jump target that may be bound after jumps to it are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// A jump emitted before its label was bound.
#[derive(Debug)]
struct Patch {
    /// Offset of the jump opcode byte.
    at: usize,
    label: Label,
    relative: bool,
}

/// Errors reported by [`CodeBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// An argument-taking opcode was emitted without an argument, or the reverse.
    ArgumentMismatch(Opcode),
    /// A jump was emitted with an opcode that is not a jump, or a jump through `emit_arg`.
    NotAJump(Opcode),
    /// A label was jumped to but never bound.
    UnboundLabel,
    /// A label was bound twice.
    LabelRebound,
    /// Relative jumps only go forward.
    BackwardRelativeJump { at: usize },
    /// Jump arguments are a fixed two bytes.
    JumpTooFar { at: usize },
    /// A deref opcode named a variable in neither `cellvars` nor `freevars`.
    UnknownCell(Rc<str>),
    /// Parameters must come before every other local in `varnames`.
    ParamsAfterLocals,
    /// Parameter kinds were declared out of order (positional, keyword-only, `*args`, `**kwargs`).
    ParamOrder,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentMismatch(op) => write!(f, "wrong argument form for {}", op.name()),
            Self::NotAJump(op) => write!(f, "{} is not a jump", op.name()),
            Self::UnboundLabel => f.write_str("jump to a label that was never bound"),
            Self::LabelRebound => f.write_str("label bound twice"),
            Self::BackwardRelativeJump { at } => write!(f, "backward relative jump at offset {at}"),
            Self::JumpTooFar { at } => write!(f, "jump at offset {at} does not fit in two bytes"),
            Self::UnknownCell(name) => write!(f, "'{name}' is neither a cell nor a free variable"),
            Self::ParamsAfterLocals => f.write_str("parameters declared after other locals"),
            Self::ParamOrder => f.write_str("parameter kinds declared out of order"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Builds a [`Code`] instruction by instruction.
///
/// ```
/// use pyframe::{CodeBuilder, Const, Opcode};
///
/// let mut builder = CodeBuilder::new("<module>");
/// builder.emit_load_const(Const::Int(2));
/// builder.emit_load_const(Const::Int(3));
/// builder.emit(Opcode::BinaryAdd);
/// builder.emit(Opcode::ReturnValue);
/// let code = builder.build().unwrap();
/// assert_eq!(code.stack_size, 2);
/// ```
#[derive(Debug)]
pub struct CodeBuilder {
    name: Rc<str>,
    bytecode: Vec<u8>,
    consts: Vec<Const>,
    names: Vec<Rc<str>>,
    varnames: Vec<Rc<str>>,
    cellvars: Vec<Rc<str>>,
    freevars: Vec<Rc<str>>,
    arg_count: usize,
    kwonly_arg_count: usize,
    flags: CodeFlags,
    /// Offset each label is bound to, by label index.
    labels: Vec<Option<usize>>,
    patches: Vec<Patch>,
    depth: i64,
    max_depth: i64,
    error: Option<BuildError>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            bytecode: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            cellvars: Vec::new(),
            freevars: Vec::new(),
            arg_count: 0,
            kwonly_arg_count: 0,
            flags: CodeFlags::empty(),
            labels: Vec::new(),
            patches: Vec::new(),
            depth: 0,
            max_depth: 0,
            error: None,
        }
    }

    // --- signature ---

    /// Declares the positional parameters.
    #[must_use]
    pub fn with_args(mut self, names: &[&str]) -> Self {
        if self.kwonly_arg_count > 0 || self.star_param_count() > 0 {
            self.fail(BuildError::ParamOrder);
        }
        self.push_params(names);
        self.arg_count += names.len();
        self
    }

    /// Declares keyword-only parameters. Call after [`CodeBuilder::with_args`].
    #[must_use]
    pub fn with_kwonly_args(mut self, names: &[&str]) -> Self {
        if self.star_param_count() > 0 {
            self.fail(BuildError::ParamOrder);
        }
        self.push_params(names);
        self.kwonly_arg_count += names.len();
        self
    }

    /// Declares a `*name` parameter collecting extra positional arguments.
    #[must_use]
    pub fn with_varargs(mut self, name: &str) -> Self {
        if self.star_param_count() > 0 {
            self.fail(BuildError::ParamOrder);
        }
        self.push_params(&[name]);
        self.flags |= CodeFlags::VARARGS;
        self
    }

    /// Declares a `**name` parameter collecting extra keyword arguments.
    #[must_use]
    pub fn with_varkeywords(mut self, name: &str) -> Self {
        if self.flags.contains(CodeFlags::VARKEYWORDS) {
            self.fail(BuildError::ParamOrder);
        }
        self.push_params(&[name]);
        self.flags |= CodeFlags::VARKEYWORDS;
        self
    }

    /// Declares locals that nested functions capture.
    #[must_use]
    pub fn with_cellvars(mut self, names: &[&str]) -> Self {
        self.cellvars.extend(names.iter().map(|n| Rc::from(*n)));
        self
    }

    /// Declares variables captured from the enclosing function.
    #[must_use]
    pub fn with_freevars(mut self, names: &[&str]) -> Self {
        self.freevars.extend(names.iter().map(|n| Rc::from(*n)));
        self
    }

    fn push_params(&mut self, names: &[&str]) {
        let declared = self.arg_count + self.kwonly_arg_count + self.star_param_count();
        if self.varnames.len() != declared {
            self.fail(BuildError::ParamsAfterLocals);
        }
        self.varnames.extend(names.iter().map(|n| Rc::from(*n)));
    }

    fn star_param_count(&self) -> usize {
        usize::from(self.flags.contains(CodeFlags::VARARGS)) + usize::from(self.flags.contains(CodeFlags::VARKEYWORDS))
    }

    // --- emission ---

    /// Offset the next emitted instruction will start at.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.bytecode.len()
    }

    /// Emits an opcode that takes no argument.
    pub fn emit(&mut self, op: Opcode) {
        if op.has_arg() {
            self.fail(BuildError::ArgumentMismatch(op));
            return;
        }
        self.bytecode.push(op as u8);
        self.track(op, 0);
    }

    /// Emits an argument-taking opcode with a raw argument, prefixing `EXTENDED_ARG` when the
    /// argument does not fit in two bytes.
    pub fn emit_arg(&mut self, op: Opcode, arg: u32) {
        if !op.has_arg() || op == Opcode::ExtendedArg {
            self.fail(BuildError::ArgumentMismatch(op));
            return;
        }
        if matches!(op.operand_kind(), OperandKind::JumpRel | OperandKind::JumpAbs) {
            self.fail(BuildError::NotAJump(op));
            return;
        }
        self.write_arg(op, arg);
        self.track(op, arg);
    }

    fn write_arg(&mut self, op: Opcode, arg: u32) {
        let [b0, b1, b2, b3] = arg.to_le_bytes();
        if arg > u32::from(u16::MAX) {
            self.bytecode.extend([Opcode::ExtendedArg as u8, b2, b3]);
        }
        self.bytecode.extend([op as u8, b0, b1]);
    }

    /// `LOAD_CONST` with the constant interned into the pool.
    pub fn emit_load_const(&mut self, value: impl Into<Const>) {
        let index = self.const_index(value.into());
        self.emit_arg(Opcode::LoadConst, index);
    }

    /// A name-class opcode (`LOAD_NAME`, `STORE_GLOBAL` ...) with `name` interned into `names`.
    pub fn emit_name(&mut self, op: Opcode, name: &str) {
        let index = intern(&mut self.names, name);
        self.emit_arg(op, index);
    }

    /// A fast-local opcode with `name` interned into `varnames`.
    pub fn emit_local(&mut self, op: Opcode, name: &str) {
        let index = intern(&mut self.varnames, name);
        self.emit_arg(op, index);
    }

    /// A deref opcode (`LOAD_CLOSURE`, `LOAD_DEREF`, `STORE_DEREF`) addressing a declared cell.
    pub fn emit_deref(&mut self, op: Opcode, name: &str) {
        let index = if let Some(i) = self.cellvars.iter().position(|n| &**n == name) {
            i
        } else if let Some(i) = self.freevars.iter().position(|n| &**n == name) {
            self.cellvars.len() + i
        } else {
            self.fail(BuildError::UnknownCell(name.into()));
            return;
        };
        self.emit_arg(op, to_u32(index));
    }

    pub fn emit_compare(&mut self, op: CompareOp) {
        self.emit_arg(Opcode::CompareOp, op as u32);
    }

    /// `CALL_FUNCTION` with `positional` arguments and `keyword` name/value pairs on the stack.
    pub fn emit_call(&mut self, positional: u8, keyword: u8) {
        self.emit_arg(Opcode::CallFunction, (u32::from(keyword) << 8) | u32::from(positional));
    }

    /// `MAKE_FUNCTION` (or `MAKE_CLOSURE` when `closure`) taking `defaults` positional defaults
    /// and `kwdefaults` keyword-only default pairs.
    pub fn emit_make_function(&mut self, defaults: u8, kwdefaults: u8, closure: bool) {
        let op = if closure { Opcode::MakeClosure } else { Opcode::MakeFunction };
        self.emit_arg(op, (u32::from(kwdefaults) << 8) | u32::from(defaults));
    }

    // --- labels ---

    #[must_use]
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current offset.
    pub fn bind(&mut self, label: Label) {
        let offset = self.offset();
        match self.labels.get_mut(label.0) {
            Some(slot @ None) => *slot = Some(offset),
            _ => self.fail(BuildError::LabelRebound),
        }
    }

    /// Emits a jump-class opcode (`JUMP_*`, `POP_JUMP_*`, `FOR_ITER`, `SETUP_*`,
    /// `CONTINUE_LOOP`) targeting `label`. The target is patched in by [`CodeBuilder::build`].
    pub fn emit_jump(&mut self, op: Opcode, label: Label) {
        let relative = match op.operand_kind() {
            OperandKind::JumpRel => true,
            OperandKind::JumpAbs => false,
            _ => {
                self.fail(BuildError::NotAJump(op));
                return;
            }
        };
        self.patches.push(Patch {
            at: self.offset(),
            label,
            relative,
        });
        self.bytecode.extend([op as u8, 0, 0]);
        self.track(op, 0);
    }

    fn track(&mut self, op: Opcode, arg: u32) {
        self.depth = (self.depth + i64::from(op.stack_effect(arg))).max(0);
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn fail(&mut self, error: BuildError) {
        self.error.get_or_insert(error);
    }

    /// Patches jumps and produces the code object.
    pub fn build(mut self) -> Result<Code, BuildError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        for patch in &self.patches {
            let target = self
                .labels
                .get(patch.label.0)
                .copied()
                .flatten()
                .ok_or(BuildError::UnboundLabel)?;
            let arg = if patch.relative {
                target
                    .checked_sub(patch.at + 3)
                    .ok_or(BuildError::BackwardRelativeJump { at: patch.at })?
            } else {
                target
            };
            let arg = u16::try_from(arg).map_err(|_| BuildError::JumpTooFar { at: patch.at })?;
            let [lo, hi] = arg.to_le_bytes();
            self.bytecode[patch.at + 1] = lo;
            self.bytecode[patch.at + 2] = hi;
        }

        Ok(Code {
            name: self.name,
            bytecode: self.bytecode,
            consts: self.consts,
            names: self.names,
            varnames: self.varnames,
            cellvars: self.cellvars,
            freevars: self.freevars,
            arg_count: self.arg_count,
            kwonly_arg_count: self.kwonly_arg_count,
            flags: self.flags,
            stack_size: usize::try_from(self.max_depth).unwrap_or_default(),
        })
    }

    fn const_index(&mut self, value: Const) -> u32 {
        // floats are never shared: 0.0 == -0.0 would merge distinct constants
        let reusable = !matches!(value, Const::Float(_) | Const::Code(_));
        if reusable {
            if let Some(i) = self.consts.iter().position(|c| *c == value) {
                return to_u32(i);
            }
        }
        self.consts.push(value);
        to_u32(self.consts.len() - 1)
    }
}

fn intern(table: &mut Vec<Rc<str>>, name: &str) -> u32 {
    if let Some(i) = table.iter().position(|n| &**n == name) {
        return to_u32(i);
    }
    table.push(name.into());
    to_u32(table.len() - 1)
}

fn to_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::decode::{Operand, decode};

    #[test]
    fn forward_jump_is_patched() {
        let mut b = CodeBuilder::new("t");
        let end = b.new_label();
        b.emit_jump(Opcode::JumpForward, end);
        b.emit(Opcode::Nop);
        b.bind(end);
        b.emit_load_const(Const::None);
        b.emit(Opcode::ReturnValue);
        let code = b.build().unwrap();
        assert_eq!(code.bytecode[1..3], [1, 0]);
        assert_eq!(decode(&code, 0).unwrap().operand, Operand::Jump(4));
    }

    #[test]
    fn unbound_label_fails() {
        let mut b = CodeBuilder::new("t");
        let l = b.new_label();
        b.emit_jump(Opcode::JumpAbsolute, l);
        assert_eq!(b.build().unwrap_err(), BuildError::UnboundLabel);
    }

    #[test]
    fn backward_relative_jump_fails() {
        let mut b = CodeBuilder::new("t");
        let l = b.new_label();
        b.bind(l);
        b.emit_jump(Opcode::JumpForward, l);
        assert_eq!(b.build().unwrap_err(), BuildError::BackwardRelativeJump { at: 0 });
    }

    #[test]
    fn large_argument_uses_extended_arg() {
        let mut b = CodeBuilder::new("t");
        b.emit_arg(Opcode::BuildTuple, 0x0001_0000);
        let code = b.build().unwrap();
        assert_eq!(code.bytecode, vec![Opcode::ExtendedArg as u8, 1, 0, Opcode::BuildTuple as u8, 0, 0]);
    }

    #[test]
    fn constants_and_names_are_interned() {
        let mut b = CodeBuilder::new("t");
        b.emit_load_const(Const::Int(1));
        b.emit_load_const(Const::Int(1));
        b.emit_load_const(Const::Bool(true));
        b.emit_load_const(Const::Float(0.0));
        b.emit_load_const(Const::Float(0.0));
        b.emit_name(Opcode::LoadName, "x");
        b.emit_name(Opcode::StoreName, "x");
        let code = b.build().unwrap();
        assert_eq!(code.consts.len(), 4);
        assert_eq!(code.names.len(), 1);
        assert_eq!(code.stack_size, 6);
    }

    #[test]
    fn params_lead_varnames() {
        let code = CodeBuilder::new("f")
            .with_args(&["a", "b"])
            .with_kwonly_args(&["c"])
            .with_varargs("rest")
            .with_varkeywords("kw")
            .build()
            .unwrap();
        assert_eq!(code.total_arg_count(), 5);
        assert_eq!(&*code.varnames[3], "rest");

        let mut b = CodeBuilder::new("f");
        b.emit_local(Opcode::LoadFast, "tmp");
        let err = b.with_args(&["a"]).build().unwrap_err();
        assert_eq!(err, BuildError::ParamsAfterLocals);
    }

    #[test]
    fn deref_indexes_cells_then_freevars() {
        let mut b = CodeBuilder::new("f").with_cellvars(&["c"]).with_freevars(&["x"]);
        b.emit_deref(Opcode::LoadDeref, "x");
        b.emit_deref(Opcode::LoadDeref, "nope");
        assert_eq!(b.build().unwrap_err(), BuildError::UnknownCell("nope".into()));

        let mut b = CodeBuilder::new("f").with_cellvars(&["c"]).with_freevars(&["x"]);
        b.emit_deref(Opcode::LoadDeref, "x");
        let code = b.build().unwrap();
        assert_eq!(code.bytecode, vec![Opcode::LoadDeref as u8, 1, 0]);
    }

    #[test]
    fn argument_form_is_checked() {
        let mut b = CodeBuilder::new("t");
        b.emit(Opcode::LoadConst);
        assert_eq!(b.build().unwrap_err(), BuildError::ArgumentMismatch(Opcode::LoadConst));
    }
}
