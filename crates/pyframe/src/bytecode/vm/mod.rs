//! Bytecode virtual machine.
//!
//! The VM keeps a call stack of [`Frame`]s. Each frame owns its operand stack, its block
//! stack and its instruction pointer, and resolves names through three namespaces: locals,
//! globals and builtins. The caller of a frame is the frame below it on the call stack.
//!
//! Every instruction goes through one dispatcher, which is also the only place a Rust-level
//! fault is turned into a Python exception: the error is attributed to the current code
//! object and offset, stored as the VM's last exception, and handed to the block stack as
//! an `exception` signal.

mod binary;
mod blocks;
mod call;
mod collections;
mod compare;
mod exceptions;

use std::rc::Rc;

use log::{debug, trace};

pub(crate) use binary::binary_op;
use blocks::{Block, BlockKind, SignalSlots, Why};

use super::{
    code::Code,
    decode::{Instruction, Operand, decode},
    dis,
    op::{Opcode, Operator},
};
use crate::{
    exception::{ExcType, RaisedException, RunError, RunResult, TraceFrame},
    function::Cell,
    io::PrintWriter,
    namespace::{Namespace, NamespaceRef},
    resource::ResourceLimits,
    value::Value,
};

/// Execution state of one code object.
#[derive(Debug)]
pub(crate) struct Frame {
    code: Rc<Code>,
    stack: Vec<Value>,
    blocks: Vec<Block>,
    locals: NamespaceRef,
    globals: NamespaceRef,
    builtins: NamespaceRef,
    /// `cellvars` cells followed by the closure's `freevars` cells.
    cells: Vec<Cell>,
    /// Offset of the next instruction.
    ip: usize,
    /// Offset of the instruction being executed, for tracebacks.
    offset: usize,
}

impl Frame {
    fn new(code: Rc<Code>, locals: NamespaceRef, globals: NamespaceRef, builtins: NamespaceRef, cells: Vec<Cell>) -> Self {
        Self {
            stack: Vec::with_capacity(code.stack_size),
            code,
            blocks: Vec::new(),
            locals,
            globals,
            builtins,
            cells,
            ip: 0,
            offset: 0,
        }
    }

    fn trace_frame(&self) -> TraceFrame {
        TraceFrame {
            code_name: Rc::clone(&self.code.name),
            offset: self.offset,
        }
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    fn peek(&self) -> RunResult<&Value> {
        self.stack
            .last()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    /// Pops `n` values, returned in push order.
    fn pop_n(&mut self, n: usize) -> RunResult<Vec<Value>> {
        let start = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| RunError::internal("operand stack underflow"))?;
        Ok(self.stack.split_off(start))
    }

    /// Rotates the top `n` values so TOS moves down to position `n`.
    fn rotate(&mut self, n: usize) -> RunResult<()> {
        let start = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| RunError::internal("operand stack underflow"))?;
        self.stack[start..].rotate_right(1);
        Ok(())
    }

    fn cell(&self, index: usize) -> RunResult<&Cell> {
        self.cells
            .get(index)
            .ok_or_else(|| RunError::internal("cell index out of range"))
    }
}

/// The bytecode interpreter.
///
/// `print()` output goes to the [`PrintWriter`] the VM borrows for its lifetime.
///
/// ```
/// use pyframe::{CodeBuilder, Const, NoPrint, Opcode, Value, VM};
///
/// let mut builder = CodeBuilder::new("<module>");
/// builder.emit_load_const(Const::Int(2));
/// builder.emit_load_const(Const::Int(3));
/// builder.emit(Opcode::BinaryAdd);
/// builder.emit(Opcode::ReturnValue);
/// let code = builder.build().unwrap();
///
/// let mut writer = NoPrint;
/// let mut vm = VM::new(&mut writer);
/// assert_eq!(vm.run_code(code, None, None).unwrap(), Value::Int(5));
/// ```
pub struct VM<'a, P: PrintWriter> {
    frames: Vec<Frame>,
    /// The exception currently propagating, if any.
    last_exception: Option<RaisedException>,
    /// The value of the `return` currently propagating, if any.
    return_value: Option<Value>,
    builtins: NamespaceRef,
    limits: ResourceLimits,
    print_writer: &'a mut P,
}

impl<'a, P: PrintWriter> VM<'a, P> {
    /// A VM with the default resource limits.
    pub fn new(print_writer: &'a mut P) -> Self {
        Self::with_limits(print_writer, ResourceLimits::default())
    }

    pub fn with_limits(print_writer: &'a mut P, limits: ResourceLimits) -> Self {
        Self {
            frames: Vec::new(),
            last_exception: None,
            return_value: None,
            builtins: Namespace::builtins().into_ref(),
            limits,
            print_writer,
        }
    }

    /// The builtin namespace every top-level frame starts from.
    ///
    /// Shared: bindings added here are visible to code run afterwards.
    #[must_use]
    pub fn builtins(&self) -> &NamespaceRef {
        &self.builtins
    }

    /// Runs a top-level code object to completion.
    ///
    /// With no `globals`, the frame gets fresh `__main__` globals. With no `locals`, the
    /// frame's locals are its globals, as for module-level code. Function calls made while
    /// it runs get the function's globals and fresh locals holding the bound arguments.
    ///
    /// # Errors
    /// Returns the exception that escaped the frame, with its traceback.
    pub fn run_code(
        &mut self,
        code: impl Into<Rc<Code>>,
        globals: Option<NamespaceRef>,
        locals: Option<NamespaceRef>,
    ) -> Result<Value, RaisedException> {
        let code = code.into();
        self.frames.clear();
        self.last_exception = None;
        self.return_value = None;

        let frame = self.make_frame(Rc::clone(&code), globals, locals, Vec::new());
        self.push_frame(frame)
            .and_then(|()| self.run())
            .map_err(|err| match err {
                RunError::Propagated(raised) => raised,
                other => other.into_raised(TraceFrame {
                    code_name: Rc::clone(&code.name),
                    offset: 0,
                }),
            })
    }

    /// Builds a frame for `code`.
    ///
    /// Explicit `globals` win, and `locals` then default to them. Without `globals` the frame
    /// gets fresh module globals. Builtins come from the current frame, or from the VM for
    /// the first frame.
    ///
    /// Cellvars get fresh cells, seeded from locals already bound under the same name (the
    /// parameters of a call). `closure` supplies the freevars cells; missing ones start
    /// empty.
    fn make_frame(
        &self,
        code: Rc<Code>,
        globals: Option<NamespaceRef>,
        locals: Option<NamespaceRef>,
        closure: Vec<Cell>,
    ) -> Frame {
        let globals = globals.unwrap_or_else(|| Namespace::new_main().into_ref());
        let locals = locals.unwrap_or_else(|| Rc::clone(&globals));
        let builtins = self
            .frames
            .last()
            .map_or_else(|| Rc::clone(&self.builtins), |caller| Rc::clone(&caller.builtins));

        let mut cells: Vec<Cell> = {
            let bound = locals.borrow();
            code.cellvars
                .iter()
                .map(|name| bound.get(name).cloned().map_or_else(Cell::new_empty, Cell::new))
                .collect()
        };
        let free_count = code.freevars.len();
        cells.extend(closure.into_iter().take(free_count));
        cells.resize_with(code.cell_count(), Cell::new_empty);

        Frame::new(code, locals, globals, builtins, cells)
    }

    /// Pushes `frame` as the new current frame, subject to the recursion limit.
    fn push_frame(&mut self, frame: Frame) -> RunResult<()> {
        self.limits.check_recursion_depth(self.frames.len())?;
        debug!("enter {} (depth {})", frame.code.name, self.frames.len() + 1);
        self.frames.push(frame);
        Ok(())
    }

    /// Runs the call stack until its bottom frame ends.
    ///
    /// A call pushes the callee's frame and the loop carries on in it, so Python calls never
    /// nest on the host stack. When a frame ends, its return value is pushed onto the
    /// caller's operand stack, or its exception is raised in the caller at the calling
    /// instruction and offered to the caller's block stack.
    fn run(&mut self) -> RunResult<Value> {
        let mut code = self.current_code()?;
        let mut depth = self.frames.len();
        loop {
            let Some(mut why) = self.step(&code) else {
                if self.frames.len() != depth {
                    code = self.current_code()?;
                    depth = self.frames.len();
                }
                continue;
            };
            loop {
                let outcome = self.pop_frame(why);
                if self.frames.is_empty() {
                    return outcome;
                }
                code = self.current_code()?;
                depth = self.frames.len();
                match outcome {
                    Ok(value) => {
                        self.push(value)?;
                        break;
                    }
                    Err(err) => {
                        let offset = self.frame_mut()?.offset;
                        let raised = self.capture(err, &code, offset);
                        match self.unwind(raised) {
                            Some(next) => why = next,
                            None => break,
                        }
                    }
                }
            }
        }
    }

    /// Pops the current frame, which ended with `why`, and turns the signal into its result.
    fn pop_frame(&mut self, why: Why) -> RunResult<Value> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| RunError::internal("frame stack underflow"))?;
        debug!("leave {} with {why:?} (depth {})", frame.code.name, self.frames.len());
        match why {
            Why::Return => Ok(self.return_value.take().unwrap_or(Value::None)),
            Why::Exception => match self.last_exception.take() {
                Some(raised) => Err(RunError::Propagated(raised)),
                None => Err(RunError::internal("exception signal without an exception")),
            },
            Why::Break => Err(ExcType::system_error_outside_loop("break")
                .into_raised(frame.trace_frame())
                .into()),
            Why::Continue(_) => Err(ExcType::system_error_outside_loop("continue")
                .into_raised(frame.trace_frame())
                .into()),
        }
    }

    fn current_code(&self) -> RunResult<Rc<Code>> {
        self.frames
            .last()
            .map(|frame| Rc::clone(&frame.code))
            .ok_or_else(|| RunError::internal("no active frame"))
    }

    /// Executes one instruction of the current frame and settles its signal against the block
    /// stack. Returns the signal that ends the frame, if any.
    fn step(&mut self, code: &Code) -> Option<Why> {
        let ip = match self.frame_mut() {
            Ok(frame) => frame.ip,
            Err(err) => return Some(self.capture(err, code, 0)),
        };
        let instr = match decode(code, ip) {
            Ok(instr) => instr,
            // undecodable code is fatal for the frame: no handler in it gets to run
            Err(err) => return Some(self.capture(ExcType::decode_error(&err), code, ip)),
        };
        trace!("{}: {}", code.name, dis::instruction_string(code, &instr));
        if let Ok(frame) = self.frame_mut() {
            frame.ip = instr.next;
            frame.offset = instr.offset;
        }

        let why = self.dispatch(code, &instr)?;
        self.unwind(why)
    }

    /// Runs the handler for `instr`, capturing any fault as the pending exception.
    fn dispatch(&mut self, code: &Code, instr: &Instruction<'_>) -> Option<Why> {
        match self.execute(instr) {
            Ok(why) => why,
            Err(err) => Some(self.capture(err, code, instr.offset)),
        }
    }

    fn capture(&mut self, err: RunError, code: &Code, offset: usize) -> Why {
        let raised = err.into_raised(TraceFrame {
            code_name: Rc::clone(&code.name),
            offset,
        });
        debug!("{} raised {} at offset {offset}", code.name, raised.kind());
        self.last_exception = Some(raised);
        Why::Exception
    }

    fn unwind(&mut self, why: Why) -> Option<Why> {
        let Self {
            frames,
            last_exception,
            return_value,
            ..
        } = self;
        match frames.last_mut() {
            Some(frame) => frame.unwind(
                why,
                SignalSlots {
                    last_exception,
                    return_value,
                },
            ),
            None => Some(why),
        }
    }

    fn execute(&mut self, instr: &Instruction<'_>) -> RunResult<Option<Why>> {
        let Some(opcode) = instr.opcode else {
            return Err(ExcType::unknown_opcode(instr.byte, None));
        };
        match opcode {
            // --- stack manipulation ---
            Opcode::Nop => {}
            Opcode::PopTop => {
                self.pop()?;
            }
            Opcode::RotTwo => self.frame_mut()?.rotate(2)?,
            Opcode::RotThree => self.frame_mut()?.rotate(3)?,
            Opcode::RotFour => self.frame_mut()?.rotate(4)?,
            Opcode::DupTop => {
                let top = self.frame_mut()?.peek()?.clone();
                self.push(top)?;
            }

            // --- names ---
            Opcode::LoadConst => {
                let Operand::Const(constant) = instr.operand else {
                    return Err(bad_operand(instr));
                };
                self.push(Value::from_const(constant))?;
            }
            Opcode::LoadName => {
                let name = name_operand(instr)?;
                let frame = self.frame_mut()?;
                let value = lookup(&frame.locals, name)
                    .or_else(|| lookup(&frame.globals, name))
                    .or_else(|| lookup(&frame.builtins, name))
                    .ok_or_else(|| ExcType::name_error(name))?;
                self.push(value)?;
            }
            Opcode::StoreName => {
                let name = name_operand(instr)?;
                let value = self.pop()?;
                self.frame_mut()?.locals.borrow_mut().set(Rc::clone(name), value);
            }
            Opcode::DeleteName => {
                let name = name_operand(instr)?;
                if !self.frame_mut()?.locals.borrow_mut().remove(name) {
                    return Err(ExcType::name_error(name));
                }
            }
            Opcode::LoadGlobal => {
                let name = name_operand(instr)?;
                let frame = self.frame_mut()?;
                let value = lookup(&frame.globals, name)
                    .or_else(|| lookup(&frame.builtins, name))
                    .ok_or_else(|| ExcType::name_error(name))?;
                self.push(value)?;
            }
            Opcode::StoreGlobal => {
                let name = name_operand(instr)?;
                let value = self.pop()?;
                self.frame_mut()?.globals.borrow_mut().set(Rc::clone(name), value);
            }
            Opcode::DeleteGlobal => {
                let name = name_operand(instr)?;
                if !self.frame_mut()?.globals.borrow_mut().remove(name) {
                    return Err(ExcType::name_error(name));
                }
            }
            Opcode::LoadFast => {
                let name = local_operand(instr)?;
                let value = lookup(&self.frame_mut()?.locals, name).ok_or_else(|| ExcType::unbound_local_error(name))?;
                self.push(value)?;
            }
            Opcode::StoreFast => {
                let name = local_operand(instr)?;
                let value = self.pop()?;
                self.frame_mut()?.locals.borrow_mut().set(Rc::clone(name), value);
            }
            Opcode::DeleteFast => {
                let name = local_operand(instr)?;
                if !self.frame_mut()?.locals.borrow_mut().remove(name) {
                    return Err(ExcType::unbound_local_error(name));
                }
            }
            Opcode::LoadClosure => self.load_closure(cell_operand(instr)?)?,
            Opcode::LoadDeref => self.load_deref(cell_operand(instr)?)?,
            Opcode::StoreDeref => self.store_deref(cell_operand(instr)?)?,

            // --- operators ---
            Opcode::CompareOp => {
                let Operand::Compare(op) = instr.operand else {
                    return Err(bad_operand(instr));
                };
                self.compare(op)?;
            }

            // --- collections and iteration ---
            Opcode::BuildTuple => self.build_tuple(count_operand(instr)?)?,
            Opcode::BuildList => self.build_list(count_operand(instr)?)?,
            Opcode::BuildMap => self.build_map()?,
            Opcode::StoreMap => self.store_map()?,
            Opcode::StoreSubscr => self.store_subscr()?,
            Opcode::DeleteSubscr => self.delete_subscr()?,
            Opcode::UnpackSequence => self.unpack_sequence(count_operand(instr)?)?,
            Opcode::GetIter => self.get_iter()?,
            Opcode::ForIter => self.for_iter(jump_operand(instr)?)?,

            // --- jumps ---
            Opcode::JumpForward | Opcode::JumpAbsolute => self.jump(jump_operand(instr)?)?,
            Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue => {
                let target = jump_operand(instr)?;
                let jump_if = opcode == Opcode::PopJumpIfTrue;
                if self.pop()?.py_bool() == jump_if {
                    self.jump(target)?;
                }
            }
            Opcode::JumpIfFalseOrPop | Opcode::JumpIfTrueOrPop => {
                let target = jump_operand(instr)?;
                let jump_if = opcode == Opcode::JumpIfTrueOrPop;
                let frame = self.frame_mut()?;
                if frame.peek()?.py_bool() == jump_if {
                    frame.ip = target;
                } else {
                    frame.pop()?;
                }
            }

            // --- blocks ---
            Opcode::SetupLoop => self.setup_block(BlockKind::Loop, jump_operand(instr)?)?,
            Opcode::SetupExcept => self.setup_block(BlockKind::Except, jump_operand(instr)?)?,
            Opcode::SetupFinally => self.setup_block(BlockKind::Finally, jump_operand(instr)?)?,
            Opcode::PopBlock => self.pop_block()?,
            Opcode::PopExcept => self.pop_except()?,
            Opcode::EndFinally => return self.end_finally(),
            Opcode::BreakLoop => return Ok(Some(Why::Break)),
            Opcode::ContinueLoop => return Ok(Some(Why::Continue(jump_operand(instr)?))),

            // --- functions and exceptions ---
            Opcode::ReturnValue => {
                let value = self.pop()?;
                self.return_value = Some(value);
                return Ok(Some(Why::Return));
            }
            Opcode::RaiseVarargs => return self.raise_varargs(instr.arg),
            Opcode::CallFunction => self.call_function(instr.arg)?,
            Opcode::MakeFunction => self.make_function(instr.arg, false)?,
            Opcode::MakeClosure => self.make_function(instr.arg, true)?,

            other => match other.operator() {
                Some(Operator::Unary(op)) => self.unary(op)?,
                Some(Operator::Binary(op)) if binary::has_binary_entry(op) => self.binary(op)?,
                Some(Operator::Inplace(op)) if binary::has_binary_entry(op) => self.inplace(op)?,
                _ => return Err(ExcType::unknown_opcode(instr.byte, Some(other.name()))),
            },
        }
        Ok(None)
    }

    // --- frame access ---

    fn frame_mut(&mut self) -> RunResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RunError::internal("no active frame"))
    }

    fn push(&mut self, value: Value) -> RunResult<()> {
        self.frame_mut()?.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.frame_mut()?.pop()
    }

    fn pop_n(&mut self, n: usize) -> RunResult<Vec<Value>> {
        self.frame_mut()?.pop_n(n)
    }

    fn jump(&mut self, target: usize) -> RunResult<()> {
        self.frame_mut()?.ip = target;
        Ok(())
    }
}

fn lookup(namespace: &NamespaceRef, name: &str) -> Option<Value> {
    namespace.borrow().get(name).cloned()
}

// Operand accessors. The decoder resolves operands by opcode, so a mismatch means the
// dispatcher and decoder disagree.

fn bad_operand(instr: &Instruction<'_>) -> RunError {
    RunError::internal(format!("unexpected operand {:?} at offset {}", instr.operand, instr.offset))
}

fn name_operand<'i>(instr: &Instruction<'i>) -> RunResult<&'i Rc<str>> {
    match instr.operand {
        Operand::Name(name) => Ok(name),
        _ => Err(bad_operand(instr)),
    }
}

fn local_operand<'i>(instr: &Instruction<'i>) -> RunResult<&'i Rc<str>> {
    match instr.operand {
        Operand::Local(name) => Ok(name),
        _ => Err(bad_operand(instr)),
    }
}

fn cell_operand(instr: &Instruction<'_>) -> RunResult<usize> {
    match instr.operand {
        Operand::Free(index) => Ok(index),
        _ => Err(bad_operand(instr)),
    }
}

fn jump_operand(instr: &Instruction<'_>) -> RunResult<usize> {
    match instr.operand {
        Operand::Jump(target) => Ok(target),
        _ => Err(bad_operand(instr)),
    }
}

fn count_operand(instr: &Instruction<'_>) -> RunResult<usize> {
    usize::try_from(instr.arg).map_err(|_| bad_operand(instr))
}
