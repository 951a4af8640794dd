//! Function creation, calls and closure cells.

use std::rc::Rc;

use super::VM;
use crate::{
    args::ArgValues,
    exception::{ExcType, RunError, RunResult},
    function::{Cell, Function},
    io::PrintWriter,
    namespace::Namespace,
    signature::Signature,
    value::Value,
};

/// Splits a `CALL_FUNCTION`/`MAKE_FUNCTION` argument into its positional count (low byte) and
/// keyword pair count (high byte).
fn split_counts(arg: u32) -> (usize, usize) {
    let [low, high, ..] = arg.to_le_bytes();
    (usize::from(low), usize::from(high))
}

/// Pairs up `name, value, name, value, ...` popped off the stack.
fn keyword_pairs(flat: Vec<Value>) -> RunResult<Vec<(Rc<str>, Value)>> {
    let mut pairs = Vec::with_capacity(flat.len() / 2);
    let mut flat = flat.into_iter();
    while let (Some(name), Some(value)) = (flat.next(), flat.next()) {
        match name {
            Value::Str(name) => pairs.push((name, value)),
            _ => return Err(ExcType::type_error_keywords_must_be_strings()),
        }
    }
    Ok(pairs)
}

impl<P: PrintWriter> VM<'_, P> {
    /// `CALL_FUNCTION`: stack is `[callable, positional..., (name, value)...]`.
    ///
    /// A Python function gets a new frame that the run loop continues in. Builtins and
    /// exception types run to completion here and push their result.
    pub(super) fn call_function(&mut self, arg: u32) -> RunResult<()> {
        let (positional, keywords) = split_counts(arg);
        let keywords = keyword_pairs(self.pop_n(2 * keywords)?)?;
        let positional = self.pop_n(positional)?;
        let callable = self.pop()?;
        let args = ArgValues::new(positional, keywords);
        let result = match callable {
            Value::Function(function) => return self.enter_function(&function, args),
            Value::Builtin(builtin) => builtin.call(args, &mut *self.print_writer)?,
            Value::ExcType(exc_type) => exc_type.call(args)?,
            other => return Err(ExcType::type_error_not_callable(other.py_type())),
        };
        self.push(result)
    }

    /// Binds `args` and pushes a frame for the function body.
    ///
    /// Binding errors and the recursion limit are raised in the caller, at the call.
    fn enter_function(&mut self, function: &Function, args: ArgValues) -> RunResult<()> {
        let bound = Signature::of(&function.code).bind(args, &function.defaults, &function.kwdefaults, function.name())?;
        let locals: Namespace = bound.into_iter().collect();
        let frame = self.make_frame(
            Rc::clone(&function.code),
            Some(Rc::clone(&function.globals)),
            Some(locals.into_ref()),
            function.closure.clone(),
        );
        self.push_frame(frame)
    }

    /// `MAKE_FUNCTION` / `MAKE_CLOSURE`.
    ///
    /// Stack, bottom to top: positional defaults, keyword-only default `(name, value)` pairs,
    /// the tuple of cells (closures only), the code object.
    pub(super) fn make_function(&mut self, arg: u32, closure: bool) -> RunResult<()> {
        let code = match self.pop()? {
            Value::Code(code) => code,
            other => {
                return Err(ExcType::type_error(format!(
                    "function body must be a code object, not {}",
                    other.py_type()
                )));
            }
        };
        let cells = if closure {
            let cells = match self.pop()? {
                Value::Tuple(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::Cell(cell) => Ok(cell.clone()),
                        other => Err(ExcType::system_error_bad_operand("MAKE_CLOSURE", other.py_type())),
                    })
                    .collect::<RunResult<Vec<Cell>>>()?,
                other => return Err(ExcType::system_error_bad_operand("MAKE_CLOSURE", other.py_type())),
            };
            if cells.len() != code.freevars.len() {
                return Err(ExcType::system_error_bad_closure(&code.name, code.freevars.len(), cells.len()));
            }
            cells
        } else {
            Vec::new()
        };
        let (defaults, kwdefaults) = split_counts(arg);
        let kwdefaults = keyword_pairs(self.pop_n(2 * kwdefaults)?)?;
        let defaults = self.pop_n(defaults)?;
        let globals = Rc::clone(&self.frame_mut()?.globals);

        let function = Function::new(code, defaults, kwdefaults, globals, cells);
        self.push(Value::Function(Rc::new(function)))
    }

    /// `LOAD_CLOSURE`: pushes the cell itself, for a nested function to capture.
    pub(super) fn load_closure(&mut self, index: usize) -> RunResult<()> {
        let cell = self.frame_mut()?.cell(index)?.clone();
        self.push(Value::Cell(cell))
    }

    pub(super) fn load_deref(&mut self, index: usize) -> RunResult<()> {
        let frame = self.frame_mut()?;
        let value = match frame.cell(index)?.get() {
            Some(value) => value,
            None => {
                let name = frame
                    .code
                    .cell_name(index)
                    .ok_or_else(|| RunError::internal("cell index out of range"))?;
                return Err(ExcType::name_error_free_variable(name));
            }
        };
        self.push(value)
    }

    pub(super) fn store_deref(&mut self, index: usize) -> RunResult<()> {
        let value = self.pop()?;
        self.frame_mut()?.cell(index)?.set(value);
        Ok(())
    }
}
