use std::{
    borrow::Cow,
    fmt::{self, Write},
    rc::Rc,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    bytecode::DecodeError,
    types::{Type, str::string_repr_fmt},
    value::Value,
};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Python exception types supported by the VM.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ExcType {
    /// Root of the hierarchy - catches everything.
    BaseException,
    /// Base class of every ordinary exception.
    Exception,

    // --- ArithmeticError hierarchy ---
    ArithmeticError,
    /// Raised when checked 64-bit integer arithmetic overflows.
    OverflowError,
    ZeroDivisionError,

    // --- LookupError hierarchy ---
    LookupError,
    IndexError,
    KeyError,

    // --- NameError hierarchy ---
    NameError,
    /// Subclass of NameError - for reading a fast local before assignment.
    UnboundLocalError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    /// Subclass of RuntimeError - raised when the call-depth limit is hit.
    RecursionError,
    NotImplementedError,

    // --- SystemError hierarchy ---
    /// VM-level faults: unknown opcodes, control signals escaping a frame.
    SystemError,
    /// Subclass of SystemError - the instruction stream of a code object is malformed.
    DecodeError,

    // --- Standalone exception types ---
    AssertionError,
    /// A sequence would exceed the allocation cap.
    MemoryError,
    StopIteration,
    TypeError,
    ValueError,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Returns true if `self` would be caught by `except handler_type:`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::BaseException => true,
            Self::Exception => self != Self::BaseException,
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::NameError => matches!(self, Self::UnboundLocalError),
            Self::RuntimeError => matches!(self, Self::RecursionError | Self::NotImplementedError),
            Self::SystemError => matches!(self, Self::DecodeError),
            _ => false,
        }
    }

    /// Creates an exception instance from an exception type and arguments.
    ///
    /// Handles exception constructors like `ValueError('message')`. A non-string argument
    /// is stored as its `str()`.
    pub(crate) fn call(self, args: ArgValues) -> RunResult<Value> {
        args.check_no_kwargs(self.into())?;
        let exc = match args.into_positional() {
            mut positional if positional.len() <= 1 => match positional.pop() {
                None => SimpleException::new_none(self),
                Some(Value::Str(s)) => SimpleException::new_msg(self, &*s),
                Some(other) => SimpleException::new_msg(self, other.py_str().into_owned()),
            },
            positional => return Err(Self::type_error_at_most(self.into(), 1, positional.len())),
        };
        Ok(Value::Exception(Rc::new(exc)))
    }

    // --- argument binding ---

    /// Creates a TypeError for when a builtin receives the wrong number of arguments.
    ///
    /// Matches CPython's format: `{name}() takes exactly one argument ({actual} given)`
    #[must_use]
    pub(crate) fn type_error_arg_count(name: &str, expected: usize, actual: usize) -> RunError {
        if expected == 1 {
            SimpleException::new_msg(
                Self::TypeError,
                format!("{name}() takes exactly one argument ({actual} given)"),
            )
            .into()
        } else {
            SimpleException::new_msg(
                Self::TypeError,
                format!("{name} expected {expected} arguments, got {actual}"),
            )
            .into()
        }
    }

    /// Matches CPython's format: `{name} expected at least {min} argument, got {actual}`
    #[must_use]
    pub(crate) fn type_error_at_least(name: &str, min: usize, actual: usize) -> RunError {
        let word = if min == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name} expected at least {min} {word}, got {actual}"),
        )
        .into()
    }

    /// Matches CPython's format: `{name} expected at most {max} arguments, got {actual}`
    #[must_use]
    pub(crate) fn type_error_at_most(name: &str, max: usize, actual: usize) -> RunError {
        let word = if max == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name} expected at most {max} {word}, got {actual}"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_no_kwargs(name: &str) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("{name}() takes no keyword arguments")).into()
    }

    /// Creates a TypeError for missing positional arguments.
    ///
    /// Matches CPython's format: `{name}() missing {count} required positional argument(s): 'a' and 'b'`
    #[must_use]
    pub(crate) fn type_error_missing_positional_with_names(name: &str, missing_names: &[&str]) -> RunError {
        let count = missing_names.len();
        let names_str = format_param_names(missing_names);
        let word = if count == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() missing {count} required positional {word}: {names_str}"),
        )
        .into()
    }

    /// Creates a TypeError for missing keyword-only arguments.
    #[must_use]
    pub(crate) fn type_error_missing_kwonly_with_names(name: &str, missing_names: &[&str]) -> RunError {
        let count = missing_names.len();
        let names_str = format_param_names(missing_names);
        let word = if count == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() missing {count} required keyword-only {word}: {names_str}"),
        )
        .into()
    }

    /// Creates a TypeError for too many positional arguments.
    ///
    /// Matches CPython's format:
    /// - Simple: `{name}() takes {max} positional argument(s) but {actual} were given`
    /// - With defaults: `{name}() takes from {min} to {max} positional arguments but {actual} were given`
    #[must_use]
    pub(crate) fn type_error_too_many_positional(name: &str, min: usize, max: usize, actual: usize) -> RunError {
        let given = if actual == 1 { "was" } else { "were" };
        let message = if min < max {
            format!("{name}() takes from {min} to {max} positional arguments but {actual} {given} given")
        } else {
            let takes_word = if max == 1 { "argument" } else { "arguments" };
            format!("{name}() takes {max} positional {takes_word} but {actual} {given} given")
        };
        SimpleException::new_msg(Self::TypeError, message).into()
    }

    /// Matches CPython's format: `{name}() got multiple values for argument '{param}'`
    #[must_use]
    pub(crate) fn type_error_duplicate_arg(name: &str, param: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got multiple values for argument '{param}'"),
        )
        .into()
    }

    /// Matches CPython's format: `{name}() got an unexpected keyword argument '{key}'`
    #[must_use]
    pub(crate) fn type_error_unexpected_keyword(name: &str, key: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got an unexpected keyword argument '{key}'"),
        )
        .into()
    }

    /// Keyword names at a call site must be strings.
    #[must_use]
    pub(crate) fn type_error_keywords_must_be_strings() -> RunError {
        SimpleException::new_msg(Self::TypeError, "keywords must be strings").into()
    }

    // --- general type errors ---

    /// Creates a simple TypeError with a custom message.
    #[must_use]
    pub(crate) fn type_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_callable(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not callable")).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_iterable(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not iterable")).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_sub(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not subscriptable")).into()
    }

    /// Matches CPython's format: `TypeError: '{type}' object does not support item assignment`
    #[must_use]
    pub(crate) fn type_error_not_sub_assignment(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{type_}' object does not support item assignment"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_not_sub_deletion(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{type_}' object doesn't support item deletion"),
        )
        .into()
    }

    /// This matches Python's error message: `TypeError: unhashable type: 'list'`
    #[must_use]
    pub(crate) fn type_error_unhashable(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("unhashable type: '{type_}'")).into()
    }

    /// Matches CPython's format: `TypeError: list indices must be integers, not str`
    #[must_use]
    pub(crate) fn type_error_indices(type_: Type, index_type: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{type_} indices must be integers, not {index_type}"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_object_has_no_len(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("object of type '{type_}' has no len()")).into()
    }

    /// Creates a TypeError for unsupported binary operations.
    ///
    /// For `+` or `+=` with str/list on the left side, uses CPython's special format:
    /// `can only concatenate {type} (not "{other}") to {type}`
    ///
    /// For other cases, uses the generic format:
    /// `unsupported operand type(s) for {op}: '{left}' and '{right}'`
    #[must_use]
    pub(crate) fn binary_type_error(op: &str, lhs_type: Type, rhs_type: Type) -> RunError {
        let message = if (op == "+" || op == "+=") && matches!(lhs_type, Type::Str | Type::List) {
            format!("can only concatenate {lhs_type} (not \"{rhs_type}\") to {lhs_type}")
        } else {
            format!("unsupported operand type(s) for {op}: '{lhs_type}' and '{rhs_type}'")
        };
        SimpleException::new_msg(Self::TypeError, message).into()
    }

    /// Uses CPython's format: `bad operand type for unary {op}: '{type}'`
    #[must_use]
    pub(crate) fn unary_type_error(op: &str, value_type: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("bad operand type for {op}: '{value_type}'"),
        )
        .into()
    }

    /// Uses CPython's format: `'<' not supported between instances of 'int' and 'str'`
    #[must_use]
    pub(crate) fn compare_type_error(op: &str, lhs_type: Type, rhs_type: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{op}' not supported between instances of '{lhs_type}' and '{rhs_type}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_not_container(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("argument of type '{type_}' is not iterable"),
        )
        .into()
    }

    /// Matches CPython's format: `'{type}' object cannot be interpreted as an integer`
    #[must_use]
    pub(crate) fn type_error_not_integer(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{type_}' object cannot be interpreted as an integer"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_int_conversion(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("int() argument must be a string, a bytes-like object or a real number, not '{type_}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_float_conversion(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("float() argument must be a string or a real number, not '{type_}'"),
        )
        .into()
    }

    // --- exceptions about exceptions ---

    #[must_use]
    pub(crate) fn type_error_must_derive_from_base_exception() -> RunError {
        SimpleException::new_msg(Self::TypeError, "exceptions must derive from BaseException").into()
    }

    /// Raised by `except X:` when `X` is not an exception type or a tuple of them.
    #[must_use]
    pub(crate) fn except_invalid_type_error() -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            "catching classes that do not inherit from BaseException is not allowed",
        )
        .into()
    }

    #[must_use]
    pub(crate) fn runtime_error_no_active_exception() -> RunError {
        SimpleException::new_msg(Self::RuntimeError, "No active exception to reraise").into()
    }

    /// Matches CPython's format: `RuntimeError: dictionary changed size during iteration`
    #[must_use]
    pub(crate) fn runtime_error_dict_changed_size() -> RunError {
        SimpleException::new_msg(Self::RuntimeError, "dictionary changed size during iteration").into()
    }

    // --- names ---

    #[must_use]
    pub(crate) fn name_error(name: &str) -> RunError {
        SimpleException::new_msg(Self::NameError, format!("name '{name}' is not defined")).into()
    }

    /// Reading a closure cell that was never assigned.
    #[must_use]
    pub(crate) fn name_error_free_variable(name: &str) -> RunError {
        SimpleException::new_msg(
            Self::NameError,
            format!("free variable '{name}' referenced before assignment in enclosing scope"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn unbound_local_error(name: &str) -> RunError {
        SimpleException::new_msg(
            Self::UnboundLocalError,
            format!("cannot access local variable '{name}' where it is not associated with a value"),
        )
        .into()
    }

    // --- arithmetic ---

    /// `message` is one of CPython's per-operator texts, e.g. `"division by zero"`
    /// or `"integer modulo by zero"`.
    #[must_use]
    pub(crate) fn zero_division(message: &'static str) -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, message).into()
    }

    /// Matches CPython's format: `ZeroDivisionError: zero to a negative power`
    #[must_use]
    pub(crate) fn zero_negative_power() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "zero to a negative power").into()
    }

    /// Integers are 64-bit; results outside that range overflow instead of promoting.
    #[must_use]
    pub(crate) fn overflow_int() -> RunError {
        SimpleException::new_msg(Self::OverflowError, "integer result out of 64-bit range").into()
    }

    #[must_use]
    pub(crate) fn overflow_float_to_int() -> RunError {
        SimpleException::new_msg(Self::OverflowError, "cannot convert float infinity to integer").into()
    }

    #[must_use]
    pub(crate) fn value_error_negative_shift_count() -> RunError {
        SimpleException::new_msg(Self::ValueError, "negative shift count").into()
    }

    #[must_use]
    pub(crate) fn value_error_nan_to_int() -> RunError {
        SimpleException::new_msg(Self::ValueError, "cannot convert float NaN to integer").into()
    }

    // --- sequences and mappings ---

    #[must_use]
    pub(crate) fn index_error(type_: Type) -> RunError {
        let what = match type_ {
            Type::Str => "string",
            other => other.name(),
        };
        SimpleException::new_msg(Self::IndexError, format!("{what} index out of range")).into()
    }

    #[must_use]
    pub(crate) fn list_assignment_index_error() -> RunError {
        SimpleException::new_msg(Self::IndexError, "list assignment index out of range").into()
    }

    /// A missing dict key. The message is the key's repr, as CPython shows it.
    #[must_use]
    pub(crate) fn key_error(key: &Value) -> RunError {
        SimpleException::new_msg(Self::KeyError, key.py_repr()).into()
    }

    #[must_use]
    pub(crate) fn value_error_unpack_too_few(expected: usize, got: usize) -> RunError {
        SimpleException::new_msg(
            Self::ValueError,
            format!("not enough values to unpack (expected {expected}, got {got})"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn value_error_unpack_too_many(expected: usize) -> RunError {
        SimpleException::new_msg(
            Self::ValueError,
            format!("too many values to unpack (expected {expected})"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn value_error_range_step_zero() -> RunError {
        SimpleException::new_msg(Self::ValueError, "range() arg 3 must not be zero").into()
    }

    #[must_use]
    pub(crate) fn value_error_empty_sequence(name: &str) -> RunError {
        SimpleException::new_msg(Self::ValueError, format!("{name}() iterable argument is empty")).into()
    }

    #[must_use]
    pub(crate) fn value_error_invalid_int_literal(literal: &str) -> RunError {
        let mut message = String::from("invalid literal for int() with base 10: ");
        let _ = string_repr_fmt(literal, &mut message);
        SimpleException::new_msg(Self::ValueError, message).into()
    }

    #[must_use]
    pub(crate) fn value_error_invalid_float_literal(literal: &str) -> RunError {
        let mut message = String::from("could not convert string to float: ");
        let _ = string_repr_fmt(literal, &mut message);
        SimpleException::new_msg(Self::ValueError, message).into()
    }

    // --- VM faults ---

    /// The call-depth limit was reached.
    #[must_use]
    pub(crate) fn recursion_error() -> RunError {
        SimpleException::new_msg(Self::RecursionError, "maximum recursion depth exceeded").into()
    }

    #[must_use]
    pub(crate) fn memory_error(items: usize) -> RunError {
        SimpleException::new_msg(Self::MemoryError, format!("cannot allocate a sequence of {items} items")).into()
    }

    /// An opcode byte with no handler and no operator-table entry.
    #[must_use]
    pub(crate) fn unknown_opcode(byte: u8, name: Option<&str>) -> RunError {
        let message = match name {
            Some(name) => format!("unknown opcode {name} ({byte})"),
            None => format!("unknown opcode {byte}"),
        };
        SimpleException::new_msg(Self::SystemError, message).into()
    }

    /// `break` or `continue` reached the bottom of a frame's block stack.
    #[must_use]
    pub(crate) fn system_error_outside_loop(keyword: &str) -> RunError {
        SimpleException::new_msg(Self::SystemError, format!("'{keyword}' outside loop")).into()
    }

    /// `POP_BLOCK`, `END_FINALLY` or `POP_EXCEPT` found no block of the kind it closes.
    #[must_use]
    pub(crate) fn system_error_no_block(opname: &str) -> RunError {
        SimpleException::new_msg(Self::SystemError, format!("{opname} without a matching block")).into()
    }

    #[must_use]
    pub(crate) fn system_error_bad_closure(name: &str, expected: usize, got: usize) -> RunError {
        SimpleException::new_msg(
            Self::SystemError,
            format!("{name}() requires a closure of {expected} cells, not {got}"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn system_error_bad_operand(opname: &str, what: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::SystemError, format!("{opname}: bad operand {what}")).into()
    }

    /// The instruction stream cannot be decoded. Fatal for the frame being executed.
    #[must_use]
    pub(crate) fn decode_error(err: &DecodeError) -> RunError {
        SimpleException::new_msg(Self::DecodeError, err.to_string()).into()
    }
}

/// Simple lightweight representation of an exception.
///
/// This is the value half of the exception triple, and also what a Python-level exception
/// instance (`ValueError('x')`) holds.
#[derive(Debug, Clone, PartialEq, Hash, Serialize, Deserialize)]
pub struct SimpleException {
    exc_type: ExcType,
    arg: Option<String>,
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.py_repr_fmt(f)
    }
}

impl SimpleException {
    /// Creates a new exception with the given type and optional argument message.
    #[must_use]
    pub fn new(exc_type: ExcType, arg: Option<String>) -> Self {
        Self { exc_type, arg }
    }

    /// Creates a new exception with the given type and argument message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, arg: impl Into<String>) -> Self {
        Self {
            exc_type,
            arg: Some(arg.into()),
        }
    }

    /// Creates a new exception with the given type and no argument message.
    #[must_use]
    pub fn new_none(exc_type: ExcType) -> Self {
        Self { exc_type, arg: None }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }

    /// Returns the exception formatted as Python would repr it: `ValueError('boom')`.
    pub fn py_repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        let type_str: &'static str = self.exc_type.into();
        write!(f, "{type_str}(")?;
        if let Some(arg) = &self.arg {
            string_repr_fmt(arg, f)?;
        }
        f.write_char(')')
    }

    /// Python's `str(exc)`: the message alone, or an empty string.
    #[must_use]
    pub fn py_str(&self) -> &str {
        self.arg.as_deref().unwrap_or_default()
    }
}

/// One entry of a traceback: the code object and the offset of the faulting instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub code_name: Rc<str>,
    pub offset: usize,
}

/// An exception that escaped at least one frame: the (kind, value, origin) triple.
///
/// The traceback is stored innermost first, so `traceback[0]` is the origin frame. Each time
/// the exception leaves a frame unhandled, the caller's frame is appended.
#[derive(Debug, Clone)]
pub struct RaisedException {
    exc: Rc<SimpleException>,
    traceback: Vec<TraceFrame>,
}

impl RaisedException {
    pub(crate) fn new(exc: Rc<SimpleException>, origin: TraceFrame) -> Self {
        Self {
            exc,
            traceback: vec![origin],
        }
    }

    /// The exception type.
    #[must_use]
    pub fn kind(&self) -> ExcType {
        self.exc.exc_type()
    }

    /// The exception instance.
    #[must_use]
    pub fn value(&self) -> &SimpleException {
        &self.exc
    }

    /// Shared handle to the instance, as Python code sees it in an `except` body.
    pub(crate) fn instance(&self) -> Rc<SimpleException> {
        Rc::clone(&self.exc)
    }

    /// The frame the exception was raised in.
    #[must_use]
    pub fn origin(&self) -> &TraceFrame {
        &self.traceback[0]
    }

    /// Innermost first.
    #[must_use]
    pub fn traceback(&self) -> &[TraceFrame] {
        &self.traceback
    }

    /// Records that the exception propagated out of a callee into `frame`.
    pub(crate) fn add_caller_frame(&mut self, frame: TraceFrame) {
        self.traceback.push(frame);
    }
}

impl fmt::Display for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback (most recent call last):")?;
        for frame in self.traceback.iter().rev() {
            writeln!(f, "  in {} at offset {}", frame.code_name, frame.offset)?;
        }
        write!(f, "{}", self.exc.exc_type)?;
        match self.exc.arg() {
            Some(arg) if !arg.is_empty() => write!(f, ": {arg}"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for RaisedException {}

/// Runtime error produced by an instruction handler.
///
/// Three variants:
/// - `Exc`: a Python exception raised by the current instruction
/// - `Propagated`: an exception that escaped a callee frame and already carries a traceback
/// - `Internal`: a residual host fault, surfaced to Python code as `RuntimeError`
#[derive(Debug)]
pub(crate) enum RunError {
    Exc(Rc<SimpleException>),
    Propagated(RaisedException),
    Internal(Cow<'static, str>),
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(Rc::new(exc))
    }
}

impl From<RaisedException> for RunError {
    fn from(exc: RaisedException) -> Self {
        Self::Propagated(exc)
    }
}

impl RunError {
    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// The exception type this error will surface as.
    #[cfg(test)]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::Exc(exc) => exc.exc_type(),
            Self::Propagated(raised) => raised.kind(),
            Self::Internal(_) => ExcType::RuntimeError,
        }
    }

    /// Converts the error into a raised exception attributed to `frame`.
    ///
    /// A fresh exception gets `frame` as its origin; a propagated one gets it appended as a
    /// caller frame.
    pub(crate) fn into_raised(self, frame: TraceFrame) -> RaisedException {
        match self {
            Self::Exc(exc) => RaisedException::new(exc, frame),
            Self::Propagated(mut raised) => {
                raised.add_caller_frame(frame);
                raised
            }
            Self::Internal(err) => RaisedException::new(
                Rc::new(SimpleException::new_msg(
                    ExcType::RuntimeError,
                    format!("Internal error in pyframe: {err}"),
                )),
                frame,
            ),
        }
    }
}

/// Formats a list of parameter names for error messages.
///
/// Examples:
/// - `["a"]` -> `'a'`
/// - `["a", "b"]` -> `'a' and 'b'`
/// - `["a", "b", "c"]` -> `'a', 'b', and 'c'`
fn format_param_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => format!("'{one}'"),
        [first, second] => format!("'{first}' and '{second}'"),
        [rest @ .., last] => {
            let rest: Vec<_> = rest.iter().map(|n| format!("'{n}'")).collect();
            format!("{}, and '{last}'", rest.join(", "))
        }
    }
}
