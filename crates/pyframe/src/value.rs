use std::{
    borrow::Cow,
    cell::RefCell,
    cmp::Ordering,
    fmt::{self, Write},
    rc::Rc,
};

use crate::{
    builtins::Builtins,
    bytecode::{Code, Const},
    exception::{ExcType, RunResult, SimpleException},
    for_iterator::ForIterator,
    function::{Cell, Function},
    types::{Dict, Range, Type, str::char_at, str::string_repr_fmt},
};

/// Primary value type representing Python objects at runtime.
///
/// Immediate values (`None`, `bool`, `int`, `float`, `range`) are stored inline. Everything
/// else is reference counted, so cloning a `Value` shares the object the way Python
/// references do: mutating a cloned list is visible through every clone.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    /// 64-bit integer. Arithmetic is checked and overflows to `OverflowError`.
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Value]>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Dict>>),
    Range(Range),
    Function(Rc<Function>),
    /// A builtin function such as `len` or `print`.
    Builtin(Builtins),
    /// An exception class such as `ValueError`; calling it builds an instance.
    ExcType(ExcType),
    /// Exception instance (e.g., result of `ValueError('msg')`).
    Exception(Rc<SimpleException>),
    /// A code object loaded as a constant, consumed by `MAKE_FUNCTION`.
    Code(Rc<Code>),
    /// A closure cell pushed by `LOAD_CLOSURE`, consumed by `MAKE_CLOSURE`.
    Cell(Cell),
    /// Iterator produced by `GET_ITER`.
    Iter(Rc<RefCell<ForIterator>>),
}

impl Value {
    /// Materializes a constant-pool entry.
    #[must_use]
    pub fn from_const(c: &Const) -> Self {
        match c {
            Const::None => Self::None,
            Const::Bool(b) => Self::Bool(*b),
            Const::Int(i) => Self::Int(*i),
            Const::Float(f) => Self::Float(*f),
            Const::Str(s) => Self::Str(Rc::clone(s)),
            Const::Tuple(items) => Self::new_tuple(items.iter().map(Self::from_const).collect()),
            Const::Code(code) => Self::Code(Rc::clone(code)),
        }
    }

    #[must_use]
    pub fn new_str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    #[must_use]
    pub fn new_tuple(items: Vec<Self>) -> Self {
        Self::Tuple(items.into())
    }

    #[must_use]
    pub fn new_list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub(crate) fn new_dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    #[must_use]
    pub fn py_type(&self) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Str(_) => Type::Str,
            Self::Tuple(_) => Type::Tuple,
            Self::List(_) => Type::List,
            Self::Dict(_) => Type::Dict,
            Self::Range(_) => Type::Range,
            Self::Function(_) => Type::Function,
            Self::Builtin(_) => Type::BuiltinFunction,
            Self::ExcType(_) => Type::Type,
            Self::Exception(exc) => Type::Exception(exc.exc_type()),
            Self::Code(_) => Type::Code,
            Self::Cell(_) => Type::Cell,
            Self::Iter(_) => Type::Iterator,
        }
    }

    /// Python truthiness.
    #[must_use]
    pub fn py_bool(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Range(r) => !r.is_empty(),
            _ => true,
        }
    }

    /// Numeric view for arithmetic and comparison; `bool` counts as `int`.
    pub(crate) fn as_int_like(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of any real number.
    #[expect(clippy::cast_precision_loss, reason = "Python int-to-float semantics")]
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            other => other.as_int_like().map(|i| i as f64),
        }
    }

    /// An integer usable as an index or count, like Python's `__index__`.
    pub(crate) fn as_index(&self) -> RunResult<i64> {
        self.as_int_like()
            .ok_or_else(|| ExcType::type_error_not_integer(self.py_type()))
    }

    /// Python's `len()`, or `None` for values without a length.
    #[must_use]
    pub fn py_len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::Tuple(items) => Some(items.len()),
            Self::List(items) => Some(items.borrow().len()),
            Self::Dict(dict) => Some(dict.borrow().len()),
            Self::Range(r) => Some(r.len()),
            _ => None,
        }
    }

    /// Identity comparison (`is`).
    ///
    /// Immediate values compare by value, which matches CPython for `None`, `True`/`False`
    /// and small integers.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::ExcType(a), Self::ExcType(b)) => a == b,
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Code(a), Self::Code(b)) => Rc::ptr_eq(a, b),
            (Self::Cell(a), Self::Cell(b)) => a.ptr_eq(b),
            (Self::Iter(a), Self::Iter(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Python `==`.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => seq_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow()),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b) || a.borrow().py_eq(&b.borrow()),
            (Self::Range(a), Self::Range(b)) => {
                a.len() == b.len() && (a.is_empty() || (a.start == b.start && (a.len() == 1 || a.step == b.step)))
            }
            (Self::Float(_), _) | (_, Self::Float(_)) => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => match (self.as_int_like(), other.as_int_like()) {
                (Some(a), Some(b)) => a == b,
                _ => self.is(other),
            },
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. `None` when the types are not orderable.
    #[must_use]
    pub fn py_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Tuple(a), Self::Tuple(b)) => seq_cmp(a, b),
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Some(Ordering::Equal);
                }
                seq_cmp(&a.borrow(), &b.borrow())
            }
            (Self::Float(_), _) | (_, Self::Float(_)) => self.as_f64()?.partial_cmp(&other.as_f64()?),
            _ => Some(self.as_int_like()?.cmp(&other.as_int_like()?)),
        }
    }

    /// Python `item in self`.
    pub(crate) fn py_contains(&self, item: &Self) -> RunResult<bool> {
        match self {
            Self::Str(s) => match item {
                Self::Str(needle) => Ok(s.contains(&**needle)),
                other => Err(ExcType::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.py_type()
                ))),
            },
            Self::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
            Self::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
            Self::Dict(dict) => dict.borrow().contains_key(item),
            Self::Range(r) => Ok(match item {
                #[expect(clippy::cast_possible_truncation, reason = "checked integral and in range")]
                Self::Float(f) if f.fract() == 0.0 && f.abs() < 9e18 => r.contains(*f as i64),
                other => other.as_int_like().is_some_and(|v| r.contains(v)),
            }),
            _ => Err(ExcType::type_error_not_container(self.py_type())),
        }
    }

    /// `self[key]`.
    pub(crate) fn get_item(&self, key: &Self) -> RunResult<Self> {
        match self {
            Self::Dict(dict) => dict.borrow().get(key)?.ok_or_else(|| ExcType::key_error(key)),
            Self::List(items) => {
                let items = items.borrow();
                let index = seq_index(self.py_type(), key, items.len())?;
                Ok(items[index].clone())
            }
            Self::Tuple(items) => {
                let index = seq_index(self.py_type(), key, items.len())?;
                Ok(items[index].clone())
            }
            Self::Str(s) => {
                let index = key
                    .as_int_like()
                    .ok_or_else(|| ExcType::type_error_indices(Type::Str, key.py_type()))?;
                let c = char_at(s, index).ok_or_else(|| ExcType::index_error(Type::Str))?;
                Ok(Self::Str(c.to_string().into()))
            }
            Self::Range(r) => {
                let index = key
                    .as_int_like()
                    .ok_or_else(|| ExcType::type_error_indices(Type::Range, key.py_type()))?;
                r.get(index)
                    .map(Self::Int)
                    .ok_or_else(|| ExcType::index_error(Type::Range))
            }
            _ => Err(ExcType::type_error_not_sub(self.py_type())),
        }
    }

    /// `self[key] = value`.
    pub(crate) fn set_item(&self, key: Self, value: Self) -> RunResult<()> {
        match self {
            Self::Dict(dict) => dict.borrow_mut().set(key, value),
            Self::List(items) => {
                let mut items = items.borrow_mut();
                let index = if key.as_int_like().is_some() {
                    seq_index(Type::List, &key, items.len()).map_err(|_| ExcType::list_assignment_index_error())?
                } else {
                    seq_index(Type::List, &key, items.len())?
                };
                items[index] = value;
                Ok(())
            }
            _ => Err(ExcType::type_error_not_sub_assignment(self.py_type())),
        }
    }

    /// `del self[key]`.
    pub(crate) fn del_item(&self, key: &Self) -> RunResult<()> {
        match self {
            Self::Dict(dict) => match dict.borrow_mut().remove(key)? {
                Some(_) => Ok(()),
                None => Err(ExcType::key_error(key)),
            },
            Self::List(items) => {
                let mut items = items.borrow_mut();
                let index = seq_index(Type::List, key, items.len())?;
                items.remove(index);
                Ok(())
            }
            _ => Err(ExcType::type_error_not_sub_deletion(self.py_type())),
        }
    }

    /// Python `repr()`.
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut out = String::new();
        let _ = self.repr_fmt(&mut out);
        out
    }

    /// Python `str()`: strings are returned unquoted, exception instances as their message.
    #[must_use]
    pub fn py_str(&self) -> Cow<'_, str> {
        match self {
            Self::Str(s) => Cow::Borrowed(s),
            Self::Exception(exc) => Cow::Borrowed(exc.py_str()),
            other => Cow::Owned(other.py_repr()),
        }
    }

    pub fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => float_repr_fmt(*v, f),
            Self::Str(s) => string_repr_fmt(s, f),
            Self::Tuple(items) => {
                f.write_char('(')?;
                seq_repr_fmt(items, f)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::List(items) => {
                let Ok(items) = items.try_borrow() else {
                    return f.write_str("[...]");
                };
                f.write_char('[')?;
                seq_repr_fmt(&items, f)?;
                f.write_char(']')
            }
            Self::Dict(dict) => match dict.try_borrow() {
                Ok(dict) => dict.repr_fmt(f),
                Err(_) => f.write_str("{...}"),
            },
            Self::Range(r) => r.repr_fmt(f),
            Self::Function(func) => write!(f, "<function {}>", func.name()),
            Self::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Self::ExcType(e) => write!(f, "<class '{e}'>"),
            Self::Exception(exc) => exc.py_repr_fmt(f),
            Self::Code(code) => write!(f, "<code object {}>", code.name),
            Self::Cell(cell) => match cell.get() {
                Some(v) => write!(f, "<cell: {} object>", v.py_type()),
                None => f.write_str("<cell: empty>"),
            },
            Self::Iter(_) => f.write_str("<iterator object>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.py_str())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

/// Lexicographic comparison: the first unequal pair decides, otherwise the shorter sequence
/// is smaller.
fn seq_cmp(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y) {
            return x.py_cmp(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

fn seq_repr_fmt(items: &[Value], f: &mut impl Write) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.repr_fmt(f)?;
    }
    Ok(())
}

/// Resolves a Python index (negative counts from the end) against a sequence length.
fn seq_index(type_: Type, key: &Value, len: usize) -> RunResult<usize> {
    let index = key
        .as_int_like()
        .ok_or_else(|| ExcType::type_error_indices(type_, key.py_type()))?;
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len_i } else { index };
    usize::try_from(resolved)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| ExcType::index_error(type_))
}

/// Writes a float the way Python's `repr()` does: always with a decimal point or exponent,
/// switching to exponent notation outside `1e-4 <= |v| < 1e16`.
pub(crate) fn float_repr_fmt(v: f64, f: &mut impl Write) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{v:e}");
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        write!(f, "{mantissa}e{sign}{digits:0>2}")
    } else if v.fract() == 0.0 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}
