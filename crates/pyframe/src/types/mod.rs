//! Python-level types of runtime values, plus the container implementations behind them.

pub mod dict;
pub mod range;
pub mod str;

use std::fmt;

pub use dict::Dict;
pub use range::Range;

use crate::exception::ExcType;

/// The Python type of a value, as shown in error messages (`'int' object is not callable`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    Tuple,
    List,
    Dict,
    Range,
    Function,
    BuiltinFunction,
    /// The type of an exception class such as `ValueError` itself.
    Type,
    /// An exception instance of the given class.
    Exception(ExcType),
    Code,
    Cell,
    Iterator,
}

impl Type {
    /// The Python name of the type.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NoneType => "NoneType",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Tuple => "tuple",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Range => "range",
            Self::Function => "function",
            Self::BuiltinFunction => "builtin_function_or_method",
            Self::Type => "type",
            Self::Exception(exc_type) => exc_type.into(),
            Self::Code => "code",
            Self::Cell => "cell",
            Self::Iterator => "iterator",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
