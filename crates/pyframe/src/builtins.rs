//! Built-in functions.
//!
//! Every builtin is a variant of [`Builtins`]; the builtin namespace binds each variant's
//! lowercase name next to the builtin exception types.

mod abs;
mod min_max;
mod print;
mod sum;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    for_iterator::collect_iterable,
    io::PrintWriter,
    types::Range,
    value::Value,
};

/// Enumerates every builtin function.
///
/// Uses strum derives for `Display`, `FromStr` and `Into<&'static str>`.
/// All variants serialize to lowercase (e.g., `Print` -> "print").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Builtins {
    Print,
    Len,
    Range,
    Abs,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Min,
    Max,
    Sum,
}

impl Builtins {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Executes the builtin. `print` writes through `writer`.
    pub(crate) fn call(self, args: ArgValues, writer: &mut impl PrintWriter) -> RunResult<Value> {
        match self {
            Self::Print => print::builtin_print(args, writer),
            Self::Len => {
                let value = args.get_one_arg("len")?;
                match value.py_len() {
                    Some(len) => i64::try_from(len).map(Value::Int).map_err(|_| ExcType::overflow_int()),
                    None => Err(ExcType::type_error_object_has_no_len(value.py_type())),
                }
            }
            Self::Range => Range::init(args),
            Self::Abs => abs::builtin_abs(args),
            Self::Str => Ok(match args.get_zero_one_arg("str")? {
                Some(value) => Value::new_str(value.py_str()),
                None => Value::new_str(""),
            }),
            Self::Repr => {
                let value = args.get_one_arg("repr")?;
                Ok(Value::new_str(value.py_repr()))
            }
            Self::Int => args.get_zero_one_arg("int")?.map_or(Ok(Value::Int(0)), |v| to_int(&v)),
            Self::Float => args
                .get_zero_one_arg("float")?
                .map_or(Ok(Value::Float(0.0)), |v| to_float(&v)),
            Self::Bool => Ok(Value::Bool(
                args.get_zero_one_arg("bool")?.is_some_and(|v| v.py_bool()),
            )),
            Self::List => Ok(Value::new_list(match args.get_zero_one_arg("list")? {
                Some(iterable) => collect_iterable(&iterable)?,
                None => Vec::new(),
            })),
            Self::Tuple => Ok(Value::new_tuple(match args.get_zero_one_arg("tuple")? {
                Some(iterable) => collect_iterable(&iterable)?,
                None => Vec::new(),
            })),
            Self::Min => min_max::builtin_min(args),
            Self::Max => min_max::builtin_max(args),
            Self::Sum => sum::builtin_sum(args),
        }
    }
}

/// `int(x)`: truncates floats, parses base-10 strings.
fn to_int(value: &Value) -> RunResult<Value> {
    match value {
        Value::Int(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(*f).map(Value::Int),
        Value::Str(s) => {
            let literal = s.trim().replace('_', "");
            match literal.parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                Err(err) if matches!(
                    err.kind(),
                    std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow
                ) =>
                {
                    Err(ExcType::overflow_int())
                }
                Err(_) => Err(ExcType::value_error_invalid_int_literal(s)),
            }
        }
        other => Err(ExcType::type_error_int_conversion(other.py_type())),
    }
}

/// 2^63, the first float past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

#[expect(clippy::cast_possible_truncation, reason = "range checked before the cast")]
pub(crate) fn float_to_int(f: f64) -> RunResult<i64> {
    let t = f.trunc();
    if f.is_nan() {
        Err(ExcType::value_error_nan_to_int())
    } else if f.is_infinite() {
        Err(ExcType::overflow_float_to_int())
    } else if t >= I64_BOUND || t < -I64_BOUND {
        Err(ExcType::overflow_int())
    } else {
        Ok(t as i64)
    }
}

/// `float(x)`: accepts numbers and strings such as `"1.5"`, `"inf"` or `"nan"`.
fn to_float(value: &Value) -> RunResult<Value> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ExcType::value_error_invalid_float_literal(s)),
        other => other
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| ExcType::type_error_float_conversion(other.py_type())),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::io::CollectStringPrint;

    fn call(builtin: Builtins, args: Vec<Value>) -> RunResult<Value> {
        builtin.call(ArgValues::positional(args), &mut CollectStringPrint::new())
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(Builtins::from_str("len").unwrap(), Builtins::Len);
        assert_eq!(Builtins::Print.name(), "print");
        assert!(Builtins::from_str("open").is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call(Builtins::Int, vec![Value::from(" -42 ")]).unwrap(), Value::Int(-42));
        assert_eq!(call(Builtins::Int, vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(
            call(Builtins::Int, vec![Value::from("x")]).unwrap_err().exc_type(),
            ExcType::ValueError
        );
        assert_eq!(
            call(Builtins::Int, vec![Value::Float(f64::INFINITY)]).unwrap_err().exc_type(),
            ExcType::OverflowError
        );
        assert_eq!(call(Builtins::Float, vec![Value::from("1.5")]).unwrap(), Value::Float(1.5));
        assert_eq!(call(Builtins::Str, vec![Value::Float(2.0)]).unwrap(), Value::from("2.0"));
        assert_eq!(call(Builtins::Repr, vec![Value::from("a")]).unwrap(), Value::from("'a'"));
        assert_eq!(call(Builtins::Bool, vec![]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn len_and_collections() {
        let range = call(Builtins::Range, vec![Value::Int(3)]).unwrap();
        assert_eq!(call(Builtins::Len, vec![range.clone()]).unwrap(), Value::Int(3));
        let list = call(Builtins::List, vec![range]).unwrap();
        assert_eq!(list.py_repr(), "[0, 1, 2]");
        let tuple = call(Builtins::Tuple, vec![Value::from("ab")]).unwrap();
        assert_eq!(tuple.py_repr(), "('a', 'b')");
        let err = call(Builtins::Len, vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
    }
}
