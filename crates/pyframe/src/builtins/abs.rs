//! Implementation of the abs() builtin function.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    value::Value,
};

/// Implementation of the abs() builtin function.
///
/// Returns the absolute value of a number. Works with integers and floats; `abs(-2**63)`
/// does not fit in 64 bits and overflows.
pub fn builtin_abs(args: ArgValues) -> RunResult<Value> {
    let value = args.get_one_arg("abs")?;
    match &value {
        Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(ExcType::overflow_int),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        other => Err(ExcType::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.py_type()
        ))),
    }
}
