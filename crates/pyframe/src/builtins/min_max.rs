//! Implementation of the min() and max() builtin functions.

use std::cmp::Ordering;

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    for_iterator::ForIterator,
    value::Value,
};

/// Implementation of the min() builtin function.
///
/// Returns the smallest item in an iterable or the smallest of two or more arguments.
/// Supports two forms:
/// - `min(iterable)` - returns smallest item from iterable
/// - `min(arg1, arg2, ...)` - returns smallest of the arguments
pub fn builtin_min(args: ArgValues) -> RunResult<Value> {
    builtin_min_max(args, true)
}

/// Implementation of the max() builtin function.
pub fn builtin_max(args: ArgValues) -> RunResult<Value> {
    builtin_min_max(args, false)
}

/// Shared implementation for min() and max().
///
/// When `is_min` is true, returns the minimum; otherwise returns the maximum. Ties keep the
/// first item seen.
fn builtin_min_max(args: ArgValues, is_min: bool) -> RunResult<Value> {
    let func_name = if is_min { "min" } else { "max" };
    args.check_no_kwargs(func_name)?;

    let mut positional = args.into_positional();
    let items = match positional.len() {
        0 => return Err(ExcType::type_error_at_least(func_name, 1, 0)),
        1 => {
            let iterable = positional.pop().unwrap_or(Value::None);
            ForIterator::new(&iterable)?.collect()?
        }
        _ => positional,
    };

    let mut items = items.into_iter();
    let Some(mut result) = items.next() else {
        return Err(ExcType::value_error_empty_sequence(func_name));
    };
    for item in items {
        let should_replace = match item.py_cmp(&result) {
            Some(Ordering::Less) => is_min,
            Some(Ordering::Greater) => !is_min,
            Some(Ordering::Equal) => false,
            None => {
                let op = if is_min { "<" } else { ">" };
                return Err(ExcType::compare_type_error(op, item.py_type(), result.py_type()));
            }
        };
        if should_replace {
            result = item;
        }
    }
    Ok(result)
}
