//! Implementation of the sum() builtin function.

use crate::{
    args::ArgValues,
    bytecode::{BinaryOp, binary_op},
    exception::{ExcType, RunResult},
    for_iterator::ForIterator,
    types::Type,
    value::Value,
};

/// Implementation of the sum() builtin function.
///
/// Sums the items of an iterable from left to right with an optional start value.
/// The default start value is 0. String start values are explicitly rejected
/// (use `''.join(seq)` instead for string concatenation).
pub fn builtin_sum(args: ArgValues) -> RunResult<Value> {
    let (iterable, start) = args.get_one_two_args("sum")?;

    let mut accumulator = match start {
        Some(v) if v.py_type() == Type::Str => {
            return Err(ExcType::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
        }
        Some(v) => v,
        None => Value::Int(0),
    };

    let mut iter = ForIterator::new(&iterable)?;
    while let Some(item) = iter.for_next()? {
        accumulator = binary_op(BinaryOp::Add, &accumulator, &item)?;
    }
    Ok(accumulator)
}
