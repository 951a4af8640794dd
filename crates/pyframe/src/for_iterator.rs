//! Iterator support for `GET_ITER` / `FOR_ITER` and for builtins that consume iterables.
//!
//! Iteration state is an index into the underlying container rather than a Rust iterator,
//! so the container stays shared (and mutable for lists) while a loop walks it.

use std::{cell::RefCell, rc::Rc};

use crate::{
    exception::{ExcType, RunResult},
    resource::check_sequence_size,
    types::{Dict, Range},
    value::Value,
};

/// Iterator state for Python for loops.
#[derive(Debug)]
pub struct ForIterator {
    /// Current iteration index, shared across all iterator types.
    index: usize,
    iter_value: ForIterValue,
}

#[derive(Debug)]
enum ForIterValue {
    Range(Range),
    /// Unlike dict, a list may change during iteration; its current length is checked on
    /// every step.
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    /// Iterates keys. The length is captured to detect mutation.
    DictKeys { dict: Rc<RefCell<Dict>>, len: usize },
    /// Characters of a string, walked by byte offset.
    Str { string: Rc<str>, byte_offset: usize },
}

impl ForIterator {
    /// Creates an iterator over `value`, or a `TypeError` if it is not iterable.
    pub(crate) fn new(value: &Value) -> RunResult<Self> {
        let iter_value = match value {
            Value::Range(r) => ForIterValue::Range(*r),
            Value::List(list) => ForIterValue::List(Rc::clone(list)),
            Value::Tuple(items) => ForIterValue::Tuple(Rc::clone(items)),
            Value::Dict(dict) => ForIterValue::DictKeys {
                dict: Rc::clone(dict),
                len: dict.borrow().len(),
            },
            Value::Str(s) => ForIterValue::Str {
                string: Rc::clone(s),
                byte_offset: 0,
            },
            other => return Err(ExcType::type_error_not_iterable(other.py_type())),
        };
        Ok(Self { index: 0, iter_value })
    }

    /// Returns the next item, or `Ok(None)` once exhausted.
    ///
    /// Fails with `RuntimeError` if a dict changed size since iteration started.
    pub(crate) fn for_next(&mut self) -> RunResult<Option<Value>> {
        let item = match &mut self.iter_value {
            ForIterValue::Range(range) => {
                let Ok(index) = i64::try_from(self.index) else {
                    return Ok(None);
                };
                range.get(index).map(Value::Int)
            }
            ForIterValue::List(list) => list.borrow().get(self.index).cloned(),
            ForIterValue::Tuple(items) => items.get(self.index).cloned(),
            ForIterValue::DictKeys { dict, len } => {
                let dict = dict.borrow();
                if dict.len() != *len {
                    return Err(ExcType::runtime_error_dict_changed_size());
                }
                dict.key_at(self.index)
            }
            ForIterValue::Str { string, byte_offset } => string[*byte_offset..].chars().next().map(|c| {
                *byte_offset += c.len_utf8();
                Value::Str(c.to_string().into())
            }),
        };
        if item.is_some() {
            self.index += 1;
        }
        Ok(item)
    }

    /// Remaining item count, used to size collections.
    #[must_use]
    pub fn size_hint(&self) -> usize {
        let len = match &self.iter_value {
            ForIterValue::Range(r) => r.len(),
            ForIterValue::List(list) => list.borrow().len(),
            ForIterValue::Tuple(items) => items.len(),
            ForIterValue::DictKeys { len, .. } => *len,
            ForIterValue::Str { string, byte_offset } => {
                return string.get(*byte_offset..).map_or(0, |rest| rest.chars().count());
            }
        };
        len.saturating_sub(self.index)
    }

    /// Collects all remaining items.
    ///
    /// Used by `list()`, `tuple()`, `UNPACK_SEQUENCE` and the aggregate builtins.
    pub(crate) fn collect(mut self) -> RunResult<Vec<Value>> {
        self.drain()
    }

    /// Drains the remaining items. A range too large to materialize raises `MemoryError`
    /// before anything is allocated.
    fn drain(&mut self) -> RunResult<Vec<Value>> {
        let hint = self.size_hint();
        check_sequence_size(hint, size_of::<Value>())?;
        let mut items = Vec::with_capacity(hint);
        while let Some(item) = self.for_next()? {
            items.push(item);
        }
        Ok(items)
    }
}

/// Materializes any iterable value, draining an iterator value in place.
pub(crate) fn collect_iterable(value: &Value) -> RunResult<Vec<Value>> {
    match value {
        Value::Iter(iter) => iter.borrow_mut().drain(),
        other => ForIterator::new(other)?.collect(),
    }
}
