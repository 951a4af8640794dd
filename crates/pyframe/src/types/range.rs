//! Python range type implementation.
//!
//! A range is computed lazily: only `start`, `stop` and `step` are stored.

use std::fmt::{self, Write};

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    value::Value,
};

/// Python range object representing an immutable sequence of integers.
///
/// Supports three forms of construction:
/// - `range(stop)` - integers from 0 to stop-1
/// - `range(start, stop)` - integers from start to stop-1
/// - `range(start, stop, step)` - integers from start, incrementing by step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    /// Never 0.
    pub step: i64,
}

impl Range {
    /// Number of elements the range yields.
    #[must_use]
    pub fn len(&self) -> usize {
        let (start, stop, step) = (i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        let len = if step > 0 && stop > start {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        usize::try_from(len).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a Python index (negative counts from the end).
    #[must_use]
    pub fn get(&self, index: i64) -> Option<i64> {
        let len = i128::try_from(self.len()).ok()?;
        let index = i128::from(index);
        let index = if index < 0 { index + len } else { index };
        if !(0..len).contains(&index) {
            return None;
        }
        i64::try_from(i128::from(self.start) + index * i128::from(self.step)).ok()
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let offset = i128::from(value) - i128::from(self.start);
        let step = i128::from(self.step);
        let in_bounds = if step > 0 {
            value >= self.start && value < self.stop
        } else {
            value <= self.start && value > self.stop
        };
        in_bounds && offset % step == 0
    }

    /// Creates a range from the `range()` constructor call.
    pub(crate) fn init(args: ArgValues) -> RunResult<Value> {
        args.check_no_kwargs("range")?;
        let ints = args
            .into_positional()
            .iter()
            .map(Value::as_index)
            .collect::<RunResult<Vec<_>>>()?;
        let range = match ints[..] {
            [] => return Err(ExcType::type_error_at_least("range", 1, 0)),
            [stop] => Self { start: 0, stop, step: 1 },
            [start, stop] => Self { start, stop, step: 1 },
            [_, _, 0] => return Err(ExcType::value_error_range_step_zero()),
            [start, stop, step] => Self { start, stop, step },
            _ => return Err(ExcType::type_error_at_most("range", 3, ints.len())),
        };
        Ok(Value::Range(range))
    }

    pub fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        if self.step == 1 {
            write!(f, "range({}, {})", self.start, self.stop)
        } else {
            write!(f, "range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_indexing() {
        let r = Range { start: 0, stop: 10, step: 3 };
        assert_eq!(r.len(), 4);
        assert_eq!(r.get(-1), Some(9));
        assert_eq!(r.get(4), None);
        assert!(r.contains(6));
        assert!(!r.contains(7));

        let down = Range { start: 5, stop: 0, step: -2 };
        assert_eq!(down.len(), 3);
        assert_eq!(down.get(2), Some(1));
        assert!(down.contains(3));
        assert!(Range { start: 3, stop: 3, step: 1 }.is_empty());
    }

    #[test]
    fn extreme_bounds_do_not_overflow() {
        let r = Range {
            start: i64::MIN,
            stop: i64::MAX,
            step: 1,
        };
        assert_eq!(r.len(), usize::try_from(u64::MAX).unwrap_or(usize::MAX));
        assert_eq!(r.get(-1), Some(i64::MAX - 1));
    }
}
