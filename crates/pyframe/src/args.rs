use std::rc::Rc;

use crate::{exception::ExcType, exception::RunResult, value::Value};

/// Arguments collected at a call site.
///
/// `CALL_FUNCTION` pops positional values and `(name, value)` keyword pairs off the operand
/// stack; they are handed to the callee in the order they were pushed.
#[derive(Debug, Default)]
pub struct ArgValues {
    pub positional: Vec<Value>,
    pub keywords: Vec<(Rc<str>, Value)>,
}

impl ArgValues {
    #[must_use]
    pub fn new(positional: Vec<Value>, keywords: Vec<(Rc<str>, Value)>) -> Self {
        Self { positional, keywords }
    }

    /// Positional arguments only.
    #[must_use]
    pub fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    /// Total number of arguments passed.
    #[must_use]
    pub fn count(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    /// Builtins take no keyword arguments except where noted.
    pub(crate) fn check_no_kwargs(&self, name: &str) -> RunResult<()> {
        if self.keywords.is_empty() {
            Ok(())
        } else {
            Err(ExcType::type_error_no_kwargs(name))
        }
    }

    #[must_use]
    pub fn into_positional(self) -> Vec<Value> {
        self.positional
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub(crate) fn get_one_arg(self, name: &str) -> RunResult<Value> {
        self.check_no_kwargs(name)?;
        let count = self.count();
        match <[Value; 1]>::try_from(self.positional) {
            Ok([a]) => Ok(a),
            Err(_) => Err(ExcType::type_error_arg_count(name, 1, count)),
        }
    }

    /// Checks that zero or one positional argument was passed.
    pub(crate) fn get_zero_one_arg(self, name: &str) -> RunResult<Option<Value>> {
        self.check_no_kwargs(name)?;
        let mut positional = self.positional;
        match positional.len() {
            0 | 1 => Ok(positional.pop()),
            n => Err(ExcType::type_error_at_most(name, 1, n)),
        }
    }

    /// Checks that one or two positional arguments were passed.
    pub(crate) fn get_one_two_args(self, name: &str) -> RunResult<(Value, Option<Value>)> {
        self.check_no_kwargs(name)?;
        let mut positional = self.positional.into_iter();
        match (positional.next(), positional.next(), positional.len()) {
            (Some(a), b, 0) => Ok((a, b)),
            (None, ..) => Err(ExcType::type_error_at_least(name, 1, 0)),
            (Some(_), _, rest) => Err(ExcType::type_error_at_most(name, 2, rest + 2)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_helpers() {
        let one = ArgValues::positional(vec![Value::Int(1)]);
        assert_eq!(one.get_one_arg("len").unwrap(), Value::Int(1));

        let two = ArgValues::positional(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(two.get_one_arg("len").unwrap_err().exc_type(), ExcType::TypeError);

        let three = ArgValues::positional(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(three.get_one_two_args("x").is_err());

        let kw = ArgValues::new(vec![], vec![("k".into(), Value::None)]);
        assert!(kw.get_zero_one_arg("x").is_err());
    }
}
