//! `COMPARE_OP`.

use std::cmp::Ordering;

use super::{VM, exceptions::exception_matches};
use crate::{
    bytecode::CompareOp,
    exception::{ExcType, RunResult},
    io::PrintWriter,
    value::Value,
};

impl<P: PrintWriter> VM<'_, P> {
    pub(super) fn compare(&mut self, op: CompareOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = compare_values(op, &lhs, &rhs)?;
        self.push(Value::Bool(result))
    }
}

fn compare_values(op: CompareOp, lhs: &Value, rhs: &Value) -> RunResult<bool> {
    match op {
        CompareOp::Eq => Ok(lhs.py_eq(rhs)),
        CompareOp::Ne => Ok(!lhs.py_eq(rhs)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => ordering(op, lhs, rhs),
        CompareOp::In => rhs.py_contains(lhs),
        CompareOp::NotIn => rhs.py_contains(lhs).map(|found| !found),
        CompareOp::Is => Ok(lhs.is(rhs)),
        CompareOp::IsNot => Ok(!lhs.is(rhs)),
        CompareOp::ExceptionMatch => exception_matches(lhs, rhs),
    }
}

fn ordering(op: CompareOp, lhs: &Value, rhs: &Value) -> RunResult<bool> {
    // floats compare directly so NaN is unordered rather than a type error
    if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
        if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
            return Ok(match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                _ => a >= b,
            });
        }
    }
    let ordering = lhs
        .py_cmp(rhs)
        .ok_or_else(|| ExcType::compare_type_error(op.symbol(), lhs.py_type(), rhs.py_type()))?;
    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::SimpleException;

    fn cmp(op: CompareOp, lhs: Value, rhs: Value) -> RunResult<bool> {
        compare_values(op, &lhs, &rhs)
    }

    #[test]
    fn orderings() {
        assert!(cmp(CompareOp::Lt, Value::Int(3), Value::Int(5)).unwrap());
        assert!(cmp(CompareOp::Ge, Value::Float(2.5), Value::Int(2)).unwrap());
        assert!(cmp(CompareOp::Le, Value::from("ab"), Value::from("b")).unwrap());
        assert!(!cmp(CompareOp::Lt, Value::Float(f64::NAN), Value::Int(1)).unwrap());
        let err = cmp(CompareOp::Lt, Value::Int(1), Value::from("a")).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
    }

    #[test]
    fn membership_and_identity() {
        let list = Value::new_list(vec![Value::Int(1), Value::from("x")]);
        assert!(cmp(CompareOp::In, Value::from("x"), list.clone()).unwrap());
        assert!(cmp(CompareOp::NotIn, Value::Int(2), list.clone()).unwrap());
        assert!(cmp(CompareOp::Is, list.clone(), list.clone()).unwrap());
        assert!(cmp(CompareOp::IsNot, list, Value::new_list(vec![])).unwrap());
        assert!(cmp(CompareOp::Is, Value::None, Value::None).unwrap());
    }

    #[test]
    fn exception_match() {
        let exc = Value::Exception(std::rc::Rc::new(SimpleException::new_none(ExcType::KeyError)));
        assert!(cmp(CompareOp::ExceptionMatch, exc, Value::ExcType(ExcType::LookupError)).unwrap());
    }
}
