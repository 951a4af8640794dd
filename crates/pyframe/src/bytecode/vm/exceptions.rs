//! `RAISE_VARARGS` and `except` matching.

use std::rc::Rc;

use super::{VM, blocks::Why};
use crate::{
    args::ArgValues,
    exception::{ExcType, RunError, RunResult, SimpleException},
    io::PrintWriter,
    value::Value,
};

impl<P: PrintWriter> VM<'_, P> {
    /// `RAISE_VARARGS argc`.
    ///
    /// - 0: re-raise the exception being handled, keeping its traceback
    /// - 1: raise TOS, an exception type or instance
    /// - 2: raise TOS1 instantiated with TOS as its argument
    pub(super) fn raise_varargs(&mut self, argc: u32) -> RunResult<Option<Why>> {
        let exc = match argc {
            0 => {
                let exc = self
                    .handled_exception()
                    .ok_or_else(ExcType::runtime_error_no_active_exception)?;
                self.last_exception = Some(exc);
                return Ok(Some(Why::Exception));
            }
            1 => {
                let exc = self.pop()?;
                instantiate(exc, None)?
            }
            2 => {
                let arg = self.pop()?;
                let exc = self.pop()?;
                instantiate(exc, Some(arg))?
            }
            other => return Err(ExcType::system_error_bad_operand("RAISE_VARARGS", other)),
        };
        Err(RunError::Exc(exc))
    }
}

/// Turns a raised value into an exception instance. A type is called with `arg`.
fn instantiate(exc: Value, arg: Option<Value>) -> RunResult<Rc<SimpleException>> {
    match exc {
        Value::Exception(instance) => Ok(instance),
        Value::ExcType(exc_type) => match exc_type.call(ArgValues::positional(arg.into_iter().collect()))? {
            Value::Exception(instance) => Ok(instance),
            _ => Err(RunError::internal("exception constructor returned a non-exception")),
        },
        _ => Err(ExcType::type_error_must_derive_from_base_exception()),
    }
}

/// The `exception match` comparison: does `exc` (an instance or a type) match the handler,
/// which is an exception type or a tuple of them?
pub(super) fn exception_matches(exc: &Value, handler: &Value) -> RunResult<bool> {
    let exc_type = match exc {
        Value::Exception(instance) => Some(instance.exc_type()),
        Value::ExcType(exc_type) => Some(*exc_type),
        _ => None,
    };
    let handler_types: Vec<ExcType> = match handler {
        Value::ExcType(handler_type) => vec![*handler_type],
        Value::Tuple(items) => items
            .iter()
            .map(|item| match item {
                Value::ExcType(handler_type) => Ok(*handler_type),
                _ => Err(ExcType::except_invalid_type_error()),
            })
            .collect::<RunResult<_>>()?,
        _ => return Err(ExcType::except_invalid_type_error()),
    };
    Ok(exc_type.is_some_and(|exc_type| handler_types.iter().any(|h| exc_type.is_subclass_of(*h))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_follows_the_hierarchy() {
        let zero = Value::Exception(Rc::new(SimpleException::new_none(ExcType::ZeroDivisionError)));
        assert!(exception_matches(&zero, &Value::ExcType(ExcType::ArithmeticError)).unwrap());
        assert!(!exception_matches(&zero, &Value::ExcType(ExcType::KeyError)).unwrap());

        let handlers = Value::new_tuple(vec![Value::ExcType(ExcType::KeyError), Value::ExcType(ExcType::Exception)]);
        assert!(exception_matches(&zero, &handlers).unwrap());
        assert!(exception_matches(&Value::ExcType(ExcType::IndexError), &Value::ExcType(ExcType::LookupError)).unwrap());
    }

    #[test]
    fn invalid_handlers() {
        let zero = Value::ExcType(ExcType::ZeroDivisionError);
        let err = exception_matches(&zero, &Value::Int(1)).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
        let mixed = Value::new_tuple(vec![Value::ExcType(ExcType::KeyError), Value::from("x")]);
        assert!(exception_matches(&zero, &mixed).is_err());
    }

    #[test]
    fn raised_values_become_instances() {
        let instance = instantiate(Value::ExcType(ExcType::ValueError), Some(Value::from("bad"))).unwrap();
        assert_eq!(instance.exc_type(), ExcType::ValueError);
        assert_eq!(instance.py_str(), "bad");
        assert!(instantiate(Value::Int(3), None).is_err());
    }
}
