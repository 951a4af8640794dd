//! Argument binding.
//!
//! A function's parameters are read off its code object: the first `arg_count` entries of
//! `varnames` are positional-or-keyword parameters, the next `kwonly_arg_count` are
//! keyword-only, followed by the `*args` and `**kwargs` names when the code's flags say so.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    bytecode::{Code, CodeFlags},
    exception::{ExcType, RunResult},
    types::Dict,
    value::Value,
};

/// The parameter list of a code object.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signature<'a> {
    positional: &'a [Rc<str>],
    kwonly: &'a [Rc<str>],
    var_args: Option<&'a Rc<str>>,
    var_kwargs: Option<&'a Rc<str>>,
}

impl<'a> Signature<'a> {
    /// Reads the signature of `code`.
    ///
    /// Parameter names missing from `varnames` are treated as absent rather than panicking;
    /// a well-formed code object always has them.
    pub fn of(code: &'a Code) -> Self {
        let names = &code.varnames[..];
        let split = |start: usize, len: usize| names.get(start..start + len).unwrap_or_default();
        let positional = split(0, code.arg_count);
        let kwonly = split(code.arg_count, code.kwonly_arg_count);
        let mut next = code.arg_count + code.kwonly_arg_count;
        let var_args = if code.flags.contains(CodeFlags::VARARGS) {
            next += 1;
            names.get(next - 1)
        } else {
            None
        };
        let var_kwargs = if code.flags.contains(CodeFlags::VARKEYWORDS) {
            names.get(next)
        } else {
            None
        };
        Self {
            positional,
            kwonly,
            var_args,
            var_kwargs,
        }
    }

    /// Binds call-site arguments to parameters.
    ///
    /// Returns one `(name, value)` pair per parameter, in `varnames` order. `defaults` covers
    /// the last `defaults.len()` positional parameters; `kwdefaults` maps keyword-only
    /// parameter names to their defaults.
    ///
    /// # Binding order
    /// 1. Positional arguments fill positional parameters left to right; any excess goes to
    ///    `*args`, or is an error without it.
    /// 2. Keyword arguments bind by name; unknown names go to `**kwargs`, or are an error.
    /// 3. Unbound parameters take their defaults; anything still unbound is an error.
    pub fn bind(
        &self,
        args: ArgValues,
        defaults: &[Value],
        kwdefaults: &[(Rc<str>, Value)],
        func_name: &str,
    ) -> RunResult<Vec<(Rc<str>, Value)>> {
        let ArgValues { positional, keywords } = args;
        let pos_count = self.positional.len();

        if positional.len() > pos_count && self.var_args.is_none() {
            let min = pos_count.saturating_sub(defaults.len());
            return Err(ExcType::type_error_too_many_positional(
                func_name,
                min,
                pos_count,
                positional.len(),
            ));
        }

        let mut slots: Vec<Option<Value>> = vec![None; pos_count + self.kwonly.len()];
        let mut positional = positional.into_iter();
        for (slot, value) in slots.iter_mut().zip(positional.by_ref().take(pos_count)) {
            *slot = Some(value);
        }
        let excess: Vec<Value> = positional.collect();

        let mut extra_kwargs = Dict::new();
        for (key, value) in keywords {
            let index = self
                .positional
                .iter()
                .chain(self.kwonly)
                .position(|name| **name == *key);
            match index {
                Some(index) => {
                    if slots[index].is_some() {
                        return Err(ExcType::type_error_duplicate_arg(func_name, &key));
                    }
                    slots[index] = Some(value);
                }
                None if self.var_kwargs.is_some() => {
                    let key = Value::Str(key);
                    if extra_kwargs.contains_key(&key)? {
                        return Err(ExcType::type_error_duplicate_arg(func_name, &key.py_str()));
                    }
                    extra_kwargs.set(key, value)?;
                }
                None => return Err(ExcType::type_error_unexpected_keyword(func_name, &key)),
            }
        }

        let first_default = pos_count.saturating_sub(defaults.len());
        let default_skip = defaults.len().saturating_sub(pos_count);
        for (i, slot) in slots[..pos_count].iter_mut().enumerate() {
            if slot.is_none() && i >= first_default {
                *slot = defaults.get(i - first_default + default_skip).cloned();
            }
        }
        let missing: Vec<&str> = self.positional
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(name, _)| &**name)
            .collect();
        if !missing.is_empty() {
            return Err(ExcType::type_error_missing_positional_with_names(func_name, &missing));
        }

        for (name, slot) in self.kwonly.iter().zip(&mut slots[pos_count..]) {
            if slot.is_none() {
                *slot = kwdefaults.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
            }
        }
        let missing: Vec<&str> = self.kwonly
            .iter()
            .zip(&slots[pos_count..])
            .filter(|(_, slot)| slot.is_none())
            .map(|(name, _)| &**name)
            .collect();
        if !missing.is_empty() {
            return Err(ExcType::type_error_missing_kwonly_with_names(func_name, &missing));
        }

        let mut bound: Vec<(Rc<str>, Value)> = self
            .positional
            .iter()
            .chain(self.kwonly)
            .cloned()
            .zip(slots.into_iter().flatten())
            .collect();
        if let Some(name) = self.var_args {
            bound.push((Rc::clone(name), Value::new_tuple(excess)));
        }
        if let Some(name) = self.var_kwargs {
            bound.push((Rc::clone(name), Value::new_dict(extra_kwargs)));
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeBuilder;

    fn code(build: impl FnOnce(CodeBuilder) -> CodeBuilder) -> Code {
        build(CodeBuilder::new("f")).build().unwrap()
    }

    fn kw(name: &str, value: i64) -> (Rc<str>, Value) {
        (name.into(), Value::Int(value))
    }

    fn bound_ints(bound: &[(Rc<str>, Value)]) -> Vec<(String, String)> {
        bound.iter().map(|(k, v)| (k.to_string(), v.py_repr())).collect()
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn defaults_fill_trailing_parameters() {
        let code = code(|b| b.with_args(&["a", "b"]));
        let sig = Signature::of(&code);
        let defaults = [Value::Int(2)];

        let bound = sig.bind(ArgValues::positional(vec![Value::Int(5)]), &defaults, &[], "f").unwrap();
        assert_eq!(bound_ints(&bound), pairs(&[("a", "5"), ("b", "2")]));

        let args = ArgValues::new(vec![Value::Int(5)], vec![kw("b", 9)]);
        let bound = sig.bind(args, &defaults, &[], "f").unwrap();
        assert_eq!(bound_ints(&bound), pairs(&[("a", "5"), ("b", "9")]));
    }

    #[test]
    fn binding_errors() {
        let code = code(|b| b.with_args(&["a", "b"]));
        let sig = Signature::of(&code);
        let defaults = [Value::Int(2)];
        let message = |args| {
            sig.bind(args, &defaults, &[], "f")
                .unwrap_err()
                .into_raised(crate::exception::TraceFrame {
                    code_name: "f".into(),
                    offset: 0,
                })
                .value()
                .py_str()
                .to_owned()
        };

        assert_eq!(
            message(ArgValues::default()),
            "f() missing 1 required positional argument: 'a'"
        );
        assert_eq!(
            message(ArgValues::positional(vec![Value::Int(1), Value::Int(2), Value::Int(3)])),
            "f() takes from 1 to 2 positional arguments but 3 were given"
        );
        assert_eq!(
            message(ArgValues::new(vec![Value::Int(1)], vec![kw("a", 2)])),
            "f() got multiple values for argument 'a'"
        );
        assert_eq!(
            message(ArgValues::new(vec![Value::Int(1)], vec![kw("z", 2)])),
            "f() got an unexpected keyword argument 'z'"
        );
    }

    #[test]
    fn star_args_and_kwonly() {
        let code = code(|b| {
            b.with_args(&["a"])
                .with_kwonly_args(&["k"])
                .with_varargs("rest")
                .with_varkeywords("extra")
        });
        let sig = Signature::of(&code);
        let args = ArgValues::new(
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
            vec![kw("x", 4), kw("k", 5)],
        );
        let bound = sig.bind(args, &[], &[], "f").unwrap();
        assert_eq!(
            bound_ints(&bound),
            pairs(&[("a", "1"), ("k", "5"), ("rest", "(2, 3)"), ("extra", "{'x': 4}")])
        );

        let err = sig
            .bind(ArgValues::positional(vec![Value::Int(1)]), &[], &[], "f")
            .unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);

        let bound = sig
            .bind(ArgValues::positional(vec![Value::Int(1)]), &[], &[kw("k", 0)], "f")
            .unwrap();
        assert_eq!(bound_ints(&bound)[1], ("k".to_owned(), "0".to_owned()));
    }
}
