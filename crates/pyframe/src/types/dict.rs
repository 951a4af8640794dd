use std::{
    fmt::{self, Write},
    rc::Rc,
};

use ahash::RandomState;
use indexmap::IndexMap;

use crate::{
    builtins::Builtins,
    exception::{ExcType, RunResult},
    value::Value,
};

/// Python dict type preserving insertion order.
///
/// Entries are keyed by a [`HashKey`] derived from the Python key, so `1`, `1.0` and `True`
/// address the same slot. The original key object is kept alongside the value: re-assigning
/// through an equal key updates the value but keeps the first key, as CPython does.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<HashKey, (Value, Value), RandomState>,
}

/// Hashable projection of a value.
///
/// Numbers that compare equal map to the same key; functions, code objects and exception
/// instances hash by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HashKey {
    None,
    Int(i64),
    /// Bit pattern of a float with no exact `i64` equivalent.
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Range(i64, i64, i64),
    Builtin(Builtins),
    ExcType(ExcType),
    Identity(usize),
}

impl HashKey {
    pub(crate) fn from_value(value: &Value) -> RunResult<Self> {
        let key = match value {
            Value::None => Self::None,
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => float_key(*f),
            Value::Str(s) => Self::Str(Rc::clone(s)),
            Value::Tuple(items) => Self::Tuple(items.iter().map(Self::from_value).collect::<RunResult<_>>()?),
            Value::Range(r) => {
                if r.is_empty() {
                    Self::Range(0, 0, 0)
                } else {
                    Self::Range(r.start, i64::try_from(r.len()).unwrap_or(i64::MAX), r.step)
                }
            }
            Value::Builtin(b) => Self::Builtin(*b),
            Value::ExcType(e) => Self::ExcType(*e),
            Value::Function(f) => Self::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Code(c) => Self::Identity(Rc::as_ptr(c) as *const () as usize),
            Value::Exception(e) => Self::Identity(Rc::as_ptr(e) as *const () as usize),
            Value::Cell(c) => Self::Identity(c.addr()),
            Value::List(_) | Value::Dict(_) | Value::Iter(_) => {
                return Err(ExcType::type_error_unhashable(value.py_type()));
            }
        };
        Ok(key)
    }
}

#[expect(clippy::cast_possible_truncation, reason = "checked by the round trip")]
fn float_key(f: f64) -> HashKey {
    let as_int = f as i64;
    if f.abs() < 9.0e18 && as_int as f64 == f {
        HashKey::Int(as_int)
    } else {
        HashKey::Float(f.to_bits())
    }
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        let hash_key = HashKey::from_value(key)?;
        Ok(self.entries.get(&hash_key).map(|(_, v)| v.clone()))
    }

    pub(crate) fn contains_key(&self, key: &Value) -> RunResult<bool> {
        Ok(self.entries.contains_key(&HashKey::from_value(key)?))
    }

    /// Inserts or updates. An existing entry keeps its original key object.
    pub(crate) fn set(&mut self, key: Value, value: Value) -> RunResult<()> {
        let hash_key = HashKey::from_value(&key)?;
        self.entries
            .entry(hash_key)
            .and_modify(|entry| entry.1 = value.clone())
            .or_insert((key, value));
        Ok(())
    }

    /// Removes an entry, preserving the order of the rest.
    pub(crate) fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        let hash_key = HashKey::from_value(key)?;
        Ok(self.entries.shift_remove(&hash_key).map(|(_, v)| v))
    }

    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<Value> {
        self.entries.get_index(index).map(|(_, (k, _))| k.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    /// Dicts are equal when they hold equal keys mapped to equal values, in any order.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(hk, (_, v))| other.entries.get(hk).is_some_and(|(_, ov)| v.py_eq(ov)))
    }

    pub fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        f.write_char('{')?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            k.repr_fmt(f)?;
            f.write_str(": ")?;
            v.repr_fmt(f)?;
        }
        f.write_char('}')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_numbers_share_a_slot() {
        let mut d = Dict::new();
        d.set(Value::Int(1), Value::Str("a".into())).unwrap();
        d.set(Value::Bool(true), Value::Str("b".into())).unwrap();
        d.set(Value::Float(1.0), Value::Str("c".into())).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.key_at(0).unwrap().py_repr(), "1");
        assert_eq!(d.get(&Value::Int(1)).unwrap().unwrap().py_repr(), "'c'");
    }

    #[test]
    fn unhashable_keys() {
        let mut d = Dict::new();
        let list = Value::new_list(vec![]);
        let err = d.set(list, Value::None).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
        let tuple_with_list = Value::new_tuple(vec![Value::new_list(vec![])]);
        assert!(d.get(&tuple_with_list).is_err());
    }

    #[test]
    fn insertion_order_and_removal() {
        let mut d = Dict::new();
        for (k, v) in [("x", 1), ("y", 2), ("z", 3)] {
            d.set(Value::Str(k.into()), Value::Int(v)).unwrap();
        }
        d.remove(&Value::Str("y".into())).unwrap();
        let mut out = String::new();
        d.repr_fmt(&mut out).unwrap();
        assert_eq!(out, "{'x': 1, 'z': 3}");
    }
}
