//! Collection building, subscripts, unpacking and iteration.

use std::{cell::RefCell, rc::Rc};

use super::VM;
use crate::{
    exception::{ExcType, RunResult},
    for_iterator::{ForIterator, collect_iterable},
    io::PrintWriter,
    types::Dict,
    value::Value,
};

impl<P: PrintWriter> VM<'_, P> {
    pub(super) fn build_tuple(&mut self, count: usize) -> RunResult<()> {
        let items = self.pop_n(count)?;
        self.push(Value::new_tuple(items))
    }

    pub(super) fn build_list(&mut self, count: usize) -> RunResult<()> {
        let items = self.pop_n(count)?;
        self.push(Value::new_list(items))
    }

    /// `BUILD_MAP`: the argument is only a size hint, entries arrive through `STORE_MAP`.
    pub(super) fn build_map(&mut self) -> RunResult<()> {
        self.push(Value::new_dict(Dict::new()))
    }

    /// `STORE_MAP`: stack is `[dict, value, key]`; the dict stays on the stack.
    pub(super) fn store_map(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let value = self.pop()?;
        match self.frame_mut()?.peek()? {
            Value::Dict(dict) => dict.borrow_mut().set(key, value),
            other => Err(ExcType::type_error(format!(
                "STORE_MAP expects a dict, not {}",
                other.py_type()
            ))),
        }
    }

    /// `STORE_SUBSCR`: stack is `[value, obj, key]`.
    pub(super) fn store_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let obj = self.pop()?;
        let value = self.pop()?;
        obj.set_item(key, value)
    }

    /// `DELETE_SUBSCR`: stack is `[obj, key]`.
    pub(super) fn delete_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let obj = self.pop()?;
        obj.del_item(&key)
    }

    /// `UNPACK_SEQUENCE n`: pushes the items so the first one ends up on top.
    pub(super) fn unpack_sequence(&mut self, count: usize) -> RunResult<()> {
        let seq = self.pop()?;
        let items = match &seq {
            Value::Tuple(items) => items.to_vec(),
            Value::List(items) => items.borrow().clone(),
            other => collect_iterable(other)?,
        };
        match items.len() {
            len if len < count => Err(ExcType::value_error_unpack_too_few(count, len)),
            len if len > count => Err(ExcType::value_error_unpack_too_many(count)),
            _ => {
                self.frame_mut()?.stack.extend(items.into_iter().rev());
                Ok(())
            }
        }
    }

    /// `GET_ITER`. An iterator is its own iterator.
    pub(super) fn get_iter(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        let iter = match value {
            Value::Iter(_) => value,
            other => Value::Iter(Rc::new(RefCell::new(ForIterator::new(&other)?))),
        };
        self.push(iter)
    }

    /// `FOR_ITER`: pushes the next item, or pops the exhausted iterator and jumps.
    pub(super) fn for_iter(&mut self, exit: usize) -> RunResult<()> {
        let frame = self.frame_mut()?;
        let iter = match frame.peek()? {
            Value::Iter(iter) => Rc::clone(iter),
            other => {
                return Err(ExcType::type_error(format!(
                    "'{}' object is not an iterator",
                    other.py_type()
                )));
            }
        };
        let next = iter.borrow_mut().for_next()?;
        match next {
            Some(item) => frame.stack.push(item),
            None => {
                frame.pop()?;
                frame.ip = exit;
            }
        }
        Ok(())
    }
}
