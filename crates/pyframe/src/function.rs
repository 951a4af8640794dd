//! User-defined functions and the closure cells they share.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    bytecode::Code,
    namespace::NamespaceRef,
    value::Value,
};

/// A closure cell: one shared mutable slot for a captured variable.
///
/// Cloning a `Cell` clones the handle, not the slot. Every frame and function that closes
/// over the same variable holds a clone of the same cell, so a write through any of them is
/// seen by all of them.
#[derive(Clone, Default)]
pub struct Cell(Rc<RefCell<Option<Value>>>);

impl Cell {
    /// An unassigned cell. Reading it raises `NameError`.
    #[must_use]
    pub fn new_empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(Some(value))))
    }

    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = Some(value);
    }

    /// Whether both handles refer to the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the slot, used as the identity hash.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

// The cell may hold a function whose globals hold the cell again.
impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(slot) if slot.is_some() => write!(f, "Cell(<{:#x}>)", self.addr()),
            Ok(_) => f.write_str("Cell(<empty>)"),
            Err(_) => f.write_str("Cell(<borrowed>)"),
        }
    }
}

/// A function value produced by `MAKE_FUNCTION` or `MAKE_CLOSURE`.
///
/// Every call builds a fresh frame from the same immutable code object, the globals of the
/// defining frame and the captured `closure` cells (one per entry of `code.freevars`).
pub struct Function {
    pub code: Rc<Code>,
    /// Defaults for the last `defaults.len()` positional parameters.
    pub defaults: Vec<Value>,
    /// Defaults for keyword-only parameters, by name.
    pub kwdefaults: Vec<(Rc<str>, Value)>,
    pub globals: NamespaceRef,
    pub closure: Vec<Cell>,
}

impl Function {
    #[must_use]
    pub fn new(
        code: Rc<Code>,
        defaults: Vec<Value>,
        kwdefaults: Vec<(Rc<str>, Value)>,
        globals: NamespaceRef,
        closure: Vec<Cell>,
    ) -> Self {
        Self {
            code,
            defaults,
            kwdefaults,
            globals,
            closure,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.code.name
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.code.name)
            .field("defaults", &self.defaults.len())
            .field("closure", &self.closure)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_share_one_slot() {
        let cell = Cell::new_empty();
        let other = cell.clone();
        assert!(cell.get().is_none());
        other.set(Value::Int(7));
        assert_eq!(cell.get(), Some(Value::Int(7)));
        assert!(cell.ptr_eq(&other));
        assert!(!cell.ptr_eq(&Cell::new(Value::Int(7))));
    }
}
