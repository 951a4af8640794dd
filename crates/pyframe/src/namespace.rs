use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;
use strum::IntoEnumIterator;

use crate::{builtins::Builtins, exception::ExcType, value::Value};

/// Shared handle to a namespace. Globals are shared by the frames and functions of one module.
pub type NamespaceRef = Rc<RefCell<Namespace>>;

/// A name-to-value mapping: the locals, globals or builtins of a frame.
#[derive(Debug, Clone, Default)]
pub struct Namespace(AHashMap<Rc<str>, Value>);

impl Namespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin namespace: every builtin function and every builtin exception type.
    #[must_use]
    pub fn builtins() -> Self {
        let mut ns = Self::new();
        for builtin in Builtins::iter() {
            ns.set(builtin.name().into(), Value::Builtin(builtin));
        }
        for exc_type in ExcType::iter() {
            let name: &'static str = exc_type.into();
            ns.set(name.into(), Value::ExcType(exc_type));
        }
        ns
    }

    /// Fresh module globals, seeded the way a `__main__` module starts.
    #[must_use]
    pub fn new_main() -> Self {
        let mut ns = Self::new();
        ns.set("__name__".into(), Value::from("__main__"));
        ns.set("__doc__".into(), Value::None);
        ns.set("__package__".into(), Value::None);
        ns
    }

    #[must_use]
    pub fn into_ref(self) -> NamespaceRef {
        Rc::new(RefCell::new(self))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: Rc<str>, value: Value) {
        self.0.insert(name, value);
    }

    /// Removes `name`, returning whether it was bound.
    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(Rc<str>, Value)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (Rc<str>, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
