//! Shared host tables.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::Value;

/// A host table: a shared, mutable map from [`Value`] to [`Value`].
///
/// Cloning shares the map, so a change through one clone is visible
/// through all of them. Equality between tables is identity.
///
/// A table that contains itself (directly or through other tables) forms a
/// reference cycle; call [`Table::clear`] to break it.
#[derive(Clone, Default)]
pub struct Table(Rc<RefCell<FxHashMap<Value, Value>>>);

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        self.0.borrow().get(&key.into()).cloned()
    }

    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().remove(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<Value>) -> bool {
        self.0.borrow().contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Snapshot of every entry, in no particular order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Values under the keys `1, 2, ...` up to the first missing one.
    pub fn sequence(&self) -> Vec<Value> {
        let map = self.0.borrow();
        let mut out = Vec::new();
        while let Some(value) = map.get(&Value::Number((out.len() + 1) as f64)) {
            out.push(value.clone());
        }
        out
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Table(Rc::new(RefCell::new(map)))
    }
}

impl fmt::Debug for Table {
    // Entries are not printed: a table may contain itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p} ({} entries)", self.as_ptr(), self.len())
    }
}
