//! Standard collections as interpreter tables.
//!
//! - slices and `Vec<T>`: sequences keyed `1..=n`
//! - `HashMap` / `BTreeMap`: key/value tables
//! - `HashSet` / `BTreeSet`: `member → true`
//! - `[(K, V); N]`: a table literal written as pairs
//!
//! Entries whose key pushes as nil or NaN are skipped.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use super::{FromLua, IntoLua};
use crate::errors::{Result, TypeError};
use crate::native_stack::ensure_sufficient_stack;
use crate::stack::{Slot, Stack};
use crate::value::{Kind, Table, Value};

/// Push a new table and fill it from `(key, value)` pairs.
fn push_pairs<'a, K, V>(
    stack: &Stack,
    len: usize,
    pairs: impl Iterator<Item = (&'a K, &'a V)>,
) -> Result<()>
where
    K: IntoLua + ?Sized + 'a,
    V: IntoLua + ?Sized + 'a,
{
    ensure_sufficient_stack(|| {
        stack.reserve(3)?;
        stack.new_table(0, len);
        let table = stack.top();
        for (key, value) in pairs {
            key.push_to(stack)?;
            if stack.slot(-1).is_invalid_key() {
                tracing::debug!("skipping collection entry with an invalid key");
                stack.pop(1);
                continue;
            }
            value.push_to(stack)?;
            stack.raw_set(table);
        }
        Ok(())
    })
}

fn table_of(value: Value) -> Result<Table> {
    match value {
        Value::Table(t) => Ok(t),
        other => Err(TypeError::new("table", other.kind()).into()),
    }
}

fn accepts_table(slot: Slot<'_>) -> bool {
    slot.kind() == Kind::Table
}

impl<T: IntoLua> IntoLua for [T] {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        ensure_sufficient_stack(|| {
            stack.reserve(2)?;
            stack.new_table(self.len(), 0);
            let table = stack.top();
            for (position, item) in self.iter().enumerate() {
                stack.push_integer(position as i64 + 1);
                item.push_to(stack)?;
                stack.raw_set(table);
            }
            Ok(())
        })
    }
}

impl<T: IntoLua> IntoLua for Vec<T> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        self.as_slice().push_to(stack)
    }
}

impl<T: FromLua> FromLua for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        table_of(value)?
            .sequence()
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn accepts(slot: Slot<'_>) -> bool {
        accepts_table(slot)
    }
}

impl<K: IntoLua, V: IntoLua, S> IntoLua for HashMap<K, V, S> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        push_pairs(stack, self.len(), self.iter())
    }
}

impl<K, V, S> FromLua for HashMap<K, V, S>
where
    K: FromLua + Eq + Hash,
    V: FromLua,
    S: BuildHasher + Default,
{
    fn from_value(value: Value) -> Result<Self> {
        table_of(value)?
            .entries()
            .into_iter()
            .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
            .collect()
    }

    fn accepts(slot: Slot<'_>) -> bool {
        accepts_table(slot)
    }
}

impl<K: IntoLua, V: IntoLua> IntoLua for BTreeMap<K, V> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        push_pairs(stack, self.len(), self.iter())
    }
}

impl<K: FromLua + Ord, V: FromLua> FromLua for BTreeMap<K, V> {
    fn from_value(value: Value) -> Result<Self> {
        table_of(value)?
            .entries()
            .into_iter()
            .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
            .collect()
    }

    fn accepts(slot: Slot<'_>) -> bool {
        accepts_table(slot)
    }
}

impl<T: IntoLua, S> IntoLua for HashSet<T, S> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        push_pairs(stack, self.len(), self.iter().map(|member| (member, &true)))
    }
}

impl<T: IntoLua> IntoLua for BTreeSet<T> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        push_pairs(stack, self.len(), self.iter().map(|member| (member, &true)))
    }
}

impl<K: IntoLua, V: IntoLua, const N: usize> IntoLua for [(K, V); N] {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        push_pairs(stack, N, self.iter().map(|(k, v)| (k, v)))
    }
}
