//! Iteration over the table behind a path.

use std::ffi::c_int;
use std::iter::FusedIterator;

use super::Var;
use crate::errors::{Result, TypeError};
use crate::stack_guard::StackGuard;
use crate::value::{Kind, Value};

/// Single-pass iterator over a table's entries, yielding each key with the
/// child path under it.
///
/// Unlike every other operation, the iterator keeps its stack guard, and
/// the table plus the traversal key on the stack, for its whole lifetime.
/// Before each step it checks that those two slots are still the top of
/// the stack and ends instead of touching anything else.
pub struct Pairs {
    guard: StackGuard,
    table: c_int,
    parent: Var,
    finished: bool,
}

impl Pairs {
    pub(crate) fn new(parent: &Var) -> Result<Self> {
        let stack = parent.stack()?;
        let guard = StackGuard::new(&stack);
        parent.push_value(&stack)?;
        let kind = stack.slot(-1).kind();
        if kind != Kind::Table {
            return Err(TypeError::new("table", kind)
                .with_detail(format!("`{parent}` cannot be iterated"))
                .into());
        }
        // Drop the walk's intermediates so only the table and the traversal
        // key sit above the guard's depth.
        let table = guard.depth() + 1;
        if stack.top() > table {
            stack.replace(table);
            stack.set_top(table);
        }
        stack.reserve(3)?;
        stack.push_nil();
        Ok(Pairs {
            guard,
            table,
            parent: parent.clone(),
            finished: false,
        })
    }
}

impl Iterator for Pairs {
    type Item = Result<(Value, Var)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let stack = self.guard.stack();
        if !stack.is_open() {
            self.finished = true;
            return None;
        }
        if stack.top() != self.table + 1 {
            tracing::warn!(
                path = %self.parent,
                expected = self.table + 1,
                found = stack.top(),
                "table iteration stopped: stack changed underneath the iterator"
            );
            self.finished = true;
            return None;
        }
        if !stack.next(self.table) {
            self.finished = true;
            return None;
        }
        // Drop the value; the key stays on top for the next step.
        stack.pop(1);
        match stack.read(-1) {
            Ok(key) => {
                let child = self.parent.at(key.clone());
                Some(Ok((key, child)))
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}

impl FusedIterator for Pairs {}
