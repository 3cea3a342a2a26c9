//! Moving [`Value`]s across the stack.

use std::ffi::{c_int, c_void};

use rustc_hash::FxHashMap;

use super::{Function, Kind, Reference, Table, Thread, Value};
use crate::errors::Result;
use crate::native_stack::ensure_sufficient_stack;
use crate::stack::Stack;
use crate::userdata::AnyUserData;

/// Host tables currently being built, by identity, with their stack index.
type InProgress = FxHashMap<*const (), c_int>;

/// Interpreter tables already copied, by address.
type Copied = FxHashMap<*const c_void, Table>;

/// Push one value.
pub(crate) fn push_value(value: &Value, stack: &Stack) -> Result<()> {
    push_nested(value, stack, &mut InProgress::default())
}

/// Push a host table as a fresh interpreter table.
pub(crate) fn push_table(table: &Table, stack: &Stack) -> Result<()> {
    push_table_nested(table, stack, &mut InProgress::default())
}

fn push_nested(value: &Value, stack: &Stack, in_progress: &mut InProgress) -> Result<()> {
    stack.reserve(1)?;
    match value {
        Value::Nil => stack.push_nil(),
        Value::Number(n) => stack.push_number(*n),
        Value::Boolean(b) => stack.push_bool(*b),
        Value::String(s) => stack.push_str(s),
        Value::LightPointer(p) => stack.push_light(*p),
        Value::Table(t) => return push_table_nested(t, stack, in_progress),
        Value::Thread(t) => return t.push_to(stack),
        Value::Function(f) => return f.push_to(stack),
        Value::UserData(u) => return u.reference().push_to(stack),
        Value::Chunk(source) => return stack.load_chunk(source),
    }
    Ok(())
}

fn push_table_nested(table: &Table, stack: &Stack, in_progress: &mut InProgress) -> Result<()> {
    if let Some(&index) = in_progress.get(&table.as_ptr()) {
        stack.push_copy(index);
        return Ok(());
    }
    ensure_sufficient_stack(|| {
        // Snapshot so no RefCell borrow is held while values push (a chunk
        // or closure may run host code that touches the same table).
        let entries = table.entries();
        stack.reserve(3)?;
        stack.new_table(0, entries.len());
        let index = stack.top();
        in_progress.insert(table.as_ptr(), index);
        for (key, value) in &entries {
            if !key.is_valid_key() {
                tracing::debug!(?key, "skipping table entry with an invalid key");
                continue;
            }
            push_nested(key, stack, in_progress)?;
            push_nested(value, stack, in_progress)?;
            stack.raw_set(index);
        }
        in_progress.remove(&table.as_ptr());
        Ok(())
    })
}

/// Read the slot at `index` into a [`Value`].
pub(crate) fn read_value(stack: &Stack, index: c_int) -> Result<Value> {
    let index = stack.abs_index(index);
    read_nested(stack, index, &mut Copied::default())
}

fn read_nested(stack: &Stack, index: c_int, copied: &mut Copied) -> Result<Value> {
    Ok(match stack.kind(index) {
        Kind::Nil | Kind::Chunk => Value::Nil,
        Kind::Number => Value::Number(stack.to_number(index)),
        Kind::Boolean => Value::Boolean(stack.to_bool(index)),
        Kind::String => Value::String(stack.to_string_lossy(index)),
        Kind::LightPointer => Value::LightPointer(stack.to_userdata(index)),
        Kind::Thread => Value::Thread(Thread::pin(stack, index)?),
        Kind::Function => Value::Function(Function::Ref(Reference::pin(stack, index)?)),
        Kind::UserData => Value::UserData(AnyUserData::new(Reference::pin(stack, index)?)),
        Kind::Table => Value::Table(read_table(stack, index, copied)?),
    })
}

fn read_table(stack: &Stack, index: c_int, copied: &mut Copied) -> Result<Table> {
    let address = stack.to_pointer(index);
    if let Some(table) = copied.get(&address) {
        return Ok(table.clone());
    }
    let table = Table::new();
    copied.insert(address, table.clone());
    ensure_sufficient_stack(|| {
        stack.reserve(3)?;
        stack.push_nil();
        while stack.next(index) {
            let top = stack.top();
            let key = read_nested(stack, top - 1, copied)?;
            let value = read_nested(stack, top, copied)?;
            table.insert(key, value);
            stack.pop(1);
        }
        Ok(table)
    })
}
