//! Host-side copies of interpreter values.
//!
//! [`Value`] is a closed sum over the interpreter's value kinds. Reading a
//! stack slot always yields exactly one variant, and pushing a `Value` always
//! produces exactly one slot.
//!
//! # Ownership
//!
//! - Strings are copied out eagerly; nothing borrowed from the interpreter
//!   outlives the operation that read it.
//! - Tables are copied into a shared host map ([`Table`]). Clones share it.
//! - Functions and full userdata stay inside the interpreter, pinned in the
//!   registry by a [`Reference`] that is released when the last clone drops.
//!
//! # Equality
//!
//! Values of different kinds are never equal. Numbers compare by value,
//! strings by content, chunks by source text, and everything else by
//! identity. `Value` is `Hash` consistently with that, so it can key a
//! [`Table`].
//!
//! ```text
//! Value::from(10) == Value::from(10.0)    true
//! Value::from(10) == Value::from("10")    false
//! Value::from(10) == Value::nil()         false
//! ```

mod handles;
mod table;
mod transfer;

use std::ffi::{c_int, c_void};
use std::fmt;
use std::hash::{Hash, Hasher};

use mlua_sys as ffi;

use crate::marshal::{FromLuaMulti, HostFunction, IntoLuaMulti};
use crate::userdata::AnyUserData;

pub use handles::{Function, Reference, Thread};
pub use table::Table;
pub(crate) use transfer::{push_table, push_value, read_value};

/// The kind of a value, as the interpreter sees it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Nil,
    Number,
    Boolean,
    String,
    Table,
    LightPointer,
    Thread,
    Function,
    UserData,
    /// Source text that has not been compiled yet. Host-only.
    Chunk,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Nil => "nil",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::String => "string",
            Kind::Table => "table",
            Kind::LightPointer => "light pointer",
            Kind::Thread => "thread",
            Kind::Function => "function",
            Kind::UserData => "userdata",
            Kind::Chunk => "chunk",
        }
    }

    /// Map a `lua_type` result. "No value" reads as nil.
    pub(crate) fn from_lua_type(lua_type: c_int) -> Self {
        match lua_type {
            ffi::LUA_TNUMBER => Kind::Number,
            ffi::LUA_TBOOLEAN => Kind::Boolean,
            ffi::LUA_TSTRING => Kind::String,
            ffi::LUA_TTABLE => Kind::Table,
            ffi::LUA_TLIGHTUSERDATA => Kind::LightPointer,
            ffi::LUA_TTHREAD => Kind::Thread,
            ffi::LUA_TFUNCTION => Kind::Function,
            ffi::LUA_TUSERDATA => Kind::UserData,
            _ => Kind::Nil,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host copy of one interpreter value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Number(f64),
    Boolean(bool),
    String(String),
    Table(Table),
    LightPointer(*mut c_void),
    Thread(Thread),
    Function(Function),
    UserData(AnyUserData),
    /// Source compiled into a function when pushed.
    Chunk(String),
}

impl Value {
    pub fn nil() -> Self {
        Value::Nil
    }

    /// A table built from key/value pairs.
    pub fn table<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Table(pairs.into_iter().collect())
    }

    /// Source text, compiled when the value is pushed.
    pub fn chunk(source: impl Into<String>) -> Self {
        Value::Chunk(source.into())
    }

    /// A host closure callable from scripts.
    pub fn function<A, R, F>(function: F) -> Self
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(A) -> R + 'static,
    {
        Value::Function(Function::Host(HostFunction::new(function)))
    }

    /// A light pointer. The interpreter never dereferences it.
    pub fn pointer<T>(pointer: *mut T) -> Self {
        Value::LightPointer(pointer.cast())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Number(_) => Kind::Number,
            Value::Boolean(_) => Kind::Boolean,
            Value::String(_) => Kind::String,
            Value::Table(_) => Kind::Table,
            Value::LightPointer(_) => Kind::LightPointer,
            Value::Thread(_) => Kind::Thread,
            Value::Function(_) => Kind::Function,
            Value::UserData(_) => Kind::UserData,
            Value::Chunk(_) => Kind::Chunk,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Whether a table accepts this value as a key.
    pub fn is_valid_key(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Number(n) => !n.is_nan(),
            _ => true,
        }
    }
}

/// Format a number the way the host-side string conversion does: integral
/// values without a fraction, others in shortest round-trip form.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::from("nan")
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "inf" } else { "-inf" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Parse a numeric string: surrounding whitespace allowed, decimal with an
/// optional exponent, or `0x` hexadecimal integers.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<f64>() {
        // Rust accepts "inf"/"nan" spellings that Lua does not.
        return (n.is_finite() || text.contains(|c: char| c.is_ascii_digit())).then_some(n);
    }
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))?;
    let magnitude = u64::from_str_radix(digits, 16).ok()? as f64;
    Some(if negative { -magnitude } else { magnitude })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) | (Value::Chunk(a), Value::Chunk(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::LightPointer(a), Value::LightPointer(b)) => a == b,
            (Value::Thread(a), Value::Thread(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::UserData(a), Value::UserData(b)) => a == b,
            _ => false,
        }
    }
}

// NaN is the one number not equal to itself; tables reject it as a key.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Number(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                n.to_bits().hash(state);
            }
            Value::Boolean(b) => b.hash(state),
            Value::String(s) | Value::Chunk(s) => s.hash(state),
            Value::Table(t) => t.as_ptr().hash(state),
            Value::LightPointer(p) => p.hash(state),
            Value::Thread(t) => t.hash(state),
            Value::Function(f) => f.hash(state),
            Value::UserData(u) => u.hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Table(t) => write!(f, "Table({t:?})"),
            Value::LightPointer(p) => write!(f, "LightPointer({p:p})"),
            Value::Thread(t) => write!(f, "Thread({:p})", t.as_ptr()),
            Value::Function(func) => write!(f, "Function({func:?})"),
            Value::UserData(u) => write!(f, "UserData({:#x})", u.identity()),
            Value::Chunk(s) => write!(f, "Chunk({s:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::Table(t) => write!(f, "table: {:p}", t.as_ptr()),
            Value::LightPointer(p) => write!(f, "light pointer: {p:p}"),
            Value::Thread(t) => write!(f, "thread: {:p}", t.as_ptr()),
            Value::Function(func) => write!(f, "function: {func:?}"),
            Value::UserData(u) => write!(f, "userdata: {:#x}", u.identity()),
            Value::Chunk(s) => write!(f, "chunk: {s}"),
        }
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                Value::Number(n as f64)
            }
        }
    )*};
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

impl From<Thread> for Value {
    fn from(t: Thread) -> Self {
        Value::Thread(t)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<HostFunction> for Value {
    fn from(f: HostFunction) -> Self {
        Value::Function(Function::Host(f))
    }
}

impl From<AnyUserData> for Value {
    fn from(u: AnyUserData) -> Self {
        Value::UserData(u)
    }
}

impl From<*mut c_void> for Value {
    fn from(p: *mut c_void) -> Self {
        Value::LightPointer(p)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests;
