//! Conversions between host types and interpreter stack slots.
//!
//! # Adapters
//!
//! | Trait | Direction | Unit |
//! |---|---|---|
//! | [`IntoLua`] | host → stack | exactly one slot |
//! | [`FromLua`] | stack → host | one slot, plus a non-materializing check |
//! | [`IntoLuaMulti`] | host → stack | an argument pack or callback results |
//! | [`FromLuaMulti`] | stack → host | call results or callback arguments |
//!
//! [`FromLuaMulti::COUNT`] is the number of slots a type occupies, which is
//! what a protected call asks the interpreter for.
//!
//! # Conversion table
//!
//! Reading a value into a host type dispatches on the value's kind first,
//! then on the target:
//!
//! ```text
//!              numbers    bool      String      pointers   tables
//! number       cast       n != 0    formatted   error      error
//! boolean      1 / 0      value     error       error      error
//! string       parsed     true      copy        error      error
//! nil          0          false     error       null       error
//! ```

mod collections;
mod function;
mod multi;

use std::ffi::{c_int, c_void};

use crate::errors::{Result, TypeError};
use crate::stack::{Slot, Stack};
use crate::value::{self, format_number, parse_number, Function, Kind, Table, Thread, Value};

pub use function::HostFunction;
pub(crate) use function::check_arity;
pub use multi::{FromLuaMulti, IntoLuaMulti, Variadic};

/// A host type that can be pushed as one interpreter value.
pub trait IntoLua {
    /// Push exactly one value onto `stack`.
    fn push_to(&self, stack: &Stack) -> Result<()>;
}

/// A host type that can be produced from one interpreter value.
pub trait FromLua: Sized {
    /// Convert a materialized value.
    fn from_value(value: Value) -> Result<Self>;

    /// Whether the slot holds something this type reads, checked without
    /// materializing it.
    fn accepts(slot: Slot<'_>) -> bool;

    /// Read the slot at `index`.
    fn read(stack: &Stack, index: c_int) -> Result<Self> {
        Self::from_value(stack.read(index)?)
    }
}

impl<T: IntoLua + ?Sized> IntoLua for &T {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        (**self).push_to(stack)
    }
}

impl IntoLua for Value {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        value::push_value(self, stack)
    }
}

impl FromLua for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }

    fn accepts(_slot: Slot<'_>) -> bool {
        true
    }
}

/// Booleans and numbers, plus strings the interpreter can convert.
fn is_arithmetic(slot: Slot<'_>) -> bool {
    !slot.is_nil() && (slot.kind() == Kind::Boolean || slot.is_number())
}

fn to_number(value: &Value, expected: &'static str) -> Result<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Nil => Ok(0.0),
        Value::String(s) => parse_number(s).ok_or_else(|| {
            TypeError::new(expected, Kind::String)
                .with_detail(format!("{s:?} is not a number"))
                .into()
        }),
        other => Err(TypeError::new(expected, other.kind()).into()),
    }
}

macro_rules! small_integer_marshal {
    ($($ty:ty),*) => {$(
        impl IntoLua for $ty {
            fn push_to(&self, stack: &Stack) -> Result<()> {
                stack.reserve(1)?;
                stack.push_integer(i64::from(*self));
                Ok(())
            }
        }

        impl FromLua for $ty {
            fn from_value(value: Value) -> Result<Self> {
                to_number(&value, stringify!($ty)).map(|n| n as $ty)
            }

            fn accepts(slot: Slot<'_>) -> bool {
                is_arithmetic(slot)
            }
        }
    )*};
}

macro_rules! wide_integer_marshal {
    ($($ty:ty),*) => {$(
        impl IntoLua for $ty {
            fn push_to(&self, stack: &Stack) -> Result<()> {
                stack.reserve(1)?;
                match i64::try_from(*self) {
                    Ok(n) => stack.push_integer(n),
                    Err(_) => stack.push_number(*self as f64),
                }
                Ok(())
            }
        }

        impl FromLua for $ty {
            fn from_value(value: Value) -> Result<Self> {
                to_number(&value, stringify!($ty)).map(|n| n as $ty)
            }

            fn accepts(slot: Slot<'_>) -> bool {
                is_arithmetic(slot)
            }
        }
    )*};
}

macro_rules! float_marshal {
    ($($ty:ty),*) => {$(
        impl IntoLua for $ty {
            fn push_to(&self, stack: &Stack) -> Result<()> {
                stack.reserve(1)?;
                stack.push_number(f64::from(*self));
                Ok(())
            }
        }

        impl FromLua for $ty {
            fn from_value(value: Value) -> Result<Self> {
                to_number(&value, stringify!($ty)).map(|n| n as $ty)
            }

            fn accepts(slot: Slot<'_>) -> bool {
                is_arithmetic(slot)
            }
        }
    )*};
}

small_integer_marshal!(i8, i16, i32, i64, u8, u16, u32);
wide_integer_marshal!(isize, u64, usize);
float_marshal!(f32, f64);

impl IntoLua for bool {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        stack.reserve(1)?;
        stack.push_bool(*self);
        Ok(())
    }
}

impl FromLua for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Number(n) => Ok(n != 0.0),
            Value::String(_) => Ok(true),
            Value::Nil => Ok(false),
            other => Err(TypeError::new("boolean", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        is_arithmetic(slot)
    }
}

impl IntoLua for str {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        stack.reserve(1)?;
        stack.push_str(self);
        Ok(())
    }
}

impl IntoLua for String {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        self.as_str().push_to(stack)
    }
}

impl FromLua for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(format_number(n)),
            other => Err(TypeError::new("string", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.is_string()
    }
}

impl IntoLua for *mut c_void {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        stack.reserve(1)?;
        stack.push_light(*self);
        Ok(())
    }
}

impl FromLua for *mut c_void {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::LightPointer(p) => Ok(p),
            Value::Nil => Ok(std::ptr::null_mut()),
            other => Err(TypeError::new("light pointer", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.kind() == Kind::LightPointer
    }
}

impl IntoLua for *const c_void {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        self.cast_mut().push_to(stack)
    }
}

impl FromLua for *const c_void {
    fn from_value(value: Value) -> Result<Self> {
        <*mut c_void>::from_value(value).map(<*mut c_void>::cast_const)
    }

    fn accepts(slot: Slot<'_>) -> bool {
        <*mut c_void>::accepts(slot)
    }
}

impl<T: IntoLua> IntoLua for Option<T> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        match self {
            Some(value) => value.push_to(stack),
            None => {
                stack.reserve(1)?;
                stack.push_nil();
                Ok(())
            }
        }
    }
}

impl<T: FromLua> FromLua for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.is_nil() || T::accepts(slot)
    }
}

impl IntoLua for Table {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        value::push_table(self, stack)
    }
}

impl FromLua for Table {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Table(t) => Ok(t),
            other => Err(TypeError::new("table", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.kind() == Kind::Table
    }
}

impl IntoLua for Thread {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        Thread::push_to(self, stack)
    }
}

impl FromLua for Thread {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Thread(t) => Ok(t),
            other => Err(TypeError::new("thread", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.kind() == Kind::Thread
    }
}

impl IntoLua for Function {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        Function::push_to(self, stack)
    }
}

impl FromLua for Function {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Function(f) => Ok(f),
            other => Err(TypeError::new("function", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.kind() == Kind::Function
    }
}

impl IntoLua for HostFunction {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        HostFunction::push_to(self, stack)
    }
}
