//! Argument packs and multiple results.

use std::ffi::c_int;
use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use mlua_sys as ffi;

use super::{FromLua, IntoLua};
use crate::errors::{Error, Result};
use crate::stack::Stack;
use crate::value::Value;

/// A host type that pushes zero or more values: call arguments, or the
/// results of a host callback.
pub trait IntoLuaMulti {
    /// Push every value and return how many were pushed.
    fn push_all(&self, stack: &Stack) -> Result<c_int>;
}

/// A host type read from a run of consecutive slots: call results, or the
/// arguments of a host callback.
pub trait FromLuaMulti: Sized {
    /// Slots requested from a call; `LUA_MULTRET` for "all of them".
    const COUNT: c_int;

    /// Read from `count` slots starting at `first`. Slots past `count` read
    /// as nil.
    fn read_results(stack: &Stack, first: c_int, count: c_int) -> Result<Self>;
}

/// Any number of values, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Variadic(pub Vec<Value>);

impl Variadic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl Deref for Variadic {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Variadic {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<Value> for Variadic {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Variadic(iter.into_iter().collect())
    }
}

impl IntoLuaMulti for () {
    fn push_all(&self, _stack: &Stack) -> Result<c_int> {
        Ok(0)
    }
}

impl FromLuaMulti for () {
    const COUNT: c_int = 0;

    fn read_results(_stack: &Stack, _first: c_int, _count: c_int) -> Result<Self> {
        Ok(())
    }
}

impl<T: IntoLua> IntoLuaMulti for T {
    fn push_all(&self, stack: &Stack) -> Result<c_int> {
        self.push_to(stack)?;
        Ok(1)
    }
}

impl<T: FromLua> FromLuaMulti for T {
    const COUNT: c_int = 1;

    fn read_results(stack: &Stack, first: c_int, count: c_int) -> Result<Self> {
        read_nth(stack, first, count, 0)
    }
}

impl IntoLuaMulti for Variadic {
    fn push_all(&self, stack: &Stack) -> Result<c_int> {
        for value in &self.0 {
            value.push_to(stack)?;
        }
        c_int::try_from(self.0.len()).map_err(|_| Error::StackExhausted { needed: c_int::MAX })
    }
}

impl FromLuaMulti for Variadic {
    const COUNT: c_int = ffi::LUA_MULTRET;

    fn read_results(stack: &Stack, first: c_int, count: c_int) -> Result<Self> {
        (first..first + count).map(|index| stack.read(index)).collect()
    }
}

/// A host callback that can fail. `Err` is raised as an interpreter error.
impl<T: IntoLuaMulti, E: Display> IntoLuaMulti for std::result::Result<T, E> {
    fn push_all(&self, stack: &Stack) -> Result<c_int> {
        match self {
            Ok(values) => values.push_all(stack),
            Err(error) => Err(Error::External(error.to_string())),
        }
    }
}

fn read_nth<T: FromLua>(stack: &Stack, first: c_int, count: c_int, offset: c_int) -> Result<T> {
    if offset < count {
        T::read(stack, first + offset)
    } else {
        T::from_value(Value::Nil)
    }
}

macro_rules! tuple_marshal {
    ($count:literal; $($name:ident $idx:tt),+) => {
        impl<$($name: IntoLua),+> IntoLuaMulti for ($($name,)+) {
            fn push_all(&self, stack: &Stack) -> Result<c_int> {
                stack.reserve($count)?;
                $( self.$idx.push_to(stack)?; )+
                Ok($count)
            }
        }

        impl<$($name: FromLua),+> FromLuaMulti for ($($name,)+) {
            const COUNT: c_int = $count;

            fn read_results(stack: &Stack, first: c_int, count: c_int) -> Result<Self> {
                Ok(($( read_nth::<$name>(stack, first, count, $idx)?, )+))
            }
        }
    };
}

tuple_marshal!(1; A 0);
tuple_marshal!(2; A 0, B 1);
tuple_marshal!(3; A 0, B 1, C 2);
tuple_marshal!(4; A 0, B 1, C 2, D 3);
tuple_marshal!(5; A 0, B 1, C 2, D 3, E 4);
tuple_marshal!(6; A 0, B 1, C 2, D 3, E 4, F 5);
tuple_marshal!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_marshal!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
