//! Host closures callable from scripts.
//!
//! # Layout
//!
//! A pushed [`HostFunction`] becomes a native closure over one upvalue: a
//! full userdata block holding the callback and the interpreter handle. The
//! block's `__gc` drops both when the interpreter collects the closure.
//!
//! ```text
//! C closure (call_host)
//!   └─ upvalue 1: userdata { HostCall { callback, interp } }
//!                   └─ metatable "luavar.host_function" { __gc }
//! ```
//!
//! # Errors
//!
//! The callback runs under `catch_unwind`. A returned error or a panic is
//! turned into a message, every host value of the frame is dropped, and
//! only then is the message raised with `lua_error`, which unwinds through
//! nothing that still owns resources.

use std::any::Any;
use std::ffi::c_int;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use mlua_sys as ffi;

use super::{FromLuaMulti, IntoLuaMulti};
use crate::errors::{Error, Result};
use crate::stack::Stack;
use crate::state::Interpreter;

type Callback = dyn Fn(&Stack, c_int) -> Result<c_int>;

const HOST_FUNCTION_META: &std::ffi::CStr = c"luavar.host_function";

/// A host closure that can be pushed as an interpreter function.
///
/// Clones share the closure. Equality is identity.
#[derive(Clone)]
pub struct HostFunction(Rc<Callback>);

/// The userdata block behind a pushed closure.
struct HostCall {
    callback: HostFunction,
    interp: Rc<Interpreter>,
}

impl HostFunction {
    /// Wrap a closure taking typed arguments and returning typed results.
    ///
    /// The interpreter must pass exactly `A::COUNT` arguments (any number
    /// for [`Variadic`](crate::Variadic)); otherwise the call fails with
    /// [`Error::Arity`].
    pub fn new<A, R, F>(function: F) -> Self
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(A) -> R + 'static,
    {
        Self::from_raw(move |stack, nargs| {
            check_arity(A::COUNT, nargs)?;
            let args = A::read_results(stack, 1, nargs)?;
            function(args).push_all(stack)
        })
    }

    /// Wrap a closure that reads its `nargs` arguments (slots `1..=nargs`)
    /// itself and returns how many results it pushed.
    pub(crate) fn from_raw(callback: impl Fn(&Stack, c_int) -> Result<c_int> + 'static) -> Self {
        HostFunction(Rc::new(callback))
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    pub(crate) fn push_to(&self, stack: &Stack) -> Result<()> {
        let block = HostCall {
            callback: self.clone(),
            interp: Rc::clone(stack.interpreter()),
        };
        stack.push_userdata(block, HOST_FUNCTION_META, |_| Ok(()))?;
        stack.push_cclosure(call_host, 1);
        Ok(())
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({:#x})", self.identity())
    }
}

/// Fail unless `nargs` matches a fixed `expected` count.
pub(crate) fn check_arity(expected: c_int, nargs: c_int) -> Result<()> {
    if expected != ffi::LUA_MULTRET && expected != nargs {
        return Err(Error::Arity {
            expected,
            got: nargs,
        });
    }
    Ok(())
}

/// Entry point for every pushed [`HostFunction`].
unsafe extern "C-unwind" fn call_host(state: *mut ffi::lua_State) -> c_int {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the interpreter only calls this with the closure's own
        // frame, whose first upvalue is the HostCall block.
        unsafe { dispatch(state) }
    }));
    let message = match outcome {
        Ok(Ok(count)) => return count,
        Ok(Err(error)) => error.to_string(),
        Err(payload) => format!("host function panicked: {}", panic_message(payload.as_ref())),
    };
    // SAFETY: `state` is the running thread; `message` is the last owned
    // value of this frame and is consumed before the error is raised.
    unsafe { raise(state, message) }
}

unsafe fn dispatch(state: *mut ffi::lua_State) -> Result<c_int> {
    // SAFETY: see `call_host`.
    let block = unsafe { ffi::lua_touserdata(state, ffi::lua_upvalueindex(1)) }.cast::<HostCall>();
    if block.is_null() {
        return Err(Error::External(String::from("host function lost its closure")));
    }
    // SAFETY: the closure is on the stack while it runs, so its upvalue
    // block is alive and holds an initialized HostCall.
    let (callback, interp) = unsafe { ((*block).callback.clone(), Rc::clone(&(*block).interp)) };
    // SAFETY: `state` is a thread of `interp`.
    let stack = unsafe { Stack::from_raw(state, interp) };
    let nargs = stack.top();
    (callback.0)(&stack, nargs)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    }
}

/// Raise `message` as an interpreter error. Never returns.
unsafe fn raise(state: *mut ffi::lua_State, message: String) -> c_int {
    tracing::debug!(%message, "raising host function error");
    // SAFETY: lua_pushlstring copies the bytes; the String is dropped before
    // the non-local exit.
    unsafe { ffi::lua_pushlstring(state, message.as_ptr().cast(), message.len()) };
    drop(message);
    unsafe { ffi::lua_error(state) }
}
