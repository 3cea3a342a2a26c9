//! Ownership of the raw interpreter.

use std::cell::Cell;
use std::ptr;

use mlua_sys as ffi;

use crate::errors::{Error, LuaError, Result};
use crate::RootConfig;

/// One interpreter instance, shared by a [`Root`](crate::Root) and every
/// handle derived from it.
///
/// The `Root` closes the interpreter when dropped. Handles that outlive it
/// see [`Error::Closed`]; destructors that run during the close (closures
/// and userdata collected by `lua_close`) see it as already closed too.
pub(crate) struct Interpreter {
    raw: Cell<*mut ffi::lua_State>,
    config: RootConfig,
}

impl Interpreter {
    pub(crate) fn open(config: RootConfig) -> Result<Self> {
        // SAFETY: luaL_newstate has no preconditions.
        let raw = unsafe { ffi::luaL_newstate() };
        if raw.is_null() {
            return Err(LuaError::out_of_memory("unable to create interpreter").into());
        }
        Ok(Interpreter {
            raw: Cell::new(raw),
            config,
        })
    }

    /// The main thread, or [`Error::Closed`].
    pub(crate) fn raw(&self) -> Result<*mut ffi::lua_State> {
        let raw = self.raw.get();
        if raw.is_null() {
            Err(Error::Closed)
        } else {
            Ok(raw)
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.raw.get().is_null()
    }

    pub(crate) fn config(&self) -> &RootConfig {
        &self.config
    }

    pub(crate) fn close(&self) {
        let raw = self.raw.replace(ptr::null_mut());
        if !raw.is_null() {
            tracing::debug!("closing interpreter");
            // SAFETY: `raw` came from luaL_newstate and is closed exactly once.
            unsafe { ffi::lua_close(raw) };
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.close();
    }
}
