//! The entry point: one interpreter and the paths into it.

use std::ffi::c_int;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use mlua_sys as ffi;

use crate::errors::{PanicError, Result};
use crate::stack::Stack;
use crate::state::Interpreter;
use crate::value::Value;
use crate::var::{Namespace, Var};
use crate::RootConfig;

/// Owner of one interpreter instance.
///
/// Dropping the `Root` closes the interpreter. Paths, references and
/// iterators that outlive it stay safe to hold and drop; operations on them
/// return [`Error::Closed`](crate::Error::Closed).
pub struct Root {
    interp: Rc<Interpreter>,
}

impl Root {
    /// A fresh interpreter with the standard libraries open.
    pub fn new() -> Result<Self> {
        Self::with_config(RootConfig::default())
    }

    pub fn with_config(config: RootConfig) -> Result<Self> {
        let open_std_libs = config.open_std_libs;
        let interp = Rc::new(Interpreter::open(config)?);
        let raw = interp.raw()?;
        // SAFETY: `raw` is a fresh interpreter owned by `interp`.
        unsafe {
            ffi::lua_atpanic(raw, on_panic);
            if open_std_libs {
                ffi::luaL_openlibs(raw);
            }
        }
        tracing::debug!(open_std_libs, "created interpreter");
        Ok(Root { interp })
    }

    /// The path `_G[key]`.
    pub fn at(&self, key: impl Into<Value>) -> Var {
        Var::new(Rc::clone(&self.interp), Namespace::Globals, key.into())
    }

    /// The path `registry[key]`.
    pub fn registry(&self, key: impl Into<Value>) -> Var {
        Var::new(Rc::clone(&self.interp), Namespace::Registry, key.into())
    }

    /// Compile and run `source` at top level and return all its results.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn do_chunk(&self, source: &str) -> Result<Vec<Value>> {
        self.run(|stack| stack.load_chunk(source), "unable to run chunk")
    }

    /// Compile and run the file at `path` and return all its results.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %path.as_ref().display()))]
    pub fn do_file(&self, path: impl AsRef<Path>) -> Result<Vec<Value>> {
        self.run(|stack| stack.load_file(path.as_ref()), "unable to run file")
    }

    /// The main thread's stack.
    pub fn stack(&self) -> Result<Stack> {
        Stack::main(&self.interp)
    }

    /// Number of slots in use on the main stack.
    pub fn stack_depth(&self) -> Result<usize> {
        Ok(usize::try_from(self.stack()?.depth()?).unwrap_or(0))
    }

    pub fn config(&self) -> &RootConfig {
        self.interp.config()
    }

    fn run(&self, load: impl FnOnce(&Stack) -> Result<()>, run_message: &str) -> Result<Vec<Value>> {
        let stack = self.stack()?;
        let _guard = stack.guard();
        let handler = stack.push_message_handler()?;
        load(&stack)?;
        stack.protected_call(0, ffi::LUA_MULTRET, handler, run_message)?;
        (handler + 1..=stack.top())
            .map(|index| stack.read(index))
            .collect()
    }
}

impl Drop for Root {
    fn drop(&mut self) {
        self.interp.close();
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("open", &self.interp.is_open())
            .field("config", self.interp.config())
            .finish()
    }
}

/// Panic handler for errors raised outside any protected call.
///
/// The interpreter cannot continue after one, so the error and the stack
/// are reported and the process aborts.
unsafe extern "C-unwind" fn on_panic(state: *mut ffi::lua_State) -> c_int {
    // SAFETY: the interpreter passes its live, panicking thread.
    let error = unsafe { PanicError::capture(state) };
    tracing::error!(message = %error.message, "unprotected interpreter error");
    eprintln!("{error}");
    std::process::abort()
}

#[cfg(test)]
mod tests;
