//! Error types for marshalling, path resolution and interpreter calls.
//!
//! # Categories
//!
//! - [`TypeError`]: a value cannot be converted to the requested host type.
//! - [`PathError`]: a lineage walks through something that is not indexable.
//! - [`InvocationError`]: the call target is not callable. Raised before any
//!   interpreter call is made.
//! - [`LuaError`]: a protected call or chunk load failed inside the
//!   interpreter. Carries the interpreter's message and traceback.
//! - [`PanicError`]: an unprotected interpreter failure. It never reaches the
//!   caller: the panic handler logs it and aborts the process.
//!
//! [`Error`] wraps all of them, plus the host-callback failures that get
//! raised back into the interpreter.

use std::ffi::c_int;
use std::fmt;

use mlua_sys as ffi;

use crate::stack::{dump_raw, Stack};
use crate::value::Kind;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any failure reported by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Lua(#[from] LuaError),
    /// A host function was called with the wrong number of arguments.
    #[error("host function invoked with the wrong number of arguments: expected {expected}, got {got}")]
    Arity { expected: c_int, got: c_int },
    /// A host callback reported a failure of its own.
    #[error("{0}")]
    External(String),
    /// `lua_checkstack` refused to grow the stack.
    #[error("interpreter stack cannot grow by {needed} slots")]
    StackExhausted { needed: c_int },
    /// The owning [`Root`](crate::Root) has been dropped.
    #[error("interpreter has been closed")]
    Closed,
}

/// A value has the wrong kind for the requested conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeError {
    pub expected: &'static str,
    pub found: Kind,
    pub detail: Option<String>,
}

impl TypeError {
    pub fn new(expected: &'static str, found: Kind) -> Self {
        TypeError {
            expected,
            found,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid type: expected {}, found {}",
            self.expected,
            self.found.name()
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for TypeError {}

/// A path could not be walked.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at `{path}`")]
pub struct PathError {
    /// The prefix of the path that was being indexed.
    pub path: String,
    pub message: String,
}

impl PathError {
    pub(crate) fn not_indexable(path: String, found: Kind) -> Self {
        PathError {
            path,
            message: format!("cannot index a {} value", found.name()),
        }
    }

    pub(crate) fn invalid_key(path: String, key: Kind) -> Self {
        PathError {
            path,
            message: format!("cannot assign through a {} key", key.name()),
        }
    }
}

/// The target of `call`/`invoke` is not a function and has no `__call`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("tried to invoke a non-function: `{path}` is a {}", .found.name())]
pub struct InvocationError {
    pub path: String,
    pub found: Kind,
    /// Interpreter value stack at the time of the attempt.
    pub stack_dump: String,
}

/// Which stage of the interpreter failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Error raised while running code.
    Runtime,
    /// Allocation failure.
    Memory,
    /// The message handler itself failed.
    MessageHandler,
    /// Source failed to compile.
    Syntax,
    /// A chunk file could not be opened or read.
    File,
}

impl ErrorKind {
    pub(crate) fn from_status(status: c_int) -> Self {
        match status {
            ffi::LUA_ERRMEM => ErrorKind::Memory,
            ffi::LUA_ERRERR => ErrorKind::MessageHandler,
            ffi::LUA_ERRSYNTAX => ErrorKind::Syntax,
            ffi::LUA_ERRFILE => ErrorKind::File,
            _ => ErrorKind::Runtime,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Runtime => "runtime error",
            ErrorKind::Memory => "memory error",
            ErrorKind::MessageHandler => "error in error handling",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::File => "file error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure reported by the interpreter itself.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({kind}): {lua_message}")]
pub struct LuaError {
    pub kind: ErrorKind,
    /// What the host was doing, e.g. "unable to run chunk".
    pub message: String,
    /// The interpreter's own error message.
    pub lua_message: String,
    /// `luaL_traceback` output when the message handler ran, otherwise a
    /// dump of the value stack.
    pub traceback: String,
}

const TRACEBACK_MARKER: &str = "\nstack traceback:";

impl LuaError {
    /// Build from the error object on top of `stack`. The object is left in
    /// place; the caller's guard removes it.
    pub(crate) fn from_stack(stack: &Stack, status: c_int, message: &str) -> Self {
        let slot = stack.slot(-1);
        let text = if slot.is_string() {
            stack.to_string_lossy(-1)
        } else {
            format!("(error object is a {} value)", slot.kind().name())
        };
        let (lua_message, traceback) = match text.find(TRACEBACK_MARKER) {
            Some(at) => (text[..at].to_owned(), text[at + 1..].to_owned()),
            None => (text, stack.dump()),
        };
        LuaError {
            kind: ErrorKind::from_status(status),
            message: message.to_owned(),
            lua_message,
            traceback,
        }
    }

    pub(crate) fn out_of_memory(message: &str) -> Self {
        LuaError {
            kind: ErrorKind::Memory,
            message: message.to_owned(),
            lua_message: String::from("not enough memory"),
            traceback: String::new(),
        }
    }
}

/// An unprotected interpreter failure, captured by the panic handler.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("PANIC: unprotected error in call to Lua API ({message})\n{stack_dump}")]
pub struct PanicError {
    pub message: String,
    pub stack_dump: String,
}

impl PanicError {
    /// Capture the message on top of `raw` and a dump of its stack.
    ///
    /// # Safety
    ///
    /// `raw` must be a live interpreter thread.
    pub(crate) unsafe fn capture(raw: *mut ffi::lua_State) -> Self {
        let mut len = 0usize;
        // SAFETY: caller guarantees `raw` is live; lua_tolstring tolerates any slot.
        let ptr = unsafe { ffi::lua_tolstring(raw, -1, &mut len) };
        let message = if ptr.is_null() {
            String::from("error object is not a string")
        } else {
            // SAFETY: lua_tolstring returned `len` readable bytes.
            let bytes = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) };
            String::from_utf8_lossy(bytes).into_owned()
        };
        PanicError {
            message,
            // SAFETY: same thread as above.
            stack_dump: unsafe { dump_raw(raw) },
        }
    }
}

#[cfg(test)]
mod tests;
