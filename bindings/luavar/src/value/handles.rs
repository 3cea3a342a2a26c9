//! Values that stay inside the interpreter: functions, threads, and the
//! registry pins that keep them alive.

use std::ffi::c_int;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use mlua_sys as ffi;

use crate::errors::{Result, TypeError};
use crate::marshal::HostFunction;
use crate::stack::Stack;
use crate::state::Interpreter;
use crate::value::Kind;

/// An interpreter value pinned in the registry.
///
/// Clones share the pin; the registry slot is released when the last clone
/// drops, unless the interpreter is already closed.
#[derive(Clone)]
pub struct Reference(Rc<Pin>);

struct Pin {
    interp: Rc<Interpreter>,
    key: c_int,
    identity: usize,
    kind: Kind,
}

impl Drop for Pin {
    fn drop(&mut self) {
        if let Ok(raw) = self.interp.raw() {
            // SAFETY: the interpreter is open and `key` was returned by luaL_ref.
            unsafe { ffi::luaL_unref(raw, ffi::LUA_REGISTRYINDEX, self.key) };
        }
    }
}

impl Reference {
    /// Pin the value at `index`.
    pub(crate) fn pin(stack: &Stack, index: c_int) -> Result<Self> {
        let slot = stack.slot(index);
        let kind = slot.kind();
        let identity = stack.to_pointer(index) as usize;
        let key = stack.create_ref(index)?;
        Ok(Reference(Rc::new(Pin {
            interp: Rc::clone(stack.interpreter()),
            key,
            identity,
            kind,
        })))
    }

    /// Push the pinned value. Fails for a stack of another interpreter.
    pub(crate) fn push_to(&self, stack: &Stack) -> Result<()> {
        if !stack.same_interpreter(&self.0.interp) {
            return Err(TypeError::new("value of this interpreter", self.0.kind)
                .with_detail("it belongs to another interpreter instance")
                .into());
        }
        stack.reserve(1)?;
        stack.push_ref(self.0.key);
        Ok(())
    }

    pub(crate) fn interpreter(&self) -> &Rc<Interpreter> {
        &self.0.interp
    }

    /// Address of the interpreter object, stable for its lifetime.
    pub fn identity(&self) -> usize {
        self.0.identity
    }

    pub fn kind(&self) -> Kind {
        self.0.kind
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0.interp, &other.0.interp) && self.0.identity == other.0.identity
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.identity.hash(state);
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.0.kind.name(), self.0.identity)
    }
}

/// A coroutine handle.
///
/// The coroutine is pinned in the registry like any other interpreter
/// value, so the handle keeps it alive until the last clone drops.
#[derive(Clone)]
pub struct Thread {
    raw: *mut ffi::lua_State,
    reference: Reference,
}

impl Thread {
    /// Pin the coroutine at `index`.
    pub(crate) fn pin(stack: &Stack, index: c_int) -> Result<Self> {
        Ok(Thread {
            raw: stack.to_thread(index),
            reference: Reference::pin(stack, index)?,
        })
    }

    /// The coroutine's own state, for identity and diagnostics.
    pub fn as_ptr(&self) -> *mut ffi::lua_State {
        self.raw
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub(crate) fn push_to(&self, stack: &Stack) -> Result<()> {
        self.reference.push_to(stack)
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Thread {}

impl Hash for Thread {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread@{:p}", self.raw)
    }
}

/// A callable value.
#[derive(Clone)]
pub enum Function {
    /// A plain C function with no upvalues.
    Native(ffi::lua_CFunction),
    /// A host closure, wrapped into a native closure when pushed.
    Host(HostFunction),
    /// A function that already lives in the interpreter.
    Ref(Reference),
}

impl Function {
    fn identity(&self) -> usize {
        match self {
            Function::Native(f) => *f as usize,
            Function::Host(h) => h.identity(),
            Function::Ref(r) => r.identity(),
        }
    }

    pub(crate) fn push_to(&self, stack: &Stack) -> Result<()> {
        match self {
            Function::Native(f) => {
                stack.reserve(1)?;
                stack.push_cfunction(*f);
                Ok(())
            }
            Function::Host(h) => h.push_to(stack),
            Function::Ref(r) => r.push_to(stack),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Native(_), Function::Native(_)) | (Function::Host(_), Function::Host(_)) => {
                self.identity() == other.identity()
            }
            (Function::Ref(a), Function::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native(_) => write!(f, "native@{:#x}", self.identity()),
            Function::Host(_) => write!(f, "host@{:#x}", self.identity()),
            Function::Ref(r) => write!(f, "{r:?}"),
        }
    }
}
