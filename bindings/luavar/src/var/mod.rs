//! Lazy paths into the interpreter's namespace.
//!
//! A [`Var`] names a location (a root table plus a lineage of keys) without
//! holding anything on the interpreter stack. Building one is pure host
//! work; the interpreter is consulted only when an operation needs the
//! value there, and every such operation leaves the stack as it found it.
//!
//! # Realization
//!
//! ```text
//! root.at("config").at("window").at("width")
//!
//!   push root table            [_G]
//!   "config" → get             [_G][config]
//!   "window" → get             [_G][config][window]
//!   push "width"               [_G][config][window]["width"]   parent + key
//!   get                        [_G][config][window][width]     value
//! ```
//!
//! Reads through a missing (nil) intermediate produce nil. Writes through
//! one, or any access through a value that is neither a table nor has the
//! matching `__index` / `__newindex` metamethod, fail with [`PathError`].

mod pairs;

use std::ffi::{c_int, CStr};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::errors::{InvocationError, PathError, Result};
use crate::marshal::{FromLua, FromLuaMulti, IntoLua, IntoLuaMulti};
use crate::stack::{Slot, Stack};
use crate::stack_guard::StackGuard;
use crate::state::Interpreter;
use crate::userdata::{UserData, UserDataRef};
use crate::value::{Kind, Value};

pub use pairs::Pairs;

/// The table a lineage starts from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Namespace {
    Globals,
    Registry,
}

impl Namespace {
    fn push(self, stack: &Stack) {
        match self {
            Namespace::Globals => stack.push_globals(),
            Namespace::Registry => stack.push_registry(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Namespace::Globals => "_G",
            Namespace::Registry => "registry",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// A lazily-evaluated path into the interpreter.
///
/// Equal paths compare equal regardless of the values behind them: same
/// interpreter instance, same root table, and element-wise equal keys.
#[derive(Clone)]
pub struct Var {
    interp: Rc<Interpreter>,
    namespace: Namespace,
    lineage: SmallVec<[Value; 4]>,
}

impl Var {
    pub(crate) fn new(interp: Rc<Interpreter>, namespace: Namespace, key: Value) -> Self {
        let mut lineage = SmallVec::new();
        lineage.push(key);
        Var {
            interp,
            namespace,
            lineage,
        }
    }

    /// The child path `self[key]`. Never touches the interpreter.
    #[must_use]
    pub fn at(&self, key: impl Into<Value>) -> Var {
        let mut child = self.clone();
        child.lineage.push(key.into());
        child
    }

    /// The child path keyed by the current value behind `key`.
    pub fn at_var(&self, key: &Var) -> Result<Var> {
        Ok(self.at(key.value()?))
    }

    /// The keys from the root, outermost first. Never empty.
    pub fn lineage(&self) -> &[Value] {
        &self.lineage
    }

    /// The last key.
    pub fn key(&self) -> &Value {
        &self.lineage[self.lineage.len() - 1]
    }

    /// Copy of the value at this path.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %self))]
    pub fn value(&self) -> Result<Value> {
        let stack = self.stack()?;
        let _guard = StackGuard::new(&stack);
        self.push_value(&stack)?;
        stack.read(-1)
    }

    /// The value at this path converted to `T`.
    pub fn get<T: FromLua>(&self) -> Result<T> {
        T::from_value(self.value()?)
    }

    /// Whether the value at this path converts to `T`, checked in place.
    pub fn is<T: FromLua>(&self) -> bool {
        self.inspect(T::accepts).unwrap_or(false)
    }

    /// `get::<T>()` when the value is a `T`, otherwise `fallback`.
    pub fn get_or<T: FromLua>(&self, fallback: T) -> T {
        if !self.is::<T>() {
            return fallback;
        }
        self.get().unwrap_or(fallback)
    }

    /// Kind of the value at this path.
    pub fn kind(&self) -> Result<Kind> {
        self.inspect(|slot| slot.kind())
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind(), Ok(Kind::Table))
    }

    /// Assign `value` to this path. Returns `self` so assignments chain.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %self))]
    pub fn set(&self, value: impl IntoLua) -> Result<&Self> {
        let stack = self.stack()?;
        let _guard = StackGuard::new(&stack);
        self.push_parent_key(&stack, Access::Write)?;
        value.push_to(&stack)?;
        stack.set_table(-3);
        Ok(self)
    }

    /// Export `object` as userdata, assign it here, and return the host's
    /// handle to it.
    pub fn create<T: UserData>(&self, object: T) -> Result<UserDataRef<T>> {
        let handle = UserDataRef::new(object);
        self.set(&handle)?;
        Ok(handle)
    }

    /// Call the function at this path, discarding its results.
    pub fn call(&self, args: impl IntoLuaMulti) -> Result<()> {
        self.invoke(args)
    }

    /// Call the function at this path and convert its results.
    ///
    /// `R` decides how many results are requested: none for `()`, one for a
    /// single type, `N` for a tuple, all for [`Variadic`](crate::Variadic).
    #[tracing::instrument(level = "trace", skip_all, fields(path = %self))]
    pub fn invoke<R: FromLuaMulti>(&self, args: impl IntoLuaMulti) -> Result<R> {
        let stack = self.stack()?;
        let _guard = StackGuard::new(&stack);
        let handler = stack.push_message_handler()?;
        self.push_value(&stack)?;
        let target = stack.slot(-1);
        if !target.is_callable() {
            return Err(InvocationError {
                path: self.to_string(),
                found: target.kind(),
                stack_dump: stack.dump(),
            }
            .into());
        }
        let function = stack.top();
        let nargs = args.push_all(&stack)?;
        stack.protected_call(nargs, R::COUNT, handler, "error calling lua function")?;
        let count = stack.top() - function + 1;
        R::read_results(&stack, function, count)
    }

    /// Compile and run `source`, then assign its result to this path.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %self))]
    pub fn do_chunk(&self, source: &str) -> Result<()> {
        self.run_and_assign(|stack| stack.load_chunk(source), "unable to run chunk")
    }

    /// Compile and run the file at `path`, then assign its result here.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %self))]
    pub fn do_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.run_and_assign(|stack| stack.load_file(path.as_ref()), "unable to run file")
    }

    /// Iterate the table at this path as `(key, child path)` pairs.
    ///
    /// The iterator holds a stack guard until dropped. Drop iterators in
    /// reverse order of creation and do not add keys to the table while
    /// iterating it.
    pub fn pairs(&self) -> Result<Pairs> {
        Pairs::new(self)
    }

    fn run_and_assign(
        &self,
        load: impl FnOnce(&Stack) -> Result<()>,
        run_message: &str,
    ) -> Result<()> {
        let stack = self.stack()?;
        let _guard = StackGuard::new(&stack);
        self.push_parent_key(&stack, Access::Write)?;
        let handler = stack.push_message_handler()?;
        load(&stack)?;
        stack.protected_call(0, 1, handler, run_message)?;
        stack.remove(handler);
        stack.set_table(-3);
        Ok(())
    }

    pub(crate) fn stack(&self) -> Result<Stack> {
        Stack::main(&self.interp)
    }

    /// Realize the value and inspect its slot.
    fn inspect<R>(&self, check: impl FnOnce(Slot<'_>) -> R) -> Result<R> {
        let stack = self.stack()?;
        let _guard = StackGuard::new(&stack);
        self.push_value(&stack)?;
        Ok(check(stack.slot(-1)))
    }

    /// Push the value at this path onto `stack`, above the intermediate
    /// tables of the walk.
    pub(crate) fn push_value(&self, stack: &Stack) -> Result<()> {
        if self.push_parent_key(stack, Access::Read)? {
            stack.get_table(-2);
        }
        Ok(())
    }

    /// Push the root, walk every key but the last, then push the last key,
    /// leaving `[.., parent, key]` on top.
    ///
    /// A read through a nil intermediate stops early with that nil on top
    /// and returns `false`.
    fn push_parent_key(&self, stack: &Stack, access: Access) -> Result<bool> {
        let depth = c_int::try_from(self.lineage.len()).unwrap_or(c_int::MAX);
        stack.reserve(depth.saturating_add(2))?;
        self.namespace.push(stack);
        let last = self.lineage.len() - 1;
        for (position, key) in self.lineage.iter().enumerate() {
            let container = stack.slot(-1);
            match container.kind() {
                Kind::Table => {}
                Kind::Nil if access == Access::Read => return Ok(false),
                kind if has_access_metamethod(container, access) => {
                    tracing::trace!(kind = kind.name(), "indexing through a metamethod");
                }
                kind => {
                    return Err(PathError::not_indexable(self.prefix(position), kind).into());
                }
            }
            key.push_to(stack)?;
            if position < last {
                stack.get_table(-2);
            }
        }
        if access == Access::Write {
            let key = stack.slot(-1);
            if key.is_invalid_key() {
                return Err(PathError::invalid_key(self.to_string(), key.kind()).into());
            }
        }
        Ok(true)
    }

    /// Display form of the first `len` keys.
    fn prefix(&self, len: usize) -> String {
        let mut out = String::from(self.namespace.name());
        for key in &self.lineage[..len] {
            push_key(&mut out, key);
        }
        out
    }
}

fn has_access_metamethod(slot: Slot<'_>, access: Access) -> bool {
    let name: &CStr = match access {
        Access::Read => c"__index",
        Access::Write => c"__newindex",
    };
    slot.kind() != Kind::Nil && slot.has_metafield(name)
}

fn push_key(out: &mut String, key: &Value) {
    match key {
        Value::String(s) if is_identifier(s) => {
            out.push('.');
            out.push_str(s);
        }
        Value::String(s) => out.push_str(&format!("[{s:?}]")),
        Value::Number(_) | Value::Boolean(_) => out.push_str(&format!("[{key}]")),
        other => out.push_str(&format!("[<{}>]", other.kind().name())),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.interp, &other.interp)
            && self.namespace == other.namespace
            && self.lineage == other.lineage
    }
}

impl Eq for Var {}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix(self.lineage.len()))
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({self})")
    }
}

/// Pushing a path pushes the value behind it. Within one interpreter the
/// value moves directly (tables keep their identity); across interpreters
/// it is copied through a [`Value`].
impl IntoLua for Var {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        if !stack.same_interpreter(&self.interp) {
            return self.value()?.push_to(stack);
        }
        let mut guard = StackGuard::new(stack);
        self.push_value(stack)?;
        guard.keep_top();
        Ok(())
    }
}
