//! Host objects exported as full userdata.
//!
//! An exported object lives in an `Rc<RefCell<T>>`. Each push writes one
//! strong count into a fresh userdata block, which the block's `__gc`
//! releases. The host keeps its own counts through [`UserDataRef`].
//!
//! Every exported type gets one metatable per interpreter, registered under
//! a key derived from its [`TypeId`] the first time a value of that type is
//! pushed. Only a block carrying that exact metatable is ever read back as
//! a `T`, so two types that report the same [`UserData::type_name`] stay
//! apart:
//!
//! ```text
//! metatable
//!   __name   <type name>, for messages and tostring
//!   __gc     drops the block's Rc
//!   __index  { method name → closure }
//!   __add, __tostring, ...  (meta functions)
//! ```

use std::any::TypeId;
use std::cell::{Ref, RefCell, RefMut};
use std::ffi::{c_int, CString};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use mlua_sys as ffi;

use crate::errors::{Error, Result, TypeError};
use crate::marshal::{check_arity, FromLua, FromLuaMulti, HostFunction, IntoLua, IntoLuaMulti};
use crate::stack::{Slot, Stack};
use crate::value::{Reference, Value};

/// A host type that can be exported to scripts.
pub trait UserData: Sized + 'static {
    /// Name shown in type errors and by `tostring`. Need not be unique.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Register methods and metamethods. Runs once per interpreter.
    fn add_methods(_methods: &mut UserDataMethods<Self>) {}
}

/// Method and metamethod registrations for one exported type.
pub struct UserDataMethods<T> {
    methods: Vec<(String, HostFunction)>,
    meta: Vec<(String, HostFunction)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: UserData> UserDataMethods<T> {
    fn new() -> Self {
        UserDataMethods {
            methods: Vec::new(),
            meta: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// A method called as `object:name(args)` with shared access to the
    /// object.
    pub fn method<A, R, F>(&mut self, name: impl Into<String>, method: F)
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(&T, A) -> R + 'static,
    {
        let function = HostFunction::from_raw(move |stack, nargs| {
            let this = receiver::<T>(stack, nargs, A::COUNT)?;
            let args = A::read_results(stack, 2, nargs - 1)?;
            let results = {
                let this = this.try_borrow()?;
                method(&this, args)
            };
            results.push_all(stack)
        });
        self.methods.push((name.into(), function));
    }

    /// A method called as `object:name(args)` with exclusive access to the
    /// object. Re-entrant calls on the same object fail with a Lua error.
    pub fn method_mut<A, R, F>(&mut self, name: impl Into<String>, method: F)
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(&mut T, A) -> R + 'static,
    {
        let function = HostFunction::from_raw(move |stack, nargs| {
            let this = receiver::<T>(stack, nargs, A::COUNT)?;
            let args = A::read_results(stack, 2, nargs - 1)?;
            let results = {
                let mut this = this.try_borrow_mut()?;
                method(&mut this, args)
            };
            results.push_all(stack)
        });
        self.methods.push((name.into(), function));
    }

    /// A metamethod such as `__add` or `__tostring`. Operands arrive as
    /// plain arguments, so binary operators usually take a tuple.
    pub fn meta_function<A, R, F>(&mut self, name: impl Into<String>, function: F)
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(A) -> R + 'static,
    {
        self.meta.push((name.into(), HostFunction::new(function)));
    }
}

/// Read the receiver of a method call from slot 1.
fn receiver<T: UserData>(stack: &Stack, nargs: c_int, count: c_int) -> Result<UserDataRef<T>> {
    let expected = if count == ffi::LUA_MULTRET {
        count
    } else {
        count + 1
    };
    check_arity(expected, nargs)?;
    if nargs < 1 {
        return Err(Error::Arity {
            expected: 1,
            got: nargs,
        });
    }
    UserDataRef::read_block(stack, 1).map_err(|_| {
        TypeError::new(T::type_name(), stack.kind(1))
            .with_detail("method called without its object (use `object:method()`)")
            .into()
    })
}

/// Fill a freshly created metatable (on top of the stack) for `T`.
fn populate<T: UserData>(stack: &Stack) -> Result<()> {
    let mut registered = UserDataMethods::<T>::new();
    T::add_methods(&mut registered);
    let meta = stack.top();
    stack.reserve(4)?;
    stack.push_str("__name");
    stack.push_str(T::type_name());
    stack.raw_set(meta);
    if !registered.methods.is_empty() {
        stack.push_str("__index");
        stack.new_table(0, registered.methods.len());
        let table = stack.top();
        for (name, function) in &registered.methods {
            stack.push_str(name);
            function.push_to(stack)?;
            stack.raw_set(table);
        }
        stack.raw_set(meta);
    }
    for (name, function) in &registered.meta {
        if name == "__gc" {
            tracing::warn!(type_name = T::type_name(), "ignoring user-supplied __gc");
            continue;
        }
        stack.push_str(name);
        function.push_to(stack)?;
        stack.raw_set(meta);
    }
    tracing::debug!(
        type_name = T::type_name(),
        methods = registered.methods.len(),
        meta = registered.meta.len(),
        "registered userdata metatable"
    );
    Ok(())
}

/// Registry key of `T`'s metatable.
fn metatable_name<T: UserData>() -> CString {
    let name = format!("luavar.userdata.{:?}", TypeId::of::<T>()).replace('\0', "");
    CString::new(name).unwrap_or_default()
}

/// The host's handle to an exported object.
///
/// Clones share the object. The object is dropped once every handle and
/// every userdata block holding it are gone.
pub struct UserDataRef<T>(Rc<RefCell<T>>);

impl<T: UserData> UserDataRef<T> {
    pub fn new(object: T) -> Self {
        UserDataRef(Rc::new(RefCell::new(object)))
    }

    /// Shared access. Panics if the object is mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Exclusive access. Panics if the object is borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, T>> {
        self.0.try_borrow().map_err(|_| {
            Error::External(format!("`{}` is already mutably borrowed", T::type_name()))
        })
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>> {
        self.0
            .try_borrow_mut()
            .map_err(|_| Error::External(format!("`{}` is already borrowed", T::type_name())))
    }

    /// Whether both handles share one object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Clone the handle out of the userdata block at `index`.
    fn read_block(stack: &Stack, index: c_int) -> Result<Self> {
        stack.reserve(2)?;
        let name = metatable_name::<T>();
        let block = stack.test_userdata(index, &name).cast::<Rc<RefCell<T>>>();
        if block.is_null() {
            return Err(TypeError::new(T::type_name(), stack.kind(index)).into());
        }
        // SAFETY: the metatable is keyed by `TypeId::of::<T>()`, so every
        // block carrying it was written by `push_to` below with an
        // `Rc<RefCell<T>>`; the block stays alive while on the stack.
        Ok(UserDataRef(Rc::clone(unsafe { &*block })))
    }
}

impl<T> Clone for UserDataRef<T> {
    fn clone(&self) -> Self {
        UserDataRef(Rc::clone(&self.0))
    }
}

impl<T: UserData> fmt::Debug for UserDataRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserDataRef<{}>({:p})", T::type_name(), Rc::as_ptr(&self.0))
    }
}

impl<T: UserData> IntoLua for UserDataRef<T> {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        stack.push_userdata(Rc::clone(&self.0), &metatable_name::<T>(), populate::<T>)
    }
}

impl<T: UserData> FromLua for UserDataRef<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::UserData(any) => any.downcast(),
            other => Err(TypeError::new(T::type_name(), other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.is_userdata_of(&metatable_name::<T>())
    }

    fn read(stack: &Stack, index: c_int) -> Result<Self> {
        Self::read_block(stack, index)
    }
}

/// A full userdata of any type, pinned in the registry.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AnyUserData(Reference);

impl AnyUserData {
    pub(crate) fn new(reference: Reference) -> Self {
        AnyUserData(reference)
    }

    pub(crate) fn reference(&self) -> &Reference {
        &self.0
    }

    pub fn identity(&self) -> usize {
        self.0.identity()
    }

    /// Whether the block holds an exported `T`.
    pub fn is<T: UserData>(&self) -> bool {
        self.downcast::<T>().is_ok()
    }

    /// The host handle to the exported `T` inside the block.
    pub fn downcast<T: UserData>(&self) -> Result<UserDataRef<T>> {
        let stack = Stack::main(self.0.interpreter())?;
        let _guard = stack.guard();
        self.0.push_to(&stack)?;
        UserDataRef::read_block(&stack, -1)
    }
}

impl fmt::Debug for AnyUserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyUserData({:?})", self.0)
    }
}

impl IntoLua for AnyUserData {
    fn push_to(&self, stack: &Stack) -> Result<()> {
        self.0.push_to(stack)
    }
}

impl FromLua for AnyUserData {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::UserData(any) => Ok(any),
            other => Err(TypeError::new("userdata", other.kind()).into()),
        }
    }

    fn accepts(slot: Slot<'_>) -> bool {
        slot.kind() == crate::value::Kind::UserData
    }
}
