//! Safe wrapper over the interpreter's value stack.
//!
//! Every raw C API call in the crate goes through [`Stack`]. A `Stack` pairs
//! one interpreter thread with the shared interpreter handle, so values read
//! from it can pin themselves in the registry and closures pushed onto it
//! know which instance they belong to.
//!
//! # Safety model
//!
//! A `Stack` is only built from an open interpreter: [`Stack::main`] checks
//! the handle, and [`Stack::from_raw`] is reserved for trampolines that the
//! interpreter itself calls. A `Stack` can still outlive its
//! [`Root`](crate::Root), so every public entry point re-checks that the
//! interpreter is open: fallible ones return [`Error::Closed`], and [`Slot`]
//! queries report an empty slot. Crate-internal helpers skip the check; they
//! run only below an entry point that made it.
//!
//! Indices follow Lua's conventions: positive values are absolute, negative
//! values count down from the top.

use std::ffi::{c_int, c_void, CStr, CString};
use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;
use std::{mem, ptr};

use mlua_sys as ffi;

use crate::errors::{Error, LuaError, Result, TypeError};
use crate::marshal::IntoLua;
use crate::stack_guard::StackGuard;
use crate::state::Interpreter;
use crate::value::{self, Kind, Value};

/// `2^63`: numbers in `[-2^63, 2^63)` with no fraction fit a Lua integer.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Alignment Lua guarantees for full userdata blocks (`LUAI_MAXALIGN`
/// covers `f64`, `i64` and pointers).
const USERDATA_ALIGN: usize = mem::align_of::<f64>();

/// One thread of an interpreter, seen as a stack of values.
///
/// Not `Clone`: a stack lent to [`IntoLua::push_to`] may belong to a
/// coroutine that the collector frees once the call returns.
pub struct Stack {
    raw: *mut ffi::lua_State,
    interp: Rc<Interpreter>,
}

impl Stack {
    /// The main thread of an open interpreter.
    pub(crate) fn main(interp: &Rc<Interpreter>) -> Result<Self> {
        Ok(Stack {
            raw: interp.raw()?,
            interp: Rc::clone(interp),
        })
    }

    /// Wrap a thread handed to a native function by the interpreter.
    ///
    /// # Safety
    ///
    /// `raw` must be a live thread of `interp`.
    pub(crate) unsafe fn from_raw(raw: *mut ffi::lua_State, interp: Rc<Interpreter>) -> Self {
        Stack { raw, interp }
    }

    /// A second handle on the same thread, for guards.
    pub(crate) fn share(&self) -> Self {
        Stack {
            raw: self.raw,
            interp: Rc::clone(&self.interp),
        }
    }

    pub(crate) fn interpreter(&self) -> &Rc<Interpreter> {
        &self.interp
    }

    pub(crate) fn is_open(&self) -> bool {
        self.interp.is_open()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    /// Whether `other` belongs to the same interpreter instance.
    pub(crate) fn same_interpreter(&self, other: &Rc<Interpreter>) -> bool {
        Rc::ptr_eq(&self.interp, other)
    }

    /// Number of slots in use, which is also the index of the top slot.
    pub fn depth(&self) -> Result<c_int> {
        self.ensure_open()?;
        Ok(self.top())
    }

    /// A guard that restores the current depth when dropped.
    pub fn guard(&self) -> StackGuard {
        StackGuard::new(self)
    }

    /// A read-only view of one slot.
    pub fn slot(&self, index: c_int) -> Slot<'_> {
        Slot { stack: self, index }
    }

    /// Push one host value.
    pub fn push<T: IntoLua + ?Sized>(&self, value: &T) -> Result<()> {
        self.ensure_open()?;
        value.push_to(self)
    }

    /// Materialize the slot at `index` into a [`Value`].
    pub fn read(&self, index: c_int) -> Result<Value> {
        self.ensure_open()?;
        value::read_value(self, index)
    }

    pub(crate) fn top(&self) -> c_int {
        // SAFETY: `raw` is a live thread (module docs).
        unsafe { ffi::lua_gettop(self.raw) }
    }

    pub(crate) fn set_top(&self, index: c_int) {
        // SAFETY: callers only shrink to a depth they recorded, or grow by
        // slots they reserved.
        unsafe { ffi::lua_settop(self.raw, index) }
    }

    pub(crate) fn pop(&self, count: c_int) {
        // SAFETY: callers pop only slots they pushed.
        unsafe { ffi::lua_pop(self.raw, count) }
    }

    pub(crate) fn abs_index(&self, index: c_int) -> c_int {
        // SAFETY: pure index arithmetic on a live thread.
        unsafe { ffi::lua_absindex(self.raw, index) }
    }

    pub(crate) fn remove(&self, index: c_int) {
        // SAFETY: `index` names an existing slot.
        unsafe { ffi::lua_remove(self.raw, index) }
    }

    /// Pop the top value into `index`.
    pub(crate) fn replace(&self, index: c_int) {
        // SAFETY: `index` names an existing slot below the top.
        unsafe { ffi::lua_replace(self.raw, index) }
    }

    /// Make room for `extra` more slots. Every push path starts here, so
    /// this is also where a closed interpreter is caught.
    pub(crate) fn reserve(&self, extra: c_int) -> Result<()> {
        self.ensure_open()?;
        // SAFETY: lua_checkstack only grows the stack.
        if unsafe { ffi::lua_checkstack(self.raw, extra) } == 0 {
            return Err(Error::StackExhausted { needed: extra });
        }
        Ok(())
    }

    // Pushes. Callers reserve space first.

    pub(crate) fn push_nil(&self) {
        // SAFETY: the caller reserved the slot.
        unsafe { ffi::lua_pushnil(self.raw) }
    }

    pub(crate) fn push_bool(&self, value: bool) {
        // SAFETY: the caller reserved the slot.
        unsafe { ffi::lua_pushboolean(self.raw, c_int::from(value)) }
    }

    pub(crate) fn push_integer(&self, value: i64) {
        // SAFETY: the caller reserved the slot.
        unsafe { ffi::lua_pushinteger(self.raw, value) }
    }

    /// Push a number, as an integer when it has an exact integer value.
    pub(crate) fn push_number(&self, value: f64) {
        if value.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&value) {
            self.push_integer(value as i64);
        } else {
            // SAFETY: the caller reserved the slot.
            unsafe { ffi::lua_pushnumber(self.raw, value) }
        }
    }

    pub(crate) fn push_str(&self, value: &str) {
        // SAFETY: lua_pushlstring copies `len` bytes out of the slice.
        unsafe {
            ffi::lua_pushlstring(self.raw, value.as_ptr().cast(), value.len());
        }
    }

    pub(crate) fn push_light(&self, pointer: *mut c_void) {
        // SAFETY: light userdata is never dereferenced by the interpreter.
        unsafe { ffi::lua_pushlightuserdata(self.raw, pointer) }
    }

    pub(crate) fn push_copy(&self, index: c_int) {
        // SAFETY: `index` names an existing slot or a pseudo-index; the
        // caller reserved the new slot.
        unsafe { ffi::lua_pushvalue(self.raw, index) }
    }

    pub(crate) fn push_globals(&self) {
        // SAFETY: LUA_RIDX_GLOBALS is always set in the registry.
        unsafe {
            ffi::lua_rawgeti(
                self.raw,
                ffi::LUA_REGISTRYINDEX,
                ffi::lua_Integer::from(ffi::LUA_RIDX_GLOBALS),
            );
        }
    }

    pub(crate) fn push_registry(&self) {
        self.push_copy(ffi::LUA_REGISTRYINDEX);
    }

    pub(crate) fn push_cfunction(&self, function: ffi::lua_CFunction) {
        // SAFETY: `function` follows the lua_CFunction protocol.
        unsafe { ffi::lua_pushcclosure(self.raw, function, 0) }
    }

    /// Push a closure over the top `upvalues` slots, which it consumes.
    pub(crate) fn push_cclosure(&self, function: ffi::lua_CFunction, upvalues: c_int) {
        // SAFETY: the caller pushed `upvalues` slots for the closure.
        unsafe { ffi::lua_pushcclosure(self.raw, function, upvalues) }
    }

    pub(crate) fn new_table(&self, sequence: usize, fields: usize) {
        let sequence = c_int::try_from(sequence).unwrap_or(c_int::MAX);
        let fields = c_int::try_from(fields).unwrap_or(c_int::MAX);
        // SAFETY: the size hints are advisory; the caller reserved the slot.
        unsafe { ffi::lua_createtable(self.raw, sequence, fields) }
    }

    /// Move `value` into a new full userdata on top of the stack and attach
    /// the metatable registered under `metatable`, creating it (with a
    /// `__gc` that drops `T`) on first use. `populate` runs only on creation,
    /// with the fresh metatable on top.
    pub(crate) fn push_userdata<T: 'static>(
        &self,
        value: T,
        metatable: &CStr,
        populate: impl FnOnce(&Self) -> Result<()>,
    ) -> Result<()> {
        const { assert!(mem::align_of::<T>() <= USERDATA_ALIGN) };
        self.reserve(4)?;
        // SAFETY: the block is sized for `T` and Lua aligns userdata for any
        // scalar type; the write initializes it before anything can read it.
        unsafe {
            let block = ffi::lua_newuserdatauv(self.raw, mem::size_of::<T>(), 0).cast::<T>();
            ptr::write(block, value);
        }
        // SAFETY: `metatable` is NUL-terminated.
        if unsafe { ffi::luaL_newmetatable(self.raw, metatable.as_ptr()) } != 0 {
            let meta = self.top();
            self.push_str("__gc");
            self.push_cfunction(drop_userdata::<T>);
            self.raw_set(meta);
            populate(self)?;
        }
        // SAFETY: the metatable is on top with the block right below it.
        unsafe { ffi::lua_setmetatable(self.raw, -2) };
        Ok(())
    }

    // Table access.

    /// `t[k]` with `t` at `index` and `k` on top; replaces `k` with the value.
    pub(crate) fn get_table(&self, index: c_int) -> Kind {
        // SAFETY: `index` holds an indexable value (checked by the caller);
        // metamethod errors are raised only inside protected calls.
        Kind::from_lua_type(unsafe { ffi::lua_gettable(self.raw, index) })
    }

    /// `t[k] = v` with `t` at `index`, `k` and `v` on top; pops both.
    pub(crate) fn set_table(&self, index: c_int) {
        // SAFETY: as for `get_table`, with the key and value on top.
        unsafe { ffi::lua_settable(self.raw, index) }
    }

    /// Raw `t[k] = v`; pops both. The key must be neither nil nor NaN.
    pub(crate) fn raw_set(&self, index: c_int) {
        // SAFETY: `index` is a table and the key is valid (see above).
        unsafe { ffi::lua_rawset(self.raw, index) }
    }

    /// Advance a traversal of the table at `index`. Pops the key on top and,
    /// when another entry exists, pushes its key and value.
    pub(crate) fn next(&self, index: c_int) -> bool {
        // SAFETY: `index` is a table and the top is the previous key.
        unsafe { ffi::lua_next(self.raw, index) != 0 }
    }

    /// Whether the value at `index` has a metatable with field `name`.
    pub(crate) fn has_metafield(&self, index: c_int, name: &CStr) -> bool {
        // SAFETY: luaL_getmetafield pushes the field only when it is not nil.
        let found = unsafe { ffi::luaL_getmetafield(self.raw, index, name.as_ptr()) };
        if found == ffi::LUA_TNIL {
            false
        } else {
            self.pop(1);
            true
        }
    }

    // Registry references.

    /// Pin a copy of the value at `index` in the registry.
    pub(crate) fn create_ref(&self, index: c_int) -> Result<c_int> {
        self.reserve(1)?;
        self.push_copy(index);
        // SAFETY: the copy is on top; luaL_ref pops it.
        Ok(unsafe { ffi::luaL_ref(self.raw, ffi::LUA_REGISTRYINDEX) })
    }

    pub(crate) fn push_ref(&self, key: c_int) {
        // SAFETY: the registry is always a table; the caller reserved a slot.
        unsafe {
            ffi::lua_rawgeti(self.raw, ffi::LUA_REGISTRYINDEX, ffi::lua_Integer::from(key));
        }
    }

    // Reads.

    pub(crate) fn kind(&self, index: c_int) -> Kind {
        // SAFETY: lua_type accepts any acceptable index.
        Kind::from_lua_type(unsafe { ffi::lua_type(self.raw, index) })
    }

    pub(crate) fn to_number(&self, index: c_int) -> f64 {
        // SAFETY: plain query; a null out-parameter is allowed.
        unsafe { ffi::lua_tonumberx(self.raw, index, ptr::null_mut()) }
    }

    pub(crate) fn to_bool(&self, index: c_int) -> bool {
        // SAFETY: plain query.
        unsafe { ffi::lua_toboolean(self.raw, index) != 0 }
    }

    /// Copy the string at `index`. Numbers are converted in place, so only
    /// call this on slots that are not part of a running traversal.
    pub(crate) fn to_string_lossy(&self, index: c_int) -> String {
        let mut len = 0usize;
        // SAFETY: `len` is a valid out-parameter.
        let data = unsafe { ffi::lua_tolstring(self.raw, index, &mut len) };
        if data.is_null() {
            return String::new();
        }
        // SAFETY: lua_tolstring returned `len` readable bytes that stay valid
        // while the slot is untouched; they are copied immediately.
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
        String::from_utf8_lossy(bytes).into_owned()
    }

    pub(crate) fn to_userdata(&self, index: c_int) -> *mut c_void {
        // SAFETY: plain query; the pointer is not dereferenced here.
        unsafe { ffi::lua_touserdata(self.raw, index) }
    }

    pub(crate) fn to_thread(&self, index: c_int) -> *mut ffi::lua_State {
        // SAFETY: plain query; the pointer is not dereferenced here.
        unsafe { ffi::lua_tothread(self.raw, index) }
    }

    pub(crate) fn to_pointer(&self, index: c_int) -> *const c_void {
        // SAFETY: plain query; the pointer is only used as an identity.
        unsafe { ffi::lua_topointer(self.raw, index) }
    }

    /// The userdata block at `index` if its metatable is `metatable`.
    pub(crate) fn test_userdata(&self, index: c_int, metatable: &CStr) -> *mut c_void {
        // SAFETY: `metatable` is NUL-terminated; the caller reserved the
        // two slots luaL_testudata uses.
        unsafe { ffi::luaL_testudata(self.raw, index, metatable.as_ptr()) }
    }

    // Calls and chunks.

    /// Push the traceback message handler and return its absolute index.
    pub(crate) fn push_message_handler(&self) -> Result<c_int> {
        self.reserve(1)?;
        self.push_cfunction(traceback_handler);
        Ok(self.top())
    }

    /// Protected call of the function below the top `nargs` slots.
    pub(crate) fn protected_call(
        &self,
        nargs: c_int,
        nresults: c_int,
        handler: c_int,
        message: &str,
    ) -> Result<()> {
        // SAFETY: the function and its arguments are in place; errors are
        // caught by lua_pcall and returned as a status.
        let status = unsafe { ffi::lua_pcall(self.raw, nargs, nresults, handler) };
        if status == ffi::LUA_OK {
            Ok(())
        } else {
            Err(LuaError::from_stack(self, status, message).into())
        }
    }

    /// Compile `source` in text mode and push the resulting function.
    pub(crate) fn load_chunk(&self, source: &str) -> Result<()> {
        let name = c_string(&self.interp.config().chunk_name, "chunk name")?;
        self.reserve(1)?;
        // SAFETY: the buffer is read during the call only.
        let status = unsafe {
            ffi::luaL_loadbufferx(
                self.raw,
                source.as_ptr().cast(),
                source.len(),
                name.as_ptr(),
                c"t".as_ptr(),
            )
        };
        if status == ffi::LUA_OK {
            Ok(())
        } else {
            Err(LuaError::from_stack(self, status, "unable to load chunk").into())
        }
    }

    /// Compile the file at `path` and push the resulting function.
    pub(crate) fn load_file(&self, path: &Path) -> Result<()> {
        let path = CString::new(path.as_os_str().as_encoded_bytes()).map_err(|_| {
            TypeError::new("file path", Kind::String).with_detail("path contains a NUL byte")
        })?;
        self.reserve(1)?;
        // SAFETY: `path` is NUL-terminated; mode NULL allows text and binary.
        let status = unsafe { ffi::luaL_loadfilex(self.raw, path.as_ptr(), ptr::null()) };
        if status == ffi::LUA_OK {
            Ok(())
        } else {
            Err(LuaError::from_stack(self, status, "unable to load file").into())
        }
    }

    /// Human-readable dump of every slot, used in error reports.
    pub fn dump(&self) -> String {
        if !self.is_open() {
            return String::from("Stack Dump: (interpreter closed)");
        }
        // SAFETY: the interpreter is open, so `self.raw` is live.
        unsafe { dump_raw(self.raw) }
    }
}

/// A read-only view of one stack slot.
///
/// [`FromLua::accepts`](crate::FromLua::accepts) receives one of these to
/// decide whether a conversion applies without materializing the value.
#[derive(Clone, Copy)]
pub struct Slot<'a> {
    stack: &'a Stack,
    index: c_int,
}

impl Slot<'_> {
    pub fn index(&self) -> c_int {
        self.index
    }

    /// [`Kind::Nil`] once the interpreter is closed.
    pub fn kind(&self) -> Kind {
        if !self.stack.is_open() {
            return Kind::Nil;
        }
        self.stack.kind(self.index)
    }

    /// Nil, or no value at all.
    pub fn is_nil(&self) -> bool {
        self.kind() == Kind::Nil
    }

    /// A number, or a string convertible to one.
    pub fn is_number(&self) -> bool {
        // SAFETY: plain query on an open interpreter.
        self.stack.is_open() && unsafe { ffi::lua_isnumber(self.stack.raw, self.index) != 0 }
    }

    /// A string, or a number (always convertible to a string).
    pub fn is_string(&self) -> bool {
        // SAFETY: plain query on an open interpreter.
        self.stack.is_open() && unsafe { ffi::lua_isstring(self.stack.raw, self.index) != 0 }
    }

    /// A function, or a value whose metatable defines `__call`.
    pub fn is_callable(&self) -> bool {
        self.kind() == Kind::Function || self.has_metafield(c"__call")
    }

    /// Whether the value has a metatable with field `name`.
    pub fn has_metafield(&self, name: &CStr) -> bool {
        self.stack.is_open() && self.stack.has_metafield(self.index, name)
    }

    /// Nil or NaN, which tables reject as keys.
    pub(crate) fn is_invalid_key(&self) -> bool {
        match self.kind() {
            Kind::Nil => true,
            Kind::Number => self.stack.to_number(self.index).is_nan(),
            _ => false,
        }
    }

    pub(crate) fn is_userdata_of(&self, metatable: &CStr) -> bool {
        self.stack.is_open() && !self.stack.test_userdata(self.index, metatable).is_null()
    }
}

pub(crate) fn c_string(text: &str, what: &'static str) -> Result<CString> {
    CString::new(text).map_err(|_| {
        Error::from(TypeError::new(what, Kind::String).with_detail("contains a NUL byte"))
    })
}

/// Dump every slot of `raw`, one line each.
///
/// # Safety
///
/// `raw` must be a live interpreter thread.
pub(crate) unsafe fn dump_raw(raw: *mut ffi::lua_State) -> String {
    let mut out = String::from("Stack Dump:");
    // SAFETY: caller guarantees `raw` is live; every read below is a plain
    // query that cannot raise.
    let top = unsafe { ffi::lua_gettop(raw) };
    for index in 1..=top {
        // SAFETY: `index` is within `1..=top`.
        let kind = Kind::from_lua_type(unsafe { ffi::lua_type(raw, index) });
        let _ = write!(out, "\n  {index}: {}: ", kind.name());
        let _ = match kind {
            Kind::String => {
                let mut len = 0usize;
                // SAFETY: the slot is a string, so lua_tolstring returns
                // `len` readable bytes without converting anything.
                let data = unsafe { ffi::lua_tolstring(raw, index, &mut len) };
                let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
                write!(out, "{:?}", String::from_utf8_lossy(bytes))
            }
            // SAFETY (three arms below): plain queries on an existing slot.
            Kind::Number => write!(out, "{}", value::format_number(unsafe {
                ffi::lua_tonumberx(raw, index, ptr::null_mut())
            })),
            Kind::Boolean => write!(out, "{}", unsafe { ffi::lua_toboolean(raw, index) } != 0),
            Kind::Nil => Ok(()),
            _ => write!(out, "{:p}", unsafe { ffi::lua_topointer(raw, index) }),
        };
    }
    out
}

/// `__gc` for blocks written by [`Stack::push_userdata`].
unsafe extern "C-unwind" fn drop_userdata<T>(state: *mut ffi::lua_State) -> c_int {
    // SAFETY: this metamethod is only attached to blocks holding a `T`, and
    // Lua runs `__gc` once per object.
    let block = unsafe { ffi::lua_touserdata(state, 1) }.cast::<T>();
    if !block.is_null() {
        // SAFETY: the block holds an initialized `T` that nothing reads
        // after its `__gc` runs.
        let dropped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
            ptr::drop_in_place(block);
        }));
        if dropped.is_err() {
            tracing::error!("destructor of a userdata block panicked");
        }
    }
    0
}

/// Message handler for protected calls: append a traceback to the message.
unsafe extern "C-unwind" fn traceback_handler(state: *mut ffi::lua_State) -> c_int {
    // SAFETY: the interpreter calls this with the error object in slot 1.
    // No host value with a destructor is alive in this frame, so an error
    // raised by luaL_traceback may unwind through it.
    unsafe {
        if ffi::lua_isstring(state, 1) == 0 {
            ffi::lua_pushstring(state, c"(error object is not a string)".as_ptr());
            ffi::lua_replace(state, 1);
        }
        let message = ffi::lua_tolstring(state, 1, ptr::null_mut());
        ffi::luaL_traceback(state, state, message, 1);
    }
    1
}
