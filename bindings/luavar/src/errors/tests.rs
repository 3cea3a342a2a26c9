#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use pretty_assertions::assert_eq;

use super::*;
use crate::Root;

// -- Display --

#[test]
fn type_error_names_both_kinds() {
    let err = TypeError::new("number", Kind::Table);
    assert_eq!(err.to_string(), "invalid type: expected number, found table");
}

#[test]
fn type_error_appends_detail() {
    let err = TypeError::new("i32", Kind::String).with_detail("\"abc\" is not a number");
    assert_eq!(
        err.to_string(),
        "invalid type: expected i32, found string (\"abc\" is not a number)"
    );
}

#[test]
fn path_error_names_the_prefix() {
    let err = PathError::not_indexable(String::from("_G.a.b"), Kind::Number);
    assert_eq!(err.to_string(), "cannot index a number value at `_G.a.b`");

    let err = PathError::invalid_key(String::from("_G.t[nil]"), Kind::Nil);
    assert_eq!(err.to_string(), "cannot assign through a nil key at `_G.t[nil]`");
}

#[test]
fn invocation_error_names_the_target() {
    let err = InvocationError {
        path: String::from("_G.x"),
        found: Kind::Number,
        stack_dump: String::from("Stack Dump:"),
    };
    assert_eq!(err.to_string(), "tried to invoke a non-function: `_G.x` is a number");
}

#[test]
fn wrapped_errors_are_transparent() {
    let err: Error = TypeError::new("string", Kind::Nil).into();
    assert_eq!(err.to_string(), "invalid type: expected string, found nil");
    assert!(matches!(err, Error::Type(_)));
}

#[test]
fn arity_message() {
    let err = Error::Arity {
        expected: 2,
        got: 3,
    };
    assert_eq!(
        err.to_string(),
        "host function invoked with the wrong number of arguments: expected 2, got 3"
    );
}

// -- Status mapping --

#[test]
fn status_codes_map_to_kinds() {
    assert_eq!(ErrorKind::from_status(ffi::LUA_ERRRUN), ErrorKind::Runtime);
    assert_eq!(ErrorKind::from_status(ffi::LUA_ERRMEM), ErrorKind::Memory);
    assert_eq!(ErrorKind::from_status(ffi::LUA_ERRERR), ErrorKind::MessageHandler);
    assert_eq!(ErrorKind::from_status(ffi::LUA_ERRSYNTAX), ErrorKind::Syntax);
    assert_eq!(ErrorKind::from_status(ffi::LUA_ERRFILE), ErrorKind::File);
}

// -- Capture from the stack --

#[test]
fn lua_error_splits_message_and_traceback() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let _guard = stack.guard();
    stack.push_str("boom\nstack traceback:\n\t[C]: in ?");
    let err = LuaError::from_stack(&stack, ffi::LUA_ERRRUN, "unable to run chunk");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "unable to run chunk");
    assert_eq!(err.lua_message, "boom");
    assert_eq!(err.traceback, "stack traceback:\n\t[C]: in ?");
    assert_eq!(err.to_string(), "unable to run chunk (runtime error): boom");
}

#[test]
fn lua_error_without_traceback_dumps_the_stack() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let _guard = stack.guard();
    stack.push_str("bad syntax");
    let err = LuaError::from_stack(&stack, ffi::LUA_ERRSYNTAX, "unable to load chunk");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.lua_message, "bad syntax");
    assert!(err.traceback.starts_with("Stack Dump:"));
}

#[test]
fn lua_error_with_non_string_object() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let _guard = stack.guard();
    stack.new_table(0, 0);
    let err = LuaError::from_stack(&stack, ffi::LUA_ERRRUN, "error calling lua function");
    assert_eq!(err.lua_message, "(error object is a table value)");
}

#[test]
fn panic_error_captures_message() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let _guard = stack.guard();
    stack.push_str("unprotected");
    // SAFETY: the root keeps the interpreter open.
    let err = unsafe { PanicError::capture(stack.interpreter().raw().unwrap()) };
    assert_eq!(err.message, "unprotected");
    assert!(err.stack_dump.contains("1: string: \"unprotected\""));
    assert!(err.to_string().starts_with("PANIC: unprotected error in call to Lua API"));
}
