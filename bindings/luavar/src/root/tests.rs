#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::io::Write as _;

use pretty_assertions::assert_eq;

use super::*;
use crate::Error;

#[test]
fn new_root_starts_with_an_empty_stack() {
    let root = Root::new().unwrap();
    assert_eq!(root.stack_depth().unwrap(), 0);
    assert_eq!(root.config(), &RootConfig::default());
}

#[test]
fn std_libs_are_optional() {
    let bare = Root::with_config(RootConfig::new().with_std_libs(false)).unwrap();
    assert!(bare.at("string").value().unwrap().is_nil());
    let full = Root::new().unwrap();
    assert!(full.at("string").is_table());
}

#[test]
fn do_chunk_returns_every_result() {
    let root = Root::new().unwrap();
    let results = root.do_chunk("return 1, 'two', nil, true").unwrap();
    assert_eq!(
        results,
        vec![
            Value::from(1),
            Value::from("two"),
            Value::Nil,
            Value::from(true)
        ]
    );
    assert!(root.do_chunk("local x = 1").unwrap().is_empty());
    assert_eq!(root.stack_depth().unwrap(), 0);
}

#[test]
fn chunk_name_shows_in_errors() {
    let config = RootConfig::new().with_chunk_name("=config.lua");
    let root = Root::with_config(config).unwrap();
    let err = root.do_chunk("error('bad value')").unwrap_err();
    match err {
        Error::Lua(lua) => {
            assert_eq!(lua.message, "unable to run chunk");
            assert_eq!(lua.lua_message, "config.lua:1: bad value");
        }
        other => panic!("expected a Lua error, got {other:?}"),
    }
    assert_eq!(root.stack_depth().unwrap(), 0);
}

#[test]
fn do_file_runs_a_script() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "greeting = 'hi'").unwrap();
    writeln!(file, "return #greeting").unwrap();
    let root = Root::new().unwrap();
    assert_eq!(root.do_file(file.path()).unwrap(), vec![Value::from(2)]);
    assert_eq!(root.at("greeting").get::<String>().unwrap(), "hi");
}

#[test]
fn do_file_missing_is_a_file_error() {
    let root = Root::new().unwrap();
    let err = root.do_file("/no/such/script.lua").unwrap_err();
    assert!(matches!(
        err,
        Error::Lua(crate::LuaError { kind: crate::ErrorKind::File, .. })
    ));
}

#[test]
fn instances_are_independent() {
    let first = Root::new().unwrap();
    let second = Root::new().unwrap();
    first.at("x").set(1).unwrap();
    assert!(second.at("x").value().unwrap().is_nil());
}

#[test]
fn values_copy_between_instances() {
    let first = Root::new().unwrap();
    let second = Root::new().unwrap();
    first.at("t").set([("k", "v")]).unwrap();
    second.at("t").set(first.at("t")).unwrap();
    assert_eq!(second.at("t").at("k").get::<String>().unwrap(), "v");
}

#[test]
fn functions_do_not_cross_instances() {
    let first = Root::new().unwrap();
    let second = Root::new().unwrap();
    first.do_chunk("function f() end").unwrap();
    let f = first.at("f").value().unwrap();
    assert!(matches!(second.at("f").set(f), Err(Error::Type(_))));
    assert_eq!(second.stack_depth().unwrap(), 0);
}

#[test]
fn references_released_after_close_are_harmless() {
    let root = Root::new().unwrap();
    root.do_chunk("function f() end").unwrap();
    let f = root.at("f").value().unwrap();
    drop(root);
    drop(f);
}

#[test]
fn debug_shows_state() {
    let root = Root::new().unwrap();
    assert!(format!("{root:?}").contains("open: true"));
}
