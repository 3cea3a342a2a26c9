#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::collections::hash_map::DefaultHasher;

use pretty_assertions::assert_eq;

use super::*;
use crate::{FromLua, Root};

fn hash_of(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

// -- Equality --

#[test]
fn numbers_compare_by_value() {
    assert_eq!(Value::from(10), Value::from(10.0));
    assert_eq!(Value::from(0.0), Value::from(-0.0));
    assert_ne!(Value::from(1), Value::from(2));
}

#[test]
fn different_kinds_are_never_equal() {
    assert_ne!(Value::from(10), Value::from("10"));
    assert_ne!(Value::from(0), Value::nil());
    assert_ne!(Value::from(false), Value::nil());
    assert_ne!(Value::from("x"), Value::chunk("x"));
}

#[test]
fn tables_compare_by_identity() {
    let a = Table::new();
    let b = Table::new();
    assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
    assert_ne!(Value::from(a), Value::from(b));
}

#[test]
fn hash_agrees_with_equality() {
    assert_eq!(hash_of(&Value::from(3)), hash_of(&Value::from(3.0)));
    assert_eq!(hash_of(&Value::from(0.0)), hash_of(&Value::from(-0.0)));
    assert_eq!(hash_of(&Value::from("k")), hash_of(&Value::from(String::from("k"))));
}

#[test]
fn nil_and_nan_are_invalid_keys() {
    assert!(!Value::nil().is_valid_key());
    assert!(!Value::from(f64::NAN).is_valid_key());
    assert!(Value::from(0).is_valid_key());
    assert!(Value::from("").is_valid_key());
}

#[test]
fn option_maps_none_to_nil() {
    assert_eq!(Value::from(None::<i32>), Value::Nil);
    assert_eq!(Value::from(Some("x")), Value::from("x"));
}

// -- Formatting --

#[test]
fn format_number_cases() {
    assert_eq!(format_number(3.0), "3");
    assert_eq!(format_number(-7.0), "-7");
    assert_eq!(format_number(2.5), "2.5");
    assert_eq!(format_number(f64::INFINITY), "inf");
    assert_eq!(format_number(f64::NEG_INFINITY), "-inf");
    assert_eq!(format_number(f64::NAN), "nan");
}

#[test]
fn parse_number_cases() {
    assert_eq!(parse_number(" 42 "), Some(42.0));
    assert_eq!(parse_number("1e3"), Some(1000.0));
    assert_eq!(parse_number("-0.5"), Some(-0.5));
    assert_eq!(parse_number("0x1F"), Some(31.0));
    assert_eq!(parse_number("-0x10"), Some(-16.0));
    assert_eq!(parse_number("abc"), None);
    assert_eq!(parse_number("inf"), None);
    assert_eq!(parse_number("nan"), None);
    assert_eq!(parse_number(""), None);
}

#[test]
fn display_matches_script_tostring_for_scalars() {
    assert_eq!(Value::nil().to_string(), "nil");
    assert_eq!(Value::from(true).to_string(), "true");
    assert_eq!(Value::from(12).to_string(), "12");
    assert_eq!(Value::from("hi").to_string(), "hi");
}

#[test]
fn kind_names() {
    assert_eq!(Value::nil().kind().name(), "nil");
    assert_eq!(Value::table([(1, 2)]).kind(), Kind::Table);
    assert_eq!(Value::pointer(std::ptr::null_mut::<u8>()).kind(), Kind::LightPointer);
    assert_eq!(Kind::UserData.to_string(), "userdata");
}

// -- Host tables --

#[test]
fn table_clones_share_entries() {
    let table = Table::new();
    let alias = table.clone();
    alias.insert("k", 1);
    assert_eq!(table.get("k"), Some(Value::from(1)));
    assert_eq!(table.len(), 1);
    assert!(table.ptr_eq(&alias));
}

#[test]
fn sequence_stops_at_first_gap() {
    let table: Table = [(1, "a"), (2, "b"), (4, "d")].into_iter().collect();
    assert_eq!(table.sequence(), vec![Value::from("a"), Value::from("b")]);
}

#[test]
fn clear_breaks_a_self_cycle() {
    let table = Table::new();
    table.insert("self", table.clone());
    assert!(table.contains_key("self"));
    table.clear();
    assert!(table.is_empty());
}

// -- Transfer --

#[test]
fn scalars_survive_a_push_and_read() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let _guard = stack.guard();
    for value in [
        Value::nil(),
        Value::from(1.5),
        Value::from(-3),
        Value::from(true),
        Value::from("text"),
    ] {
        push_value(&value, &stack).unwrap();
        assert_eq!(read_value(&stack, -1).unwrap(), value);
        stack.pop(1);
    }
}

#[test]
fn nested_tables_copy_out() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let _guard = stack.guard();
    let inner = Value::table([("x", 1)]);
    let outer = Value::table([("inner", inner)]);
    push_value(&outer, &stack).unwrap();
    let copy = read_value(&stack, -1).unwrap();
    let copied_inner = copy.as_table().unwrap().get("inner").unwrap();
    assert_eq!(copied_inner.as_table().unwrap().get("x"), Some(Value::from(1)));
    // A fresh host table, not the pushed one.
    assert_ne!(copy, outer);
}

#[test]
fn self_referencing_host_table_pushes_once() {
    let root = Root::new().unwrap();
    let table = Table::new();
    table.insert("me", table.clone());
    root.at("t").set(&table).unwrap();
    let same: bool = {
        let results = root.do_chunk("return t.me == t").unwrap();
        bool::from_value(results[0].clone()).unwrap()
    };
    assert!(same);
    table.clear();
}

#[test]
fn interpreter_cycles_map_onto_one_host_table() {
    let root = Root::new().unwrap();
    let results = root.do_chunk("local t = {} t.me = t return t").unwrap();
    let table = results[0].as_table().unwrap().clone();
    let me = table.get("me").unwrap();
    assert!(me.as_table().unwrap().ptr_eq(&table));
    table.clear();
}

#[test]
fn invalid_keys_are_skipped_on_push() {
    let root = Root::new().unwrap();
    let table = Table::new();
    table.insert("ok", 1);
    table.insert(f64::NAN, 2);
    root.at("t").set(&table).unwrap();
    let count: i32 = root
        .do_chunk("local n = 0 for _ in pairs(t) do n = n + 1 end return n")
        .unwrap()[0]
        .as_number()
        .unwrap() as i32;
    assert_eq!(count, 1);
}

#[test]
fn chunks_compile_when_pushed() {
    let root = Root::new().unwrap();
    root.at("f").set(Value::chunk("return 5")).unwrap();
    assert_eq!(root.at("f").invoke::<i32>(()).unwrap(), 5);
}

#[test]
fn functions_read_as_pinned_references() {
    let root = Root::new().unwrap();
    root.do_chunk("function g() end").unwrap();
    let first = root.at("g").value().unwrap();
    let second = root.at("g").value().unwrap();
    assert_eq!(first.kind(), Kind::Function);
    assert_eq!(first, second);
}

#[test]
fn thread_handles_keep_coroutines_alive() {
    let root = Root::new().unwrap();
    root.do_chunk("co = coroutine.create(function(a) local b = coroutine.yield(a + 1) return b * 2 end)")
        .unwrap();
    let thread: Thread = root.at("co").get().unwrap();
    root.do_chunk("co = nil collectgarbage() collectgarbage()").unwrap();

    root.at("co2").set(&thread).unwrap();
    root.do_chunk("collectgarbage()").unwrap();
    let resumed = root
        .do_chunk("local _, x = coroutine.resume(co2, 4) local _, y = coroutine.resume(co2, 5) return x, y")
        .unwrap();
    assert_eq!(resumed, vec![Value::from(5), Value::from(10)]);
    assert_eq!(root.at("co2").get::<Thread>().unwrap(), thread);
    assert_eq!(root.stack_depth().unwrap(), 0);
}

#[test]
fn threads_stay_in_their_interpreter() {
    let first = Root::new().unwrap();
    let second = Root::new().unwrap();
    first.do_chunk("co = coroutine.create(function() end)").unwrap();
    let thread: Thread = first.at("co").get().unwrap();
    let err = second.at("co").set(&thread).unwrap_err();
    assert!(matches!(err, crate::Error::Type(_)), "got {err:?}");
}

#[test]
fn deep_host_nesting_pushes() {
    let root = Root::new().unwrap();
    let mut value = Value::from("leaf");
    for _ in 0..150 {
        value = Value::table([(1, value)]);
    }
    root.at("deep").set(&value).unwrap();
    assert!(root.at("deep").is_table());
}
