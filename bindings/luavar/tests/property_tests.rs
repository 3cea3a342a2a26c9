//! Property-based tests for the binding.
//!
//! These use proptest to generate random host values, key lineages and
//! operation sequences, and verify:
//! 1. Round-trip: a value written to a path reads back unchanged
//! 2. Lineage purity: building paths never touches the interpreter
//! 3. Stack balance: every operation leaves the stack depth unchanged,
//!    whether it succeeds or fails

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    reason = "Proptest macros generate code with these patterns"
)]

use luavar::{Root, Value};
use proptest::prelude::*;

// -- Strategies --

/// A key a table accepts: a finite number, a string, or a boolean.
fn key_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1000i32..1000).prop_map(Value::from),
        "[a-z_][a-z0-9_]{0,8}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

/// A scalar value of any kind.
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Nil),
        any::<i32>().prop_map(Value::from),
        (-1e12f64..1e12).prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::from),
    ]
}

#[derive(Clone, Debug)]
enum Op {
    Set(String, Value),
    Get(String),
    GetNested(String, String),
    SetNested(String, String, i32),
    Invoke(String),
    Chunk(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let name = "[a-c]";
    prop_oneof![
        (name, scalar_strategy()).prop_map(|(n, v)| Op::Set(n, v)),
        name.prop_map(Op::Get),
        (name, name).prop_map(|(a, b)| Op::GetNested(a, b)),
        (name, name, any::<i32>()).prop_map(|(a, b, v)| Op::SetNested(a, b, v)),
        name.prop_map(Op::Invoke),
        prop_oneof![
            Just(String::from("return 1")),
            Just(String::from("error('x')")),
            Just(String::from("return (")),
            Just(String::from("a = {} b = function() return a end")),
        ]
        .prop_map(Op::Chunk),
    ]
}

fn apply(root: &Root, op: &Op) {
    // Failures are expected here; only the stack depth matters.
    match op {
        Op::Set(name, value) => {
            let _ = root.at(name.as_str()).set(value);
        }
        Op::Get(name) => {
            let _ = root.at(name.as_str()).value();
            let _ = root.at(name.as_str()).is::<i32>();
        }
        Op::GetNested(a, b) => {
            let _ = root.at(a.as_str()).at(b.as_str()).get::<String>();
        }
        Op::SetNested(a, b, v) => {
            let _ = root.at(a.as_str()).at(b.as_str()).set(*v);
        }
        Op::Invoke(name) => {
            let _ = root.at(name.as_str()).invoke::<Value>(());
        }
        Op::Chunk(source) => {
            let _ = root.do_chunk(source);
        }
    }
}

// -- Properties --

proptest! {
    #[test]
    fn integers_round_trip(n in any::<i32>()) {
        let root = Root::new().unwrap();
        root.at("x").set(n).unwrap();
        prop_assert_eq!(root.at("x").get::<i32>().unwrap(), n);
    }

    #[test]
    fn finite_floats_round_trip(n in any::<f64>().prop_filter("finite", |n| n.is_finite())) {
        let root = Root::new().unwrap();
        root.at("x").set(n).unwrap();
        prop_assert_eq!(root.at("x").get::<f64>().unwrap(), n);
    }

    #[test]
    fn strings_round_trip(s in ".{0,64}") {
        let root = Root::new().unwrap();
        root.at("x").set(s.as_str()).unwrap();
        prop_assert_eq!(root.at("x").get::<String>().unwrap(), s);
    }

    #[test]
    fn scalars_round_trip_as_values(value in scalar_strategy()) {
        let root = Root::new().unwrap();
        root.at("x").set(&value).unwrap();
        prop_assert_eq!(root.at("x").value().unwrap(), value);
    }

    #[test]
    fn numbers_never_equal_their_text(n in any::<i32>()) {
        prop_assert_ne!(Value::from(n), Value::from(n.to_string()));
        prop_assert_eq!(Value::from(n), Value::from(f64::from(n)));
    }

    #[test]
    fn building_paths_is_pure(keys in prop::collection::vec(key_strategy(), 1..8)) {
        let root = Root::new().unwrap();
        let mut path = root.at(keys[0].clone());
        for key in &keys[1..] {
            path = path.at(key.clone());
        }
        prop_assert_eq!(root.stack_depth().unwrap(), 0);
        prop_assert_eq!(path.lineage(), keys.as_slice());
    }

    #[test]
    fn operations_keep_the_stack_balanced(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let root = Root::new().unwrap();
        for op in &ops {
            apply(&root, op);
            prop_assert_eq!(root.stack_depth().unwrap(), 0, "after {:?}", op);
        }
    }

    #[test]
    fn nested_tables_round_trip(entries in prop::collection::vec((key_strategy(), any::<i32>()), 0..16)) {
        let root = Root::new().unwrap();
        let table: luavar::Table = entries.iter().cloned().collect();
        root.at("t").set(&table).unwrap();
        for (key, _) in &entries {
            prop_assert_eq!(root.at("t").at(key.clone()).value().unwrap(), table.get(key.clone()).unwrap());
        }
    }
}
