#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use pretty_assertions::assert_eq;

use super::*;
use crate::Root;

#[test]
fn restores_depth_on_drop() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let before = stack.top();
    {
        let guard = StackGuard::new(&stack);
        assert_eq!(guard.depth(), before);
        stack.push_integer(1);
        stack.push_integer(2);
        assert_eq!(stack.top(), before + 2);
    }
    assert_eq!(stack.top(), before);
}

#[test]
fn nested_guards_restore_their_own_depths() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let outer = StackGuard::new(&stack);
    stack.push_integer(1);
    {
        let inner = StackGuard::new(&stack);
        assert_eq!(inner.depth(), outer.depth() + 1);
        stack.push_integer(2);
        stack.push_integer(3);
    }
    assert_eq!(stack.top(), outer.depth() + 1);
    drop(outer);
    assert_eq!(stack.top(), 0);
}

#[test]
fn keep_top_leaves_exactly_one_value() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let depth = stack.top();
    {
        let mut guard = StackGuard::new(&stack);
        stack.push_str("a");
        stack.push_str("b");
        stack.push_str("kept");
        guard.keep_top();
    }
    assert_eq!(stack.top(), depth + 1);
    assert_eq!(stack.to_string_lossy(-1), "kept");
    stack.pop(1);
}

#[test]
fn keep_top_with_a_single_value() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    {
        let mut guard = stack.guard();
        stack.push_integer(9);
        guard.keep_top();
    }
    assert_eq!(stack.top(), 1);
    assert_eq!(stack.to_number(-1), 9.0);
    stack.pop(1);
}

#[test]
fn keep_top_with_nothing_pushed() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    {
        let mut guard = stack.guard();
        guard.keep_top();
    }
    assert_eq!(stack.top(), 0);
}

#[test]
fn restores_after_early_return() {
    fn fails(stack: &Stack) -> crate::Result<()> {
        let _guard = stack.guard();
        stack.push_integer(1);
        Err(crate::Error::Closed)
    }

    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    assert!(fails(&stack).is_err());
    assert_eq!(stack.top(), 0);
}

#[test]
fn drop_after_close_is_a_no_op() {
    let root = Root::new().unwrap();
    let stack = root.stack().unwrap();
    let guard = stack.guard();
    stack.push_integer(1);
    drop(root);
    assert!(!guard.stack().is_open());
    drop(guard);
}
