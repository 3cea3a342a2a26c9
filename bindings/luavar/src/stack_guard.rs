//! RAII depth restoration for the interpreter stack.
//!
//! Every operation that pushes onto the stack holds a [`StackGuard`] for its
//! whole duration. Dropping the guard (normal return, `?` early return, or
//! unwinding) sets the stack back to the depth recorded when it was created.
//!
//! # Keeping one result
//!
//! Pushing the value of a path leaves the intermediate tables of the walk
//! below it. [`StackGuard::keep_top`] asks the guard to keep exactly one
//! value: the current top is moved into the first slot above the recorded
//! depth and everything else is discarded.
//!
//! ```text
//! recorded depth ─┐
//!   before drop:  [..][_G][config][window][width]
//!   after drop:   [..][width]
//! ```

use std::ffi::c_int;

use crate::stack::Stack;

/// Restores the stack depth recorded at creation when dropped.
#[must_use = "the stack is restored when the guard is dropped"]
pub struct StackGuard {
    stack: Stack,
    depth: c_int,
    keep_top: bool,
}

impl StackGuard {
    /// Record the current depth of `stack`. A guard over a closed
    /// interpreter records nothing and does nothing.
    pub fn new(stack: &Stack) -> Self {
        StackGuard {
            stack: stack.share(),
            depth: stack.depth().unwrap_or(0),
            keep_top: false,
        }
    }

    /// The recorded depth.
    pub fn depth(&self) -> c_int {
        self.depth
    }

    /// Keep the current top value as the only survivor above the depth.
    pub fn keep_top(&mut self) {
        self.keep_top = true;
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        // An iterator may hold its guard past the end of the interpreter.
        if !self.stack.is_open() {
            return;
        }
        let top = self.stack.top();
        if self.keep_top && top > self.depth {
            if top > self.depth + 1 {
                self.stack.replace(self.depth + 1);
            }
            self.stack.set_top(self.depth + 1);
        } else if top > self.depth {
            self.stack.set_top(self.depth);
        }
    }
}

#[cfg(test)]
mod tests;
