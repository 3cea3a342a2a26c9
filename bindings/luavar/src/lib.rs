//! Typed, lazily-evaluated paths into an embedded Lua 5.4 interpreter.
//!
//! `luavar` sits on top of the raw Lua C API and lets host code read, write
//! and call values inside the interpreter's global namespace with ordinary
//! Rust types, without hand-written stack juggling at every call site.
//!
//! # Architecture
//!
//! ```text
//! Root ──at(key)──▶ Var ──at(key)──▶ Var ...        (no interpreter work)
//!                    │
//!                    ├─ value / get / is / get_or    read
//!                    ├─ set / create                 write
//!                    ├─ call / invoke                protected call
//!                    ├─ do_chunk / do_file           compile + run + assign
//!                    └─ pairs                        iteration
//!                              │
//!                              ▼
//!            StackGuard ─▶ push lineage ─▶ one C API op ─▶ guard drops
//! ```
//!
//! - [`Value`] is the tagged host copy of any interpreter value.
//! - [`Var`] is a path (root plus key lineage) that is realized only when an
//!   operation needs it.
//! - [`IntoLua`] / [`FromLua`] and their multi-value forms move host types
//!   across the stack; [`HostFunction`] exposes closures to scripts.
//! - [`UserData`] exports host objects with per-type metatables.
//!
//! Every operation restores the interpreter stack to the depth it found it
//! at, on success and on error.
//!
//! # Threading
//!
//! Handles are `Rc`-based. One interpreter belongs to one thread; the type
//! system rejects sharing it.

#![allow(
    unsafe_code,
    reason = "the crate is the safe boundary over the Lua C API"
)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    reason = "the C API counts in c_int and stores numbers as f64; conversions follow Lua's own rules"
)]

mod config;
mod errors;
mod marshal;
mod native_stack;
mod root;
mod stack;
mod stack_guard;
mod state;
mod userdata;
mod value;
mod var;

use std::sync::Once;

pub use config::RootConfig;
pub use errors::{
    Error, ErrorKind, InvocationError, LuaError, PanicError, PathError, Result, TypeError,
};
pub use marshal::{FromLua, FromLuaMulti, HostFunction, IntoLua, IntoLuaMulti, Variadic};
pub use root::Root;
pub use stack::{Slot, Stack};
pub use stack_guard::StackGuard;
pub use userdata::{AnyUserData, UserData, UserDataMethods, UserDataRef};
pub use value::{Function, Kind, Reference, Table, Thread, Value};
pub use var::{Pairs, Var};

/// Re-export of the raw C API for callers that push native functions.
pub use mlua_sys as ffi;

static TRACING_INIT: Once = Once::new();

/// Initialize the tracing subscriber for debug output.
///
/// Does nothing unless `RUST_LOG` is set, e.g. `RUST_LOG=luavar=trace`.
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
