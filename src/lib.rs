//! # Ctxstack
//!
//! Implicit, per-execution-unit context stacks.
//!
//! Code pushes scoped key-value data (some computed lazily) that is then
//! transparently visible to anything running later in the same logical flow
//! of execution, including work handed off to newly spawned tasks or threads,
//! without explicit parameter threading:
//!
//! - **Frames**: each [`enter`] pushes one frame of data; queries merge the
//!   whole frame chain root-to-top with the most nested entry winning
//! - **Registry**: a process-wide table maps each live execution unit to its
//!   current top frame, with entries reclaimed when the unit terminates even
//!   if it never called [`exit`](ContextHandle::exit)
//! - **Propagation**: [`spawn`] and [`spawn_thread`] seed the new unit with a
//!   snapshot of the caller's context before its body runs
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//!
//! let handle = ctxstack::enter().put("request_id", json!("abc123"));
//! // ...anything on this task now sees request_id via ctxstack::as_map()
//! assert_eq!(ctxstack::as_map()["request_id"], json!("abc123"));
//! handle.exit();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

mod frame;
mod identity;
mod registry;
mod spawn;
mod stack;

pub use frame::{ContextMap, Frame};
pub use identity::UnitId;
pub use registry::Registry;
pub use spawn::{spawn, spawn_thread};
pub use stack::{as_map, enter, exit, read, ContextHandle};
