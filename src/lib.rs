//! Bounded live-instance listing for JVMs debugged over JDWP.
//!
//! The pieces, from the bottom up:
//!
//! - [protocol], [codec] and [client]: just enough of JDWP to find classes,
//!   count and list their instances and suspend or resume the VM.
//! - [session::TargetSession]: what the host reports about a debug session,
//!   and the single query slot every session has.
//! - [counts]: instance counts recorded out of band, with an explicit
//!   "not measured" state.
//! - [query]: listing at most N instances of a type, with truncation
//!   reporting, cancellation and a worker thread to run it on.
//! - [presenter]: the "show instances" actions and the window workflow.
#![deny(missing_debug_implementations)]

extern crate self as jdwp_instances;

pub mod client;
pub mod codec;
pub mod config;
pub mod counts;
pub mod error;
pub mod handle;
pub mod presenter;
pub mod protocol;
pub mod query;
pub mod session;
pub mod vm;

pub(crate) use jdwp_instances_macros::jdwp_command;

pub use error::{Error, Result};
