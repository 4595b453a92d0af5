//! Core definitions shared between the remote file layer and its backends.
//!
//! The [`RemoteClient`] trait is the narrow set of primitives a remote store exposes.
//! Everything above it (buffered line reading, lifecycle management) lives in the `hfs` crate.

pub mod client;
pub mod error;
pub mod local;
pub mod mem;
pub mod stat;

pub use client::*;
pub use error::*;
pub use stat::*;
