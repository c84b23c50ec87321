//! An interactive terminal chat with a traced, tool-using model.
//!
//! The binary wires the pieces together: configuration from the
//! environment, a colored console, a spinner while the model thinks, and a
//! handful of built-in tools. Each piece is exposed here so it can be reused
//! by other front ends.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod config;
pub mod console;
#[cfg(feature = "cli")]
pub mod spinner;
pub mod tools;

/// Re-exports of [`loupe_core`] crate.
pub mod core {
    pub use loupe_core::*;
}
