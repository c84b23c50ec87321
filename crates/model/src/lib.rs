//! The protocol between the chat loop and a streaming completion API.
//!
//! This crate establishes an unified shape for requests sent to a hosted
//! model and for the partial response fragments streamed back from it, so
//! that the core never depends on a concrete HTTP client.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
