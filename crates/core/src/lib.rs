//! Core logic of the chat: message history, response streaming, tool
//! execution and the conversation loop.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod chat;
pub mod conversation;
mod error;
mod model_client;
pub mod output;
pub mod stream;
#[cfg(test)]
mod testing;
pub mod tool;

pub use chat::{Chat, ChatBuilder, InputSource};
pub use error::Error;
pub use model_client::ChunkStream;
