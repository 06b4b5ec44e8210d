//! Core types for the agent protocol.

pub mod message;
pub mod stream;
pub mod tools;

pub use message::*;
pub use stream::*;
pub use tools::*;
