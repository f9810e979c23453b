//! Streaming inference client for deskhand.
//!
//! Sends assembled messages plus the capability manifest to a
//! chat-completion endpoint and turns its newline-delimited JSON response
//! into typed updates. The line decoder and chunk assembler are independent
//! of the transport so parsing can be tested with arbitrarily fragmented
//! input.

pub mod client;
pub mod decode;

pub use client::{HttpInferenceClient, StreamAssembler};
pub use decode::LineBuffer;
