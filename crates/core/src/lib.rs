//! # Deskhand Core
//!
//! Domain types, traits, and error definitions for the deskhand agent
//! execution engine. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod audit;
pub mod backend;
pub mod capability;
pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use audit::{AuditRecord, AuditSink};
pub use backend::{InferenceBackend, InferenceRequest, InferenceUpdate};
pub use capability::{Capability, CapabilityDescriptor, CapabilityRegistry, FailurePayload};
pub use context::ExecutionContext;
pub use error::{CapabilityError, EngineError, Error, InferenceError, Result};
pub use event::StreamEvent;
pub use message::{CapabilityCall, Conversation, ConversationId, Message, Role};
