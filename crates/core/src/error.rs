//! Error types for the deskhand domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all deskhand operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Inference errors ---
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    // --- Capability errors ---
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the streaming inference client.
///
/// These are the only faults that may legitimately escape a run: a
/// partially-streamed response from a non-idempotent endpoint must not be
/// silently retried.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by endpoint, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed stream chunk: {reason}: {line}")]
    MalformedChunk { line: String, reason: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised inside a capability's effect function.
///
/// These never cross the engine boundary — the registry converts every
/// variant into a structured failure payload returned as the observation.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Unknown capability: {0}")]
    NotFound(String),

    #[error("Invalid capability input: {0}")]
    InvalidInput(String),

    #[error("Capability execution failed: {capability} — {reason}")]
    ExecutionFailed { capability: String, reason: String },

    #[error("Sandbox limit exceeded: {0}")]
    SandboxLimit(String),
}

/// Errors from the agent execution loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Prompt assembly failed: {message}")]
    Assembly { message: String },
}
