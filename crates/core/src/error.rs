//! Error types for the Blockwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is what a build
//! call surfaces to its caller.

use thiserror::Error;

/// The top-level error type for a build request.
#[derive(Debug, Error)]
pub enum Error {
    // --- Orchestration ---
    #[error("No valid plan after {attempts} attempt(s): {reason}")]
    RetryExhausted { attempts: u32, reason: String },

    // --- World mutation ---
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Inputs ---
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] PaletteError),

    #[error("Invalid input: {0}")]
    InvalidBounds(#[from] BoundsError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The planning service could not produce a structurally valid plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("Planning service unavailable: {0}")]
    Unavailable(String),

    #[error("Structured output failed: {0}")]
    MalformedOutput(String),
}

impl From<ProviderError> for PlanningError {
    fn from(err: ProviderError) -> Self {
        PlanningError::Unavailable(err.to_string())
    }
}

/// A drafted plan broke one of the hard constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Plan has too many operations ({actual} > {allowed}).")]
    TooManyOperations { actual: usize, allowed: usize },

    #[error("Operation {index} out of bounds ({x},{y},{z}).")]
    OutOfBounds { index: usize, x: i64, y: i64, z: i64 },

    #[error("Operation {index} uses disallowed material: {material}.")]
    DisallowedMaterial { index: usize, material: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error("Palette material must be a {namespace}:* id, got {input:?}")]
    MissingNamespace { namespace: String, input: String },

    #[error("Palette material has an empty name: {0:?}")]
    EmptyName(String),

    #[error("Palette is empty")]
    Empty,
}

/// Build corners whose span cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("Bounds too large on the {axis} axis: {min}..={max}")]
    SpanOverflow { axis: char, min: i64, max: i64 },
}

/// Failures on the command channel to the world.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Could not connect to world listener at {addr}: {reason}")]
    ConnectionRefused { addr: String, reason: String },

    #[error("Handshake with {addr} failed: expected \"pong\", got {reply}")]
    Handshake { addr: String, reply: String },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Gave up after {attempts} reconnect attempt(s): {last}")]
    ReconnectExhausted { attempts: u32, last: String },

    #[error("No reply within {timeout_secs}s for `{method}`")]
    Timeout { method: String, timeout_secs: u64 },

    #[error("Remote Error: {0}")]
    Remote(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to place {material} at ({x},{y},{z}).")]
    PlacementFailed {
        material: String,
        x: i64,
        y: i64,
        z: i64,
    },

    #[error("Verification failed at ({x},{y},{z}). Expected {expected}, found {found}.")]
    VerificationFailed {
        x: i64,
        y: i64,
        z: i64,
        expected: String,
        found: String,
    },

    #[error("{0}")]
    Transport(#[from] TransportError),
}
