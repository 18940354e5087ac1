//! Error types for the Hopdesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Hop exhaustion and explicit human-handoff requests are deliberately NOT
//! errors — they are expected outcomes, modeled as states in the loop
//! controller and as terminal statuses.

use thiserror::Error;

/// The top-level error type for all Hopdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Plan validation errors ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- External collaborator errors ---
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    // --- Retrieval action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Ticketing system errors ---
    #[error("Ticketing error: {0}")]
    Ticketing(#[from] TicketingError),

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

/// A malformed plan or action, caught before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing required parameter '{parameter}' for action {action}")]
    MissingParameter { action: String, parameter: String },

    #[error("Parameter '{parameter}' for action {action} must be a {expected}")]
    WrongParameterType {
        action: String,
        parameter: String,
        expected: String,
    },

    #[error("Parameter '{parameter}' for action {action} must not be empty")]
    EmptyParameter { action: String, parameter: String },

    #[error("Duplicate hop index {index} (expected {expected})")]
    DuplicateHop { index: usize, expected: usize },
}

/// The pipeline stage an external collaborator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Coverage,
    Draft,
    Validate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Coverage => "coverage",
            Stage::Draft => "draft",
            Stage::Validate => "validate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of an external collaborator (LLM judgment, validation service).
///
/// A timeout is treated identically to a reported failure: the call is over,
/// the stage did not produce a usable result.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{stage} collaborator timed out after {timeout_secs}s")]
    Timeout { stage: Stage, timeout_secs: u64 },

    #[error("{stage} collaborator returned a malformed response: {detail}")]
    MalformedResponse { stage: Stage, detail: String },

    #[error("{stage} collaborator request failed: {message} (status: {status_code})")]
    ApiError {
        stage: Stage,
        status_code: u16,
        message: String,
    },

    #[error("{stage} collaborator network error: {detail}")]
    Network { stage: Stage, detail: String },

    #[error("{stage} collaborator unavailable: {detail}")]
    Unavailable { stage: Stage, detail: String },
}

impl CollaboratorError {
    /// The stage this failure is tagged with.
    pub fn stage(&self) -> Stage {
        match self {
            CollaboratorError::Timeout { stage, .. }
            | CollaboratorError::MalformedResponse { stage, .. }
            | CollaboratorError::ApiError { stage, .. }
            | CollaboratorError::Network { stage, .. }
            | CollaboratorError::Unavailable { stage, .. } => *stage,
        }
    }
}

/// Failure of a single retrieval action during Gather.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("Action not found: {0}")]
    NotFound(String),

    #[error("Action execution failed: {action} — {reason}")]
    ExecutionFailed { action: String, reason: String },

    #[error("Action timed out: {action} after {timeout_secs}s")]
    Timeout { action: String, timeout_secs: u64 },

    #[error("Invalid action arguments: {0}")]
    InvalidArguments(String),
}

/// Failure of a ticketing-system operation (delivery, notes, attributes).
#[derive(Debug, Clone, Error)]
pub enum TicketingError {
    #[error("Message delivery failed for conversation {conversation_id}: {reason}")]
    DeliveryFailed {
        conversation_id: String,
        reason: String,
    },

    #[error("Failed to add note to conversation {conversation_id}: {reason}")]
    NoteFailed {
        conversation_id: String,
        reason: String,
    },

    #[error("Failed to set attribute '{key}' on conversation {conversation_id}: {reason}")]
    AttributeFailed {
        conversation_id: String,
        key: String,
        reason: String,
    },

    #[error("Failed to snooze conversation {conversation_id}: {reason}")]
    SnoozeFailed {
        conversation_id: String,
        reason: String,
    },

    #[error("Ticketing API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Ticketing request timed out: {0}")]
    Timeout(String),

    #[error("Ticketing not configured: {0}")]
    NotConfigured(String),
}
