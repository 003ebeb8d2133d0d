//! Error types for Agent Host.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Key-value store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Client-side validation failures. These never reach a relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Agent name must not be empty")]
    EmptyAgentName,

    #[error("Agent name is longer than {max} characters")]
    AgentNameTooLong { max: usize },

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Unknown personality round: {0}")]
    UnknownRound(u8),

    #[error("Round {round} expects a {expected} pick")]
    PickKindMismatch { round: u8, expected: &'static str },

    #[error("Level {0} is outside 1..=5")]
    LevelOutOfRange(u8),

    #[error("Step {target} is outside 0..{total}")]
    StepOutOfRange { target: usize, total: usize },

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Conversation is not accepting input right now")]
    ConversationClosed,

    #[error("A request is already in flight")]
    RequestInFlight,

    #[error("Personality picker cannot {action} in its current phase")]
    PickerPhase { action: &'static str },

    #[error("A completed payment is required before finishing onboarding")]
    PaymentRequired,

    #[error("Onboarding is already complete")]
    Finalized,
}

/// Failures at the relay-client boundary.
///
/// Everything the UI needs to know is whether to offer "retry" or
/// "return home"; see [`RelayError::is_not_found`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Relay request failed: {0}")]
    Network(String),

    #[error("Relay returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Relay rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed relay response: {0}")]
    Malformed(String),

    #[error("Not found")]
    NotFound,

    #[error("Relay request timed out after {0:?}")]
    Timeout(Duration),
}

impl RelayError {
    /// Generic text shown to the end user for any relay failure.
    pub const USER_MESSAGE: &'static str = "Something went wrong. Try again or skip this step.";

    /// Whether the failure means the requested resource does not exist
    /// (as opposed to a transient failure worth retrying).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Payment-provider errors (proxy side).
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Checkout session not found")]
    NotFound,

    #[error("Payment provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Payment provider request failed: {0}")]
    Network(String),

    #[error("Invalid response from payment provider: {0}")]
    InvalidResponse(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
