//! Error types for Posecast

use thiserror::Error;

/// Result type alias using Posecast's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Posecast error types with helpful messages and suggestions
///
/// A dropped telemetry send is not an error; see
/// [`SendOutcome::Skipped`](crate::transport::SendOutcome::Skipped).
#[derive(Error, Debug)]
pub enum Error {
    // Tracking errors (E001-E099)
    #[error("Tracking unavailable: {0}")]
    TrackingUnavailable(String),

    #[error("Anchor creation failed: {0}. Issue another placement gesture to retry.")]
    AnchorCreationFailed(String),

    #[error("Reference space '{0}' could not be negotiated")]
    ReferenceSpace(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check that the collector is reachable.")]
    Network(#[from] reqwest::Error),

    #[error("Collector rejected report with HTTP {0}")]
    Http(u16),

    #[error("Transport failed: {0}")]
    TransportFailed(String),

    // Authentication errors (E200-E299)
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Malformed send request: {0}")]
    MalformedRequest(String),

    // Session errors (E300-E399)
    #[error("Session {0} has already ended")]
    SessionEnded(uuid::Uuid),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::TrackingUnavailable(_) => "E001",
            Self::AnchorCreationFailed(_) => "E002",
            Self::ReferenceSpace(_) => "E003",
            Self::Network(_) => "E100",
            Self::Http(_) => "E101",
            Self::TransportFailed(_) => "E102",
            Self::Signing(_) => "E200",
            Self::MalformedRequest(_) => "E201",
            Self::SessionEnded(_) => "E300",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Network(_) => Some("posecast config get telemetry.endpoint".to_string()),
            Self::Http(403) => Some("Check the `secret` query parameter or POSECAST_SHARED_SECRET".to_string()),
            Self::Config(_) => Some("posecast config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error is a broken internal invariant rather than a runtime condition
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::MalformedRequest(_))
    }
}
