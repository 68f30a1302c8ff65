use thiserror::Error;

/// Top-level error type for the triage client.
///
/// Covers every failure the session can surface to the user (capture,
/// attachment, transport, response shape) plus the ambient configuration and
/// I/O failures. `Busy`, `EmptySubmission` and `InvalidTransition` are guard
/// refusals: the controller rejects the action without raising a banner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TriageError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Voice capture is not available on this platform")]
    CaptureUnavailable,

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Attachment rejected: {0}")]
    AttachmentRejected(String),

    #[error("Request timed out after {timeout_ms} ms")]
    TransportTimeout { timeout_ms: u64 },

    #[error("Server rejected the request with status {status}")]
    TransportRejected { status: u16, detail: Option<String> },

    #[error("Server unreachable: {0}")]
    TransportUnreachable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Session is busy")]
    Busy,

    #[error("Nothing to send")]
    EmptySubmission,

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TriageError {
    /// Whether this error is a guard refusal rather than a failure.
    ///
    /// Guard refusals leave session state untouched and are never shown as a
    /// banner.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            TriageError::Busy | TriageError::EmptySubmission | TriageError::InvalidTransition(_)
        )
    }

    /// The single human-readable line shown to the user for this error.
    pub fn banner(&self) -> String {
        match self {
            TriageError::PermissionDenied => {
                "Microphone access was denied. Allow it to use voice input.".to_string()
            }
            TriageError::CaptureUnavailable => {
                "Voice input is not supported here. Please type your message.".to_string()
            }
            TriageError::CaptureError(msg) => format!("Voice input failed: {}", msg),
            TriageError::AttachmentRejected(msg) => format!("Attachment rejected: {}", msg),
            TriageError::TransportTimeout { .. } => {
                "No response from the server (timeout). Please try again.".to_string()
            }
            TriageError::TransportRejected {
                detail: Some(detail),
                ..
            } => detail.clone(),
            TriageError::TransportRejected {
                status,
                detail: None,
            } => format!("The server rejected the request (status {}).", status),
            TriageError::TransportUnreachable(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            TriageError::MalformedResponse(_) => {
                "The server sent a response that could not be understood.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for TriageError {
    fn from(err: toml::de::Error) -> Self {
        TriageError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TriageError {
    fn from(err: toml::ser::Error) -> Self {
        TriageError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;
