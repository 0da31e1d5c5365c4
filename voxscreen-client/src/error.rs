//! Error types for voxscreen-client
//!
//! Every failure is local to the submission that raised it: nothing here
//! touches stored history or an already displayed result.

use thiserror::Error;
use voxscreen_common::NormalizeError;

/// Generic text shown when the service gave no usable explanation
pub const GENERIC_FAILURE: &str = "An error occurred during analysis";

/// Failures talking to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, timeout, DNS failure...
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx answer; `message` is the service's own text when it sent one
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 2xx answer whose body is not JSON
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Failures while capturing or encoding a recording
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordingError {
    #[error("Recording device error: {0}")]
    Device(String),

    #[error("Failed to encode recording: {0}")]
    Encoding(String),
}

/// Failures of one analysis submission
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// The form already has a request in flight
    #[error("An analysis is already in progress")]
    Busy,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 2xx response without a recognizable verdict
    #[error(transparent)]
    Malformed(#[from] NormalizeError),

    #[error(transparent)]
    Recording(#[from] RecordingError),
}

impl AnalysisError {
    /// Text for the user: the service's own message when available
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Validation(msg) => msg.clone(),
            AnalysisError::Busy => self.to_string(),
            AnalysisError::Transport(TransportError::Rejected { message, .. }) => message.clone(),
            AnalysisError::Recording(err) => err.to_string(),
            AnalysisError::Transport(_) | AnalysisError::Malformed(_) => {
                GENERIC_FAILURE.to_string()
            }
        }
    }
}

impl From<voxscreen_common::Error> for AnalysisError {
    fn from(err: voxscreen_common::Error) -> Self {
        match err {
            voxscreen_common::Error::InvalidInput(msg) => AnalysisError::Validation(msg),
            other => AnalysisError::Validation(other.to_string()),
        }
    }
}

/// Session and registry failures
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,

    #[error("Invalid administrator credentials. Please try again.")]
    InvalidAdminCredentials,

    #[error("Please fill in all fields correctly.")]
    IncompleteForm,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("{0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session storage error: {0}")]
    Store(#[from] voxscreen_common::Error),
}

/// Registry operations can fail on access rules or on the analysis itself
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
