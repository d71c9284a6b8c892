use thiserror::Error;

use crate::job::JobStatus;

/// Failure talking to the backend. Messages are shown to the user verbatim.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed with status code {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Http(e) if e.is_timeout())
    }
}

/// An operation was requested that the job's current status does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Cannot {action} while {status}")]
    InvalidState {
        action: &'static str,
        status: JobStatus,
    },
}
