use serde::Serialize;
use thiserror::Error as ThisError;

/// Every failure the records core can report.
///
/// Serialized with an `error` tag so the presentation layer can show it
/// without knowing the Rust type.
#[derive(Debug, Clone, Serialize, ThisError)]
#[serde(tag = "error")]
pub enum Error {
    #[error("{message}")]
    ValidationError { message: String },
    #[error("{message}")]
    ReferentialError { state_ref: String, message: String },
    #[error("{message}")]
    StepUpRejected { message: String },
    #[error("stored `{key}` collection is corrupt: {message}")]
    DatasetCorrupt { key: String, message: String },
    #[error("value for `{key}` is {size} bytes, store accepts at most {limit}")]
    StoreQuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },
    #[error("{message}")]
    SessionExpired { message: String },
    #[error("{message}")]
    AuthenticationFailure { message: String },
    #[error("student with id `{id}` does not exist")]
    StudentNotFound { id: i64 },
    #[error("{kind}: {message}")]
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Error {
        Error::ValidationError {
            message: msg.into(),
        }
    }

    pub fn session_expired() -> Error {
        Error::SessionExpired {
            message: "Session expired, please log in again".to_string(),
        }
    }

    /// Referential failures are a kind of validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::ValidationError { .. } | Error::ReferentialError { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::InternalError {
            kind: "IOError",
            message: io.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError {
            kind: "SerializationError",
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::InternalError {
            kind: "ImageError",
            message: err.to_string(),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::InternalError {
            kind: "Base64Error",
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::InternalError {
            kind: "TaskJoinError",
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError {
            kind: "Unknown",
            message: format!("{:#}", err),
        }
    }
}
