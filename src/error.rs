//! Error taxonomy shared by the transport, store and controllers.
use thiserror::Error;

use crate::model::EntityKind;
use crate::schema::ValidationErrors;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("unauthorized; login required")]
    Unauthorized,
    #[error("invalid {entity} response: {reason}")]
    Decode { entity: EntityKind, reason: String },
    #[error("response body is not JSON: {0}")]
    Body(#[from] serde_json::Error),
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("attachment upload failed: {0}")]
    Upload(Box<SyncError>),
    #[error("{entity} is not addressable in {scope}")]
    InvalidScope { entity: EntityKind, scope: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn is_unauthorized(&self) -> bool {
        match self {
            SyncError::Unauthorized => true,
            SyncError::Upload(inner) => inner.is_unauthorized(),
            _ => false,
        }
    }

    /// Turn a 404 on an id-addressed call into `NotFound`.
    pub(crate) fn for_record(self, entity: EntityKind, id: &str) -> Self {
        match self {
            SyncError::Status { status: 404, .. } => SyncError::NotFound {
                entity,
                id: id.to_string(),
            },
            other => other,
        }
    }
}

/// Coarse classification kept in slice state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Status(u16),
    NotFound,
    Decode,
    Validation,
    Upload,
    Other,
}

/// Cloneable record of the last failure a slice saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSnapshot {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for ErrorSnapshot {
    fn from(err: &SyncError) -> Self {
        let kind = match err {
            SyncError::Transport(_) => ErrorKind::Transport,
            SyncError::Status { status, .. } => ErrorKind::Status(*status),
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Decode { .. } | SyncError::Body(_) => ErrorKind::Decode,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Upload(_) => ErrorKind::Upload,
            _ => ErrorKind::Other,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}
