use thiserror::Error;

/// Failures reported by a policy store backend
///
/// `NotFound` and `AlreadyExists` are expected outcomes when another process
/// edits the same store; callers treat them as values, not invariant breaks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The host refused to modify (or read) the firewall policy
    #[error("access denied by the firewall policy store")]
    PermissionDenied,

    #[error("no rule named '{0}'")]
    NotFound(String),

    #[error("a rule named '{0}' already exists")]
    AlreadyExists(String),

    /// Any other host failure, with the host's own code when it reported one
    #[error("{message}")]
    Unknown {
        code: Option<String>,
        message: String,
    },
}

impl StoreError {
    pub fn unknown(message: impl Into<String>) -> Self {
        StoreError::Unknown {
            code: None,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied,
            _ => StoreError::unknown(format!("I/O error: {e}")),
        }
    }
}

/// Core error types for NetBlocker
#[derive(Debug, Error)]
pub enum Error {
    /// Host denied policy modification
    #[error("Access denied: administrator rights are required to change firewall rules")]
    PermissionDenied,

    /// Target rule absent on delete/enable/disable/direction change
    #[error("Rule not found: {0}")]
    NotFound(String),

    /// Target rule present on create when duplicates are rejected
    #[error("Rule already exists: {0}")]
    AlreadyExists(String),

    /// Application path rejected before any store call
    #[error("Invalid application path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Rule field rejected by the validators
    #[error("Invalid rule field {field}: {message}")]
    InvalidRule { field: String, message: String },

    /// Unclassified host failure
    #[error("Firewall error: {message}")]
    Host {
        code: Option<String>,
        message: String,
    },

    /// Direction change deleted the rule, failed to recreate it, and failed to
    /// put the original back
    #[error(
        "Direction change for '{name}' left no rule in place: {cause}; restoring the original failed: {compensation}"
    )]
    PartialFailure {
        name: String,
        cause: Box<Error>,
        compensation: Box<Error>,
    },

    /// I/O operation failed outside a store backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PermissionDenied => Error::PermissionDenied,
            StoreError::NotFound(name) => Error::NotFound(name),
            StoreError::AlreadyExists(name) => Error::AlreadyExists(name),
            StoreError::Unknown { code, message } => Error::Host { code, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
