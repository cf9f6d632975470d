//! Closed failure taxonomy shared by every directory layer.
//!
//! # Responsibility
//! - Represent every failure the core can observe as one tagged enum.
//! - Keep per-kind payloads (status code, elapsed window, detail) typed.
//!
//! # Invariants
//! - Values are transient: created at the failure site, never stored.
//! - `kind()` is total, so downstream matching stays exhaustive.

use crate::model::draft::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Remote directory operation that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    FetchAll,
    Create,
    Update,
    Delete,
}

impl RemoteOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchAll => "fetch_all",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for RemoteOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure category used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Http,
    Timeout,
    Aborted,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Http => "http",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
            Self::Unknown => "unknown",
        }
    }
}

/// Any failure surfaced by the directory core.
#[derive(Debug)]
pub enum DirectoryError {
    /// Form input failed a local format rule; no request was sent.
    Validation(ValidationError),
    /// Remote answered with a non-2xx status.
    Http {
        operation: RemoteOperation,
        status: u16,
        status_text: String,
        /// Best-effort response body, empty when unreadable.
        body: String,
    },
    /// No response inside the request window; the request was dropped.
    Timeout {
        operation: RemoteOperation,
        after: Duration,
    },
    /// The flow cancelled the operation before it settled.
    Aborted { operation: RemoteOperation },
    /// Transport failure, malformed body, or anything unexpected.
    Unknown {
        operation: RemoteOperation,
        detail: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

impl DirectoryError {
    /// Wraps an arbitrary failure as `Unknown`, keeping it as the source.
    pub fn unknown<E>(operation: RemoteOperation, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Unknown {
            operation,
            detail: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Http { .. } => ErrorKind::Http,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Aborted { .. } => ErrorKind::Aborted,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Operation that failed; `None` for local validation.
    pub fn operation(&self) -> Option<RemoteOperation> {
        match self {
            Self::Validation(_) => None,
            Self::Http { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Aborted { operation }
            | Self::Unknown { operation, .. } => Some(*operation),
        }
    }

    /// HTTP status code when the failure is `Http`.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Http {
                status,
                status_text,
                body,
                ..
            } => {
                write!(f, "{status} {status_text}")?;
                if !body.is_empty() {
                    write!(f, ": {body}")?;
                }
                Ok(())
            }
            Self::Timeout { operation, after } => {
                write!(f, "{operation} timed out after {} ms", after.as_millis())
            }
            Self::Aborted { operation } => write!(f, "{operation} aborted"),
            Self::Unknown {
                operation, detail, ..
            } => write!(f, "{operation} failed: {detail}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Unknown {
                source: Some(err), ..
            } => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<ValidationError> for DirectoryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
