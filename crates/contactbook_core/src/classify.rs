//! Failure classification and presentation policy.
//!
//! # Responsibility
//! - Decide what the user sees for every asynchronous failure.
//! - Decide whether a failure is logged, and log it with metadata only.
//!
//! # Invariants
//! - Initial-load transport failures are fatal to startup.
//! - Background refresh failures never produce a user message.
//! - Write failures are surfaced inline; aborts are neutral notices.

use crate::error::{DirectoryError, ErrorKind};
use log::{debug, error, warn};

const MAX_BODY_CHARS: usize = 200;

/// Where the failure happened; selects the propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// First directory load at startup.
    InitialLoad,
    /// Periodic background refresh.
    Refresh,
    /// Create/update/delete, including the refetch that follows it.
    Write,
}

impl FailureOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialLoad => "initial_load",
            Self::Refresh => "refresh",
            Self::Write => "write",
        }
    }
}

/// How the renderer should present a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Session cannot continue; user is asked to reload.
    Fatal,
    /// Shown next to the form or list that triggered it.
    Inline,
    /// Neutral notice, not styled as an error.
    Notice,
    /// Not shown at all.
    LogOnly,
}

/// Result of classifying one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub origin: FailureOrigin,
    pub presentation: Presentation,
    /// Text for the renderer; `None` when nothing is shown.
    pub user_message: Option<String>,
    /// Whether the failure detail goes to the log.
    pub log: bool,
}

/// Maps a failure and its origin to kind, user message and log policy.
pub fn classify_failure(err: &DirectoryError, origin: FailureOrigin) -> Classification {
    let (kind, base_message, log) = match err {
        DirectoryError::Validation(validation) => {
            (ErrorKind::Validation, validation.to_string(), false)
        }
        DirectoryError::Http {
            status,
            status_text,
            body,
            ..
        } => {
            let mut message = format!("Request failed: {status} {status_text}");
            let body = sanitize_body(body);
            if !body.is_empty() {
                message.push_str(": ");
                message.push_str(&body);
            }
            (ErrorKind::Http, message, true)
        }
        DirectoryError::Timeout { .. } => (
            ErrorKind::Timeout,
            "The request timed out. Please try again.".to_string(),
            true,
        ),
        DirectoryError::Aborted { .. } => {
            (ErrorKind::Aborted, "Request aborted.".to_string(), false)
        }
        DirectoryError::Unknown { .. } => (
            ErrorKind::Unknown,
            "Something went wrong. Please try again.".to_string(),
            true,
        ),
    };

    let (presentation, user_message) = match (origin, kind) {
        (_, ErrorKind::Aborted) if origin != FailureOrigin::Refresh => {
            (Presentation::Notice, Some(base_message))
        }
        (FailureOrigin::Refresh, _) => (Presentation::LogOnly, None),
        (FailureOrigin::InitialLoad, _) => (
            Presentation::Fatal,
            Some(format!(
                "Please reload the page, the directory could not be loaded. {base_message}"
            )),
        ),
        (FailureOrigin::Write, _) => (Presentation::Inline, Some(base_message)),
    };

    Classification {
        kind,
        origin,
        presentation,
        user_message,
        log,
    }
}

/// Writes the log line for a classified failure, if the policy asks for one.
pub fn log_failure(err: &DirectoryError, classification: &Classification) {
    let operation = err.operation().map(|op| op.as_str()).unwrap_or("local");
    if !classification.log {
        debug!(
            "event=failure_classified module=classify status={} kind={} origin={} operation={}",
            presentation_status(classification.presentation),
            classification.kind.as_str(),
            classification.origin.as_str(),
            operation
        );
        return;
    }

    let status_code = err
        .status()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string());
    match classification.presentation {
        Presentation::LogOnly => warn!(
            "event=failure_classified module=classify status=error kind={} origin={} \
             operation={} http_status={} detail={}",
            classification.kind.as_str(),
            classification.origin.as_str(),
            operation,
            status_code,
            sanitize_body(&err.to_string())
        ),
        _ => error!(
            "event=failure_classified module=classify status=error kind={} origin={} \
             operation={} http_status={} detail={}",
            classification.kind.as_str(),
            classification.origin.as_str(),
            operation,
            status_code,
            sanitize_body(&err.to_string())
        ),
    }
}

fn presentation_status(presentation: Presentation) -> &'static str {
    match presentation {
        Presentation::Notice => "notice",
        _ => "error",
    }
}

// Response bodies are untrusted; keep them single-line and short.
fn sanitize_body(value: &str) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let trimmed = normalized.trim();
    let mut truncated = trimmed.chars().take(MAX_BODY_CHARS).collect::<String>();
    if trimmed.chars().count() > MAX_BODY_CHARS {
        truncated.push_str("...");
    }
    truncated
}
