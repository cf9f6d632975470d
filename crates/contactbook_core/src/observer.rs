//! Renderer-facing notification contract.
//!
//! # Responsibility
//! - Define what the core tells the presentation layer and when.
//! - Route classified failures to the log and, by policy, to the renderer.
//!
//! # Invariants
//! - Notifications are sent after the state they describe is committed.
//! - `LogOnly` failures never reach the renderer.

use crate::cache::DirectorySnapshot;
use crate::classify::{classify_failure, log_failure, Classification, FailureOrigin, Presentation};
use crate::error::DirectoryError;
use crate::model::contact::Contact;
use crate::query::FilterCriteria;

/// Callbacks implemented by the renderer. Every method defaults to a no-op.
pub trait DirectoryObserver: Send + Sync {
    /// The cache was replaced; `visible` is recomputed with current criteria.
    fn directory_replaced(&self, _snapshot: &DirectorySnapshot, _visible: &[Contact]) {}

    /// Criteria changed; `visible` reflects the new criteria.
    fn criteria_changed(&self, _criteria: &FilterCriteria, _visible: &[Contact]) {}

    /// A failure the user should see (fatal, inline or notice).
    fn failure_reported(&self, _classification: &Classification) {}

    /// Confirmation text after a successful write.
    fn user_message(&self, _message: &str) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DirectoryObserver for NoopObserver {}

/// Classifies `err`, logs it per policy, and forwards it unless log-only.
pub fn report_failure(
    observer: &dyn DirectoryObserver,
    err: &DirectoryError,
    origin: FailureOrigin,
) -> Classification {
    let classification = classify_failure(err, origin);
    log_failure(err, &classification);
    if classification.presentation != Presentation::LogOnly {
        observer.failure_reported(&classification);
    }
    classification
}
