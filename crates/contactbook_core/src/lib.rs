//! Core domain logic for the contact directory.
//! This crate is the single source of truth for directory invariants.

pub mod cache;
pub mod classify;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod model;
pub mod observer;
pub mod query;
pub mod refresh;
pub mod service;

pub use cache::{CacheLookupError, DirectoryCache, DirectorySnapshot};
pub use classify::{classify_failure, Classification, FailureOrigin, Presentation};
pub use client::{run_abortable, ContactsApi, HttpContactsClient};
pub use config::{ConfigError, DirectoryConfig};
pub use debounce::InputDebouncer;
pub use error::{DirectoryError, DirectoryResult, ErrorKind, RemoteOperation};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::contact::{Contact, ContactId, RawContact};
pub use model::draft::{ContactDraft, ContactPayload, InvalidField, ValidationError};
pub use observer::{report_failure, DirectoryObserver, NoopObserver};
pub use query::{FilterCriteria, QueryEngine};
pub use refresh::{RefreshHandle, RefreshOutcome, RefreshScheduler, RefreshState};
pub use service::directory_core::DirectoryCore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
