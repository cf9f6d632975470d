//! Session directory cache.
//!
//! # Responsibility
//! - Hold the full contact set for the session, sorted for display.
//! - Derive the tag vocabulary from the cached contacts.
//!
//! # Invariants
//! - Contacts are ordered by case-folded `full_name`; ties keep input order.
//! - The vocabulary is the sorted union of all contact tags and is rebuilt
//!   on every replacement, never patched.
//! - `replace` swaps one immutable snapshot for another; readers never see a
//!   mix of old and new records.

use crate::model::contact::{Contact, ContactId};
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

/// Explicit not-found signal for id lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookupError {
    NotFound(ContactId),
}

impl Display for CacheLookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "contact not found: {id}"),
        }
    }
}

impl Error for CacheLookupError {}

/// One complete, immutable cache generation.
#[derive(Debug)]
pub struct DirectorySnapshot {
    generation: u64,
    contacts: Arc<[Contact]>,
    tag_vocabulary: Arc<[String]>,
}

impl Default for DirectorySnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            contacts: Arc::from(Vec::new()),
            tag_vocabulary: Arc::from(Vec::new()),
        }
    }
}

impl DirectorySnapshot {
    fn build(generation: u64, mut contacts: Vec<Contact>) -> Self {
        // `sort_by_cached_key` is stable, so equal names keep input order.
        contacts.sort_by_cached_key(|contact| contact.full_name().to_lowercase());
        let tag_vocabulary = contacts
            .iter()
            .flat_map(|contact| contact.tags().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        Self {
            generation,
            contacts: contacts.into(),
            tag_vocabulary: tag_vocabulary.into(),
        }
    }

    /// Monotonic replacement counter; `0` is the empty startup cache.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contacts(&self) -> &Arc<[Contact]> {
        &self.contacts
    }

    pub fn tag_vocabulary(&self) -> &Arc<[String]> {
        &self.tag_vocabulary
    }

    pub fn find_by_id(&self, id: &ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.id() == id)
    }
}

/// Owner of the current directory snapshot.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    current: RwLock<Arc<DirectorySnapshot>>,
}

impl DirectoryCache {
    /// Creates an empty cache (generation `0`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole record set and rebuilds the vocabulary.
    ///
    /// Readers holding the previous snapshot keep it unchanged.
    pub fn replace(&self, contacts: Vec<Contact>) -> Arc<DirectorySnapshot> {
        let count = contacts.len();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(DirectorySnapshot::build(guard.generation + 1, contacts));
        *guard = Arc::clone(&next);
        drop(guard);

        info!(
            "event=cache_replaced module=cache status=ok generation={} contacts={} tags={}",
            next.generation,
            count,
            next.tag_vocabulary.len()
        );
        next
    }

    /// Returns the current snapshot; contacts and vocabulary always agree.
    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the current ordered contacts as an immutable view.
    pub fn all(&self) -> Arc<[Contact]> {
        Arc::clone(self.snapshot().contacts())
    }

    /// Returns the current sorted tag vocabulary.
    pub fn tag_vocabulary(&self) -> Arc<[String]> {
        Arc::clone(self.snapshot().tag_vocabulary())
    }

    /// Looks one contact up by id.
    ///
    /// # Errors
    /// - `CacheLookupError::NotFound` when no cached contact has `id`.
    pub fn find_by_id(&self, id: &ContactId) -> Result<Contact, CacheLookupError> {
        self.snapshot()
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| CacheLookupError::NotFound(id.clone()))
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }
}
