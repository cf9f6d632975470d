//! Filter criteria and visible-set computation.
//!
//! # Responsibility
//! - Own the current search criteria (name substring + selected tags).
//! - Compute the visible subset of the cache for the renderer.
//!
//! # Invariants
//! - Empty name and empty tag set impose no filter.
//! - Name and tag dimensions compose with AND; tags match with OR.
//! - Filtering keeps cache order.
//! - A visible set is always computed from one cache snapshot and one
//!   criteria value read together.

use crate::cache::{DirectoryCache, DirectorySnapshot};
use crate::model::contact::{normalize_tag, normalize_tags, Contact};
use log::debug;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Current search state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    name_substring: String,
    selected_tags: BTreeSet<String>,
}

impl FilterCriteria {
    /// Unfiltered criteria.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_substring(mut self, text: impl Into<String>) -> Self {
        self.name_substring = text.into();
        self
    }

    pub fn with_selected_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected_tags = normalize_tags(tags);
        self
    }

    pub fn name_substring(&self) -> &str {
        &self.name_substring
    }

    pub fn selected_tags(&self) -> &BTreeSet<String> {
        &self.selected_tags
    }

    /// Returns whether no filter dimension is active.
    pub fn is_unfiltered(&self) -> bool {
        self.name_substring.is_empty() && self.selected_tags.is_empty()
    }

    /// Applies these criteria to an ordered contact slice.
    pub fn apply(&self, contacts: &[Contact]) -> Vec<Contact> {
        let folded = self.name_substring.to_lowercase();
        contacts
            .iter()
            .filter(|contact| contact.matches_name(&folded))
            .filter(|contact| {
                self.selected_tags.is_empty() || contact.matches_any_tag(&self.selected_tags)
            })
            .cloned()
            .collect()
    }
}

struct Memo {
    generation: u64,
    revision: u64,
    visible: Arc<[Contact]>,
}

struct QueryState {
    criteria: FilterCriteria,
    revision: u64,
    memo: Option<Memo>,
}

/// Combines the directory cache with the current criteria.
pub struct QueryEngine {
    cache: Arc<DirectoryCache>,
    state: Mutex<QueryState>,
}

impl QueryEngine {
    pub fn new(cache: Arc<DirectoryCache>) -> Self {
        Self {
            cache,
            state: Mutex::new(QueryState {
                criteria: FilterCriteria::new(),
                revision: 0,
                memo: None,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    /// Returns a copy of the current criteria.
    pub fn criteria(&self) -> FilterCriteria {
        self.lock_state().criteria.clone()
    }

    /// Sets the free-text name filter. Returns whether the criteria changed.
    pub fn set_name_substring(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.mutate(|criteria| {
            if criteria.name_substring == text {
                return false;
            }
            criteria.name_substring = text;
            true
        })
    }

    /// Replaces the selected tag set. Returns whether the criteria changed.
    pub fn set_selected_tags<I, S>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tags(tags);
        self.mutate(|criteria| {
            if criteria.selected_tags == tags {
                return false;
            }
            criteria.selected_tags = tags;
            true
        })
    }

    /// Adds or removes one tag, the way a checkbox change reports it.
    pub fn toggle_tag(&self, tag: &str, checked: bool) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        self.mutate(|criteria| {
            if checked {
                criteria.selected_tags.insert(tag)
            } else {
                criteria.selected_tags.remove(&tag)
            }
        })
    }

    /// Restores unfiltered criteria.
    pub fn reset(&self) -> bool {
        self.mutate(|criteria| {
            if criteria.is_unfiltered() {
                return false;
            }
            *criteria = FilterCriteria::new();
            true
        })
    }

    /// Returns the contacts matching the current criteria, in cache order.
    ///
    /// The result is memoized until either the criteria or the cache change.
    pub fn visible_contacts(&self) -> Arc<[Contact]> {
        let mut state = self.lock_state();
        self.visible_locked(&mut state)
    }

    /// Returns the criteria together with the visible set they produced.
    ///
    /// Both are read under one lock, so a concurrent criteria change can
    /// never pair one value's criteria with another value's contacts.
    pub fn view(&self) -> (FilterCriteria, Arc<[Contact]>) {
        let mut state = self.lock_state();
        let visible = self.visible_locked(&mut state);
        (state.criteria.clone(), visible)
    }

    fn visible_locked(&self, state: &mut QueryState) -> Arc<[Contact]> {
        let snapshot = self.cache.snapshot();

        if let Some(memo) = state.memo.as_ref() {
            if memo.generation == snapshot.generation() && memo.revision == state.revision {
                return Arc::clone(&memo.visible);
            }
        }

        let visible = compute_visible(&state.criteria, &snapshot);
        debug!(
            "event=visible_recomputed module=query status=ok generation={} revision={} \
             total={} visible={}",
            snapshot.generation(),
            state.revision,
            snapshot.contacts().len(),
            visible.len()
        );
        state.memo = Some(Memo {
            generation: snapshot.generation(),
            revision: state.revision,
            visible: Arc::clone(&visible),
        });
        visible
    }

    fn mutate(&self, apply: impl FnOnce(&mut FilterCriteria) -> bool) -> bool {
        let mut state = self.lock_state();
        let changed = apply(&mut state.criteria);
        if changed {
            state.revision += 1;
            state.memo = None;
        }
        changed
    }

    fn lock_state(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn compute_visible(criteria: &FilterCriteria, snapshot: &DirectorySnapshot) -> Arc<[Contact]> {
    if criteria.is_unfiltered() {
        return Arc::clone(snapshot.contacts());
    }
    criteria.apply(snapshot.contacts()).into()
}
