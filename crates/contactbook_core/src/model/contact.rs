//! Contact domain model.
//!
//! # Responsibility
//! - Define the canonical contact record held by the directory cache.
//! - Normalize raw service records (comma-separated tags, blank optionals).
//!
//! # Invariants
//! - `tags` holds lowercase, trimmed, non-empty, unique values.
//! - A `Contact` is never mutated after construction; edits produce a new
//!   value that replaces the old one on the next cache replacement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Stable identifier assigned by the remote service.
///
/// The service usually hands out integers, but the id is opaque to the core,
/// so textual ids are preserved as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    Number(u64),
    Text(String),
}

impl Display for ContactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl FromStr for ContactId {
    type Err = std::convert::Infallible;

    /// Parses an id forwarded by the renderer (e.g. a data attribute).
    ///
    /// Digit-only input maps to `Number` so it compares equal to ids decoded
    /// from JSON numbers.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Ok(match trimmed.parse::<u64>() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Text(trimmed.to_string()),
        })
    }
}

impl From<u64> for ContactId {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// Contact record exactly as the remote service returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContact {
    pub id: ContactId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Comma-separated tag list, `null` when the contact has no tags.
    #[serde(default)]
    pub tags: Option<String>,
}

/// Canonical, immutable directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    id: ContactId,
    full_name: String,
    email: Option<String>,
    phone_number: Option<String>,
    tags: BTreeSet<String>,
}

impl Contact {
    /// Builds a contact from explicit parts, normalizing optionals and tags.
    pub fn new<I, S>(
        id: ContactId,
        full_name: impl Into<String>,
        email: Option<String>,
        phone_number: Option<String>,
        tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            full_name: full_name.into(),
            email: non_blank(email),
            phone_number: non_blank(phone_number),
            tags: normalize_tags(tags),
        }
    }

    /// Normalizes one record returned by the remote service.
    pub fn from_raw(raw: RawContact) -> Self {
        let tags = parse_tag_list(raw.tags.as_deref());
        Self {
            id: raw.id,
            full_name: raw.full_name.unwrap_or_default(),
            email: non_blank(raw.email),
            phone_number: non_blank(raw.phone_number),
            tags,
        }
    }

    pub fn id(&self) -> &ContactId {
        &self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Sorted, deduplicated lowercase tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns whether the case-folded name contains `folded_needle`.
    ///
    /// Callers fold the needle once per query instead of once per contact.
    pub fn matches_name(&self, folded_needle: &str) -> bool {
        folded_needle.is_empty() || self.full_name.to_lowercase().contains(folded_needle)
    }

    /// Returns whether this contact shares at least one tag with `selected`.
    pub fn matches_any_tag(&self, selected: &BTreeSet<String>) -> bool {
        self.tags.iter().any(|tag| selected.contains(tag))
    }
}

/// Normalizes one tag value: trimmed and lowercased, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .collect()
}

/// Splits the wire `tags` field (`"work,friend"`) into a normalized set.
pub fn parse_tag_list(value: Option<&str>) -> BTreeSet<String> {
    match value {
        Some(list) => normalize_tags(list.split(',')),
        None => BTreeSet::new(),
    }
}

/// Joins tags into the wire representation, `None` for an empty set.
pub fn join_tag_list(tags: &BTreeSet<String>) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.iter().cloned().collect::<Vec<_>>().join(","))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
