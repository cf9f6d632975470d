//! Contact form payload and local validation.
//!
//! # Responsibility
//! - Turn raw form input into a normalized `ContactDraft`.
//! - Enforce field format rules before any write reaches the network.
//! - Produce the JSON body sent to the remote service.
//!
//! # Invariants
//! - Validation reports every invalid field at once, never just the first.
//! - Optional fields that are blank after trimming are treated as absent.

use crate::model::contact::{join_tag_list, normalize_tag, normalize_tags, ContactId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;
const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z .'-]*[A-Za-z]$").expect("valid name regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@(?:[A-Z0-9-]+\.)+[A-Z]{2,}$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+()\-.\s0-9]+$").expect("valid phone regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+$").expect("valid tag regex"));

/// One form field that failed local validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InvalidField {
    FullName,
    Email,
    PhoneNumber,
    Tags,
}

impl InvalidField {
    /// Human-readable field label used in user messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full name",
            Self::Email => "Email",
            Self::PhoneNumber => "Telephone number",
            Self::Tags => "Tag names",
        }
    }
}

/// Local validation failure naming every invalid field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    fields: Vec<InvalidField>,
}

impl ValidationError {
    pub fn new(fields: Vec<InvalidField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[InvalidField] {
        &self.fields
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let labels = self
            .fields
            .iter()
            .map(|field| field.label())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "These fields have invalid values: {labels}")
    }
}

impl Error for ValidationError {}

/// Normalized contact form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub tags: BTreeSet<String>,
}

impl ContactDraft {
    /// Creates a draft with only a name; other fields stay empty.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into().trim().to_string(),
            ..Self::default()
        }
    }

    /// Builds a draft from raw form fields.
    ///
    /// `selected_tags` are the checked vocabulary boxes; `new_tags` is the
    /// free-text comma-separated field. Both are merged without duplicates.
    pub fn from_form(
        full_name: &str,
        email: &str,
        phone_number: &str,
        selected_tags: &[String],
        new_tags: &str,
    ) -> Self {
        let mut tags = normalize_tags(selected_tags);
        tags.extend(new_tags.split(',').filter_map(normalize_tag));

        Self {
            full_name: full_name.trim().to_string(),
            email: optional_field(email),
            phone_number: optional_field(phone_number),
            tags,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = optional_field(email);
        self
    }

    pub fn with_phone_number(mut self, phone_number: &str) -> Self {
        self.phone_number = optional_field(phone_number);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Checks every field format rule.
    ///
    /// # Errors
    /// - Returns `ValidationError` listing each failing field in form order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut invalid = Vec::new();

        if !is_valid_name(&self.full_name) {
            invalid.push(InvalidField::FullName);
        }
        if let Some(email) = self.email.as_deref() {
            if !EMAIL_RE.is_match(email) {
                invalid.push(InvalidField::Email);
            }
        }
        if let Some(phone) = self.phone_number.as_deref() {
            if !is_valid_phone(phone) {
                invalid.push(InvalidField::PhoneNumber);
            }
        }
        if !self.tags.iter().all(|tag| TAG_RE.is_match(tag)) {
            invalid.push(InvalidField::Tags);
        }

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(invalid))
        }
    }

    /// Builds the request body; `id` is only set for updates.
    pub fn to_payload(&self, id: Option<&ContactId>) -> ContactPayload {
        ContactPayload {
            id: id.cloned(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            tags: join_tag_list(&self.tags),
        }
    }
}

/// JSON body for `POST /contacts` and `PUT /contacts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ContactId>,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

fn is_valid_name(value: &str) -> bool {
    let chars = value.chars().count();
    (NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) && NAME_RE.is_match(value)
}

fn is_valid_phone(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) && PHONE_RE.is_match(value)
}

fn optional_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
