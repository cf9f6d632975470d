//! Directory domain model.
//!
//! # Responsibility
//! - Define the canonical contact record and its wire shapes.
//! - Own tag normalization and form-level validation rules.
//!
//! # Invariants
//! - Every contact is identified by a service-assigned `ContactId`.
//! - Contacts are immutable values; the cache swaps whole snapshots.

pub mod contact;
pub mod draft;
