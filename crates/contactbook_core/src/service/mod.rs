//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate client, cache, criteria and scheduler into renderer-level APIs.
//! - Keep renderers decoupled from transport and timer details.

pub mod directory_core;
