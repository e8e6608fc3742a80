//! Persistence layer: repository traits and their SQLite implementations.
//!
//! # Responsibility
//! - Keep all SQL behind repository boundaries.
//! - Expose the compare-and-set primitive the concurrency guard relies on.
//!
//! # Invariants
//! - Repositories only accept connections with fully applied migrations.

pub mod document_repo;
pub mod line_item_repo;
