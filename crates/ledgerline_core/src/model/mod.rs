//! Domain model for back-office documents and their line items.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep the concurrency token type next to the records it protects.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - Deletion is represented by soft-delete tombstones, not hard delete.
//! - Mutable records carry a `RowVersion` that strictly changes on commit.

pub mod document;
pub mod line_item;
pub mod version;
