//! Core domain logic for the ledgerline back office.
//! This crate is the single source of truth for business invariants,
//! including the row-version (ETag) optimistic-concurrency protocol.

pub mod audit;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use audit::{AuditEntry, AuditError, AuditOutcome, AuditResult, AuditSink, SqliteAuditLog};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{Document, DocumentValidationError};
pub use model::line_item::{
    DocumentId, LineItem, LineItemId, LineItemPatch, LineItemValidationError,
};
pub use model::version::RowVersion;
pub use repo::document_repo::{
    DocumentListQuery, DocumentRepoError, DocumentRepository, SqliteDocumentRepository,
};
pub use repo::line_item_repo::{
    LineItemRepository, RepoError, RepoResult, SqliteLineItemRepository,
};
pub use service::document_service::{CreateDocumentRequest, DocumentService};
pub use service::line_item_service::{
    CreateLineItemRequest, LineItemService, LineItemView, PatchError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
