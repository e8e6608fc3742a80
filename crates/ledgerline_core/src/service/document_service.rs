//! Document use-case service.
//!
//! # Responsibility
//! - Provide stable CRUD entry points for core callers.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Service layer remains storage-agnostic.

use crate::model::document::Document;
use crate::model::line_item::DocumentId;
use crate::repo::document_repo::{DocumentListQuery, DocumentRepoResult, DocumentRepository};

/// Request model for creating a document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDocumentRequest {
    /// Human-facing document number.
    pub number: String,
    /// Business partner reference.
    pub partner_id: i64,
    /// Issue date in epoch milliseconds.
    pub issued_at: i64,
    /// Optional free-form remark.
    pub note: Option<String>,
}

/// Use-case service wrapper for document CRUD operations.
pub struct DocumentService<R: DocumentRepository> {
    repo: R,
}

impl<R: DocumentRepository> DocumentService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a document header from request input.
    pub fn create_document(
        &self,
        request: &CreateDocumentRequest,
        actor: Option<&str>,
    ) -> DocumentRepoResult<Document> {
        let mut document = Document::new(
            request.number.clone(),
            request.partner_id,
            request.issued_at,
        );
        document.note = request.note.clone();
        self.repo.create_document(&document, actor)
    }

    /// Gets one document by ID with optional deleted-row visibility.
    pub fn get_document(
        &self,
        id: DocumentId,
        include_deleted: bool,
    ) -> DocumentRepoResult<Option<Document>> {
        self.repo.get_document(id, include_deleted)
    }

    /// Lists documents using pagination options.
    pub fn list_documents(&self, query: &DocumentListQuery) -> DocumentRepoResult<Vec<Document>> {
        self.repo.list_documents(query)
    }

    /// Soft-deletes a document by ID.
    pub fn soft_delete_document(&self, id: DocumentId) -> DocumentRepoResult<()> {
        self.repo.soft_delete_document(id)
    }
}
