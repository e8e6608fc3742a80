//! Line-item use-case service: the optimistic-concurrency guard surface.
//!
//! # Responsibility
//! - Expose read/create/patch/delete entry points over the repository.
//! - Translate between opaque ETag strings and internal row versions.
//! - Notify the audit sink of every attempted mutation, fire-and-forget.
//!
//! # Invariants
//! - The ETag returned by a read is exactly the token the next patch will
//!   be compared against.
//! - Audit sink failures are logged and swallowed; they never change the
//!   primary operation's outcome.
//! - The service never retries a conflicted patch on the caller's behalf.

use crate::audit::{AuditEntry, AuditOutcome, AuditSink};
use crate::model::line_item::{
    DocumentId, LineItem, LineItemId, LineItemPatch, LineItemValidationError,
};
use crate::model::version::RowVersion;
use crate::repo::line_item_repo::{LineItemRepository, RepoError};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const AUDIT_ENTITY_TYPE: &str = "line_item";

/// Read model returned to callers: entity fields plus the opaque ETag.
///
/// Mirrors the stored record one-to-one except that `row_version` is
/// rendered as its encoded token, so callers can only echo it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemView {
    pub uuid: LineItemId,
    pub document_uuid: DocumentId,
    pub article_id: i64,
    pub quantity: Decimal,
    pub price: Decimal,
    pub discount: Decimal,
    pub margin: Decimal,
    pub vat_rate: i64,
    pub calculate_excise: bool,
    pub calculate_tax: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    /// Opaque concurrency token for conditional requests.
    pub etag: String,
}

impl From<LineItem> for LineItemView {
    fn from(item: LineItem) -> Self {
        Self {
            uuid: item.uuid,
            document_uuid: item.document_uuid,
            article_id: item.article_id,
            quantity: item.quantity,
            price: item.price,
            discount: item.discount,
            margin: item.margin,
            vat_rate: item.vat_rate,
            calculate_excise: item.calculate_excise,
            calculate_tax: item.calculate_tax,
            created_at: item.created_at,
            updated_at: item.updated_at,
            created_by: item.created_by,
            updated_by: item.updated_by,
            etag: item.row_version.encode(),
        }
    }
}

/// Request model for creating a line item under a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLineItemRequest {
    pub document_uuid: DocumentId,
    pub article_id: i64,
    pub fields: LineItemPatch,
}

/// Caller-facing failure taxonomy for the conditional patch.
#[derive(Debug)]
pub enum PatchError {
    /// No active line item at this id. Terminal; do not retry.
    NotFound(LineItemId),
    /// Expected version is stale. Carries the current state so the caller
    /// can rebase and retry, or abort.
    VersionConflict { current: Box<LineItemView> },
    /// Field values failed domain constraints. Terminal; the record's
    /// version was not consumed.
    Validation(LineItemValidationError),
    /// The supplied ETag is not a token this service ever produced.
    MalformedToken(String),
    /// Backing store failed for reasons unrelated to versioning. The whole
    /// operation may be retried; no version was consumed.
    Storage(RepoError),
}

impl Display for PatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "line item not found: {id}"),
            Self::VersionConflict { current } => write!(
                f,
                "line item {} changed concurrently, current version {}",
                current.uuid, current.etag
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::MalformedToken(token) => write!(f, "malformed version token `{token}`"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

/// Use-case service wrapping the repository CAS and the audit collaborator.
pub struct LineItemService<R: LineItemRepository, A: AuditSink> {
    repo: R,
    audit: A,
}

impl<R: LineItemRepository, A: AuditSink> LineItemService<R, A> {
    /// Creates a service using the provided collaborators.
    pub fn new(repo: R, audit: A) -> Self {
        Self { repo, audit }
    }

    /// Gets one line item view by ID. The embedded ETag is current as of
    /// this read.
    pub fn read(&self, id: LineItemId) -> Result<Option<LineItemView>, RepoError> {
        Ok(self.repo.get_line_item(id, false)?.map(LineItemView::from))
    }

    /// Lists active line items of one document.
    pub fn list_by_document(
        &self,
        document_uuid: DocumentId,
    ) -> Result<Vec<LineItemView>, RepoError> {
        Ok(self
            .repo
            .list_by_document(document_uuid, false)?
            .into_iter()
            .map(LineItemView::from)
            .collect())
    }

    /// Creates a new line item and returns the stored view with its
    /// initial ETag.
    pub fn create(
        &mut self,
        request: &CreateLineItemRequest,
        actor: Option<&str>,
    ) -> Result<LineItemView, RepoError> {
        let draft = LineItem::new(
            request.document_uuid,
            request.article_id,
            request.fields.clone(),
        );

        match self.repo.create_line_item(&draft, actor) {
            Ok(stored) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    stored.uuid,
                    Some(stored.document_uuid),
                    actor,
                    AuditOutcome::Applied,
                ));
                Ok(LineItemView::from(stored))
            }
            Err(err) => {
                let outcome = match &err {
                    RepoError::Validation(_) => Some(AuditOutcome::RejectedValidation),
                    RepoError::DocumentNotFound(_) => Some(AuditOutcome::RejectedMissing),
                    _ => None,
                };
                if let Some(outcome) = outcome {
                    self.notify_audit(AuditEntry::now(
                        AUDIT_ENTITY_TYPE,
                        draft.uuid,
                        Some(draft.document_uuid),
                        actor,
                        outcome,
                    ));
                }
                Err(err)
            }
        }
    }

    /// Applies a conditional full-field patch.
    ///
    /// `expected_etag` is the token the caller last read. Validation runs
    /// first and never consumes a version; then the token is decoded; then
    /// the repository performs the atomic compare-and-set. The audit sink
    /// is notified of the outcome after it is already decided.
    pub fn apply_patch(
        &mut self,
        id: LineItemId,
        expected_etag: &str,
        patch: &LineItemPatch,
        actor: Option<&str>,
    ) -> Result<LineItemView, PatchError> {
        if let Err(err) = patch.validate() {
            self.notify_audit(AuditEntry::now(
                AUDIT_ENTITY_TYPE,
                id,
                None,
                actor,
                AuditOutcome::RejectedValidation,
            ));
            return Err(PatchError::Validation(err));
        }

        let Some(expected) = RowVersion::decode(expected_etag) else {
            self.notify_audit(AuditEntry::now(
                AUDIT_ENTITY_TYPE,
                id,
                None,
                actor,
                AuditOutcome::RejectedValidation,
            ));
            return Err(PatchError::MalformedToken(expected_etag.to_string()));
        };

        match self.repo.patch_line_item(id, expected, patch, actor) {
            Ok(updated) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    updated.uuid,
                    Some(updated.document_uuid),
                    actor,
                    AuditOutcome::Applied,
                ));
                Ok(LineItemView::from(updated))
            }
            Err(RepoError::NotFound(missing)) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    missing,
                    None,
                    actor,
                    AuditOutcome::RejectedMissing,
                ));
                Err(PatchError::NotFound(missing))
            }
            Err(RepoError::VersionConflict { current }) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    current.uuid,
                    Some(current.document_uuid),
                    actor,
                    AuditOutcome::RejectedConflict,
                ));
                Err(PatchError::VersionConflict {
                    current: Box::new(LineItemView::from(*current)),
                })
            }
            Err(RepoError::Validation(err)) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    id,
                    None,
                    actor,
                    AuditOutcome::RejectedValidation,
                ));
                Err(PatchError::Validation(err))
            }
            // Storage-class failures are not audited: the sink shares the
            // failing store, and no version slot was consumed.
            Err(other) => Err(PatchError::Storage(other)),
        }
    }

    /// Soft-deletes a line item by ID.
    pub fn delete(&mut self, id: LineItemId, actor: Option<&str>) -> Result<(), RepoError> {
        match self.repo.soft_delete_line_item(id) {
            Ok(()) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    id,
                    None,
                    actor,
                    AuditOutcome::Applied,
                ));
                Ok(())
            }
            Err(RepoError::NotFound(missing)) => {
                self.notify_audit(AuditEntry::now(
                    AUDIT_ENTITY_TYPE,
                    missing,
                    None,
                    actor,
                    AuditOutcome::RejectedMissing,
                ));
                Err(RepoError::NotFound(missing))
            }
            Err(err) => Err(err),
        }
    }

    fn notify_audit(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.record(&entry) {
            warn!(
                "event=audit_record module=service status=error entity_uuid={} outcome={} error={}",
                entry.entity_uuid,
                entry.outcome.as_db_str(),
                err
            );
        }
    }
}
