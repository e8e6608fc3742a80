//! Accounting document domain model.
//!
//! # Responsibility
//! - Define the document header record that owns line items.
//! - Provide creation-time validation for header fields.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another document.
//! - Deletion is a soft-delete tombstone; line items keep their link.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::model::line_item::DocumentId;

/// Validation failures for document header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    /// Document number must not be empty or whitespace.
    EmptyNumber,
    /// Partner reference must be a positive identifier.
    InvalidPartner(i64),
}

impl Display for DocumentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNumber => write!(f, "document number must not be empty"),
            Self::InvalidPartner(id) => write!(f, "partner id must be positive, got {id}"),
        }
    }
}

impl Error for DocumentValidationError {}

/// Document header record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable global ID.
    pub uuid: DocumentId,
    /// Human-facing document number, e.g. an invoice number.
    pub number: String,
    /// Business partner reference from the partner registry.
    pub partner_id: i64,
    /// Issue date in unix epoch milliseconds.
    pub issued_at: i64,
    /// Free-form remark.
    pub note: Option<String>,
    /// Soft delete tombstone.
    pub is_deleted: bool,
    /// Unix epoch milliseconds, assigned by storage on insert.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Document {
    /// Creates a new document draft with a generated stable ID.
    pub fn new(number: impl Into<String>, partner_id: i64, issued_at: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            number: number.into(),
            partner_id,
            issued_at,
            note: None,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
            created_by: None,
            updated_by: None,
        }
    }

    /// Checks header constraints.
    pub fn validate(&self) -> Result<(), DocumentValidationError> {
        if self.number.trim().is_empty() {
            return Err(DocumentValidationError::EmptyNumber);
        }
        if self.partner_id <= 0 {
            return Err(DocumentValidationError::InvalidPartner(self.partner_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, DocumentValidationError};

    #[test]
    fn valid_document_passes() {
        let document = Document::new("IF-2026-0001", 7, 1_760_000_000_000);
        assert!(document.validate().is_ok());
    }

    #[test]
    fn blank_number_is_rejected() {
        let document = Document::new("   ", 7, 0);
        assert_eq!(
            document.validate(),
            Err(DocumentValidationError::EmptyNumber)
        );
    }

    #[test]
    fn non_positive_partner_is_rejected() {
        let document = Document::new("IF-2026-0002", 0, 0);
        assert_eq!(
            document.validate(),
            Err(DocumentValidationError::InvalidPartner(0))
        );
    }
}
