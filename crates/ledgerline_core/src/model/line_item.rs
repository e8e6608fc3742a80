//! Document line-item domain model.
//!
//! # Responsibility
//! - Define the canonical line-item record and its mutable field subset.
//! - Provide patch validation independent of persistence.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another line item.
//! - `row_version` strictly changes on every accepted mutation.
//! - A patch always replaces the full mutable subset; omission is not
//!   "leave unchanged" in this design.
//! - `is_deleted` is a terminal tombstone state, not a version concept.

use crate::model::version::RowVersion;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a document line item.
pub type LineItemId = Uuid;

/// Stable identifier for the owning document.
pub type DocumentId = Uuid;

/// Validation failures for line-item field values.
///
/// Checked before any version compare, so a rejected patch never consumes a
/// version slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemValidationError {
    /// Quantity must be strictly positive.
    NonPositiveQuantity(Decimal),
    /// Price must not be negative.
    NegativePrice(Decimal),
    /// Discount is a percentage and must stay within [0, 100].
    DiscountOutOfRange(Decimal),
    /// Margin must not be negative.
    NegativeMargin(Decimal),
    /// VAT rate is a percentage and must stay within [0, 100].
    VatRateOutOfRange(i64),
}

impl Display for LineItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveQuantity(value) => {
                write!(f, "quantity must be positive, got {value}")
            }
            Self::NegativePrice(value) => write!(f, "price must not be negative, got {value}"),
            Self::DiscountOutOfRange(value) => {
                write!(f, "discount must be within [0, 100], got {value}")
            }
            Self::NegativeMargin(value) => write!(f, "margin must not be negative, got {value}"),
            Self::VatRateOutOfRange(value) => {
                write!(f, "vat rate must be within [0, 100], got {value}")
            }
        }
    }
}

impl Error for LineItemValidationError {}

/// Full replacement payload for the mutable subset of a line item.
///
/// Every mutable field must be present. The autosave flow sends the whole
/// editable row on each keystroke-debounce, so partial-merge semantics are
/// deliberately not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemPatch {
    pub quantity: Decimal,
    pub price: Decimal,
    pub discount: Decimal,
    pub margin: Decimal,
    pub vat_rate: i64,
    pub calculate_excise: bool,
    pub calculate_tax: bool,
}

impl LineItemPatch {
    /// Checks domain constraints on the patch fields.
    ///
    /// # Errors
    /// Returns the first violated constraint. Validation never inspects the
    /// record's current state, only the supplied values.
    pub fn validate(&self) -> Result<(), LineItemValidationError> {
        if self.quantity <= Decimal::ZERO {
            return Err(LineItemValidationError::NonPositiveQuantity(self.quantity));
        }
        if self.price < Decimal::ZERO {
            return Err(LineItemValidationError::NegativePrice(self.price));
        }
        if self.discount < Decimal::ZERO || self.discount > Decimal::from(100) {
            return Err(LineItemValidationError::DiscountOutOfRange(self.discount));
        }
        if self.margin < Decimal::ZERO {
            return Err(LineItemValidationError::NegativeMargin(self.margin));
        }
        if !(0..=100).contains(&self.vat_rate) {
            return Err(LineItemValidationError::VatRateOutOfRange(self.vat_rate));
        }
        Ok(())
    }
}

/// Canonical line-item record as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable global ID used for linking and auditing.
    pub uuid: LineItemId,
    /// Owning document.
    pub document_uuid: DocumentId,
    /// Referenced article. Immutable after creation.
    pub article_id: i64,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Percentage discount in [0, 100].
    pub discount: Decimal,
    pub margin: Decimal,
    /// Percentage VAT rate in [0, 100].
    pub vat_rate: i64,
    pub calculate_excise: bool,
    pub calculate_tax: bool,
    /// Concurrency token. Compared-and-set by the storage layer.
    pub row_version: RowVersion,
    /// Soft delete tombstone; terminal once set.
    pub is_deleted: bool,
    /// Unix epoch milliseconds, assigned by storage on insert.
    pub created_at: i64,
    /// Unix epoch milliseconds, touched on every accepted mutation.
    pub updated_at: i64,
    /// Informational only, never used for conflict detection.
    pub created_by: Option<String>,
    /// Informational only, never used for conflict detection.
    pub updated_by: Option<String>,
}

impl LineItem {
    /// Creates a new line item draft with a generated stable ID.
    ///
    /// Timestamps are zero until storage assigns them on insert; the
    /// repository returns the persisted row with real values.
    pub fn new(document_uuid: DocumentId, article_id: i64, fields: LineItemPatch) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            document_uuid,
            article_id,
            quantity: fields.quantity,
            price: fields.price,
            discount: fields.discount,
            margin: fields.margin,
            vat_rate: fields.vat_rate,
            calculate_excise: fields.calculate_excise,
            calculate_tax: fields.calculate_tax,
            row_version: RowVersion::initial(),
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
            created_by: None,
            updated_by: None,
        }
    }

    /// Checks domain constraints on the current field values.
    pub fn validate(&self) -> Result<(), LineItemValidationError> {
        self.fields().validate()
    }

    /// Extracts the mutable subset as a patch payload.
    pub fn fields(&self) -> LineItemPatch {
        LineItemPatch {
            quantity: self.quantity,
            price: self.price,
            discount: self.discount,
            margin: self.margin,
            vat_rate: self.vat_rate,
            calculate_excise: self.calculate_excise,
            calculate_tax: self.calculate_tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LineItem, LineItemPatch, LineItemValidationError};
    use crate::model::version::RowVersion;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn valid_patch() -> LineItemPatch {
        LineItemPatch {
            quantity: Decimal::from(10),
            price: "199.99".parse().unwrap(),
            discount: Decimal::from(5),
            margin: Decimal::from(12),
            vat_rate: 20,
            calculate_excise: false,
            calculate_tax: true,
        }
    }

    #[test]
    fn valid_patch_passes_validation() {
        assert!(valid_patch().validate().is_ok());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let mut patch = valid_patch();
        patch.quantity = Decimal::from(-1);
        assert!(matches!(
            patch.validate(),
            Err(LineItemValidationError::NonPositiveQuantity(_))
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut patch = valid_patch();
        patch.quantity = Decimal::ZERO;
        assert!(matches!(
            patch.validate(),
            Err(LineItemValidationError::NonPositiveQuantity(_))
        ));
    }

    #[test]
    fn discount_above_hundred_is_rejected() {
        let mut patch = valid_patch();
        patch.discount = Decimal::from(101);
        assert!(matches!(
            patch.validate(),
            Err(LineItemValidationError::DiscountOutOfRange(_))
        ));
    }

    #[test]
    fn vat_rate_bounds_are_inclusive() {
        let mut patch = valid_patch();
        patch.vat_rate = 0;
        assert!(patch.validate().is_ok());
        patch.vat_rate = 100;
        assert!(patch.validate().is_ok());
        patch.vat_rate = 101;
        assert!(matches!(
            patch.validate(),
            Err(LineItemValidationError::VatRateOutOfRange(101))
        ));
    }

    #[test]
    fn new_item_starts_at_initial_version() {
        let item = LineItem::new(Uuid::new_v4(), 42, valid_patch());
        assert_eq!(item.row_version, RowVersion::initial());
        assert!(!item.is_deleted);
        assert_eq!(item.fields(), valid_patch());
    }
}
