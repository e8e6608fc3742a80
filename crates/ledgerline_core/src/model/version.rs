//! Row-version token for optimistic concurrency.
//!
//! # Responsibility
//! - Define the opaque version token attached to every mutable record.
//! - Own the wire encoding callers echo back as an ETag.
//!
//! # Invariants
//! - The token strictly changes on every accepted write.
//! - A token value is never reused across the history of one record.
//! - Callers never interpret tokens; they only echo the encoded string.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Monotonic per-record version counter backing the ETag protocol.
///
/// Stored as a plain integer column and bumped by exactly one on every
/// accepted patch. Exposed to callers only through [`RowVersion::encode`],
/// which renders the counter as base64 over its 8 big-endian bytes, so the
/// on-the-wire shape matches an opaque fixed-size token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowVersion(i64);

impl RowVersion {
    /// Version assigned to a freshly created record.
    pub fn initial() -> Self {
        Self(1)
    }

    /// Version written by the next accepted patch.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value for storage binding.
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Reconstructs a version from a persisted counter value.
    ///
    /// Returns `None` for values no record could legally hold.
    pub fn from_i64(value: i64) -> Option<Self> {
        if value < 1 {
            return None;
        }
        Some(Self(value))
    }

    /// Renders the token as the opaque ETag string handed to callers.
    pub fn encode(self) -> String {
        STANDARD.encode(self.0.to_be_bytes())
    }

    /// Parses a caller-supplied ETag string back into a version.
    ///
    /// Rejects anything that is not base64 over exactly 8 bytes, and any
    /// counter value outside the legal range. Malformed input is reported as
    /// a decode failure instead of being misread as some other version.
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = STANDARD.decode(token.trim()).ok()?;
        let raw: [u8; 8] = bytes.try_into().ok()?;
        Self::from_i64(i64::from_be_bytes(raw))
    }
}
