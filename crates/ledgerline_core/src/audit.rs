//! Mutation audit trail collaborator.
//!
//! # Responsibility
//! - Record every attempted mutation (accepted or rejected) with actor,
//!   outcome, and correlation metadata.
//! - Stay outside the guard's transaction boundary: a failed audit write
//!   must never roll back or mask the primary operation's outcome.
//!
//! # Invariants
//! - One entry per attempt, including rejected ones.
//! - The sink is fire-and-forget from the caller's perspective; failures
//!   are surfaced to the service layer, which logs and swallows them.

use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// How a mutation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Patch passed the version check and committed.
    Applied,
    /// Expected version did not match the current one.
    RejectedConflict,
    /// Field values failed domain constraints.
    RejectedValidation,
    /// No record existed at the target id.
    RejectedMissing,
}

impl AuditOutcome {
    /// Stable storage string for this outcome.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::RejectedConflict => "rejected_conflict",
            Self::RejectedValidation => "rejected_validation",
            Self::RejectedMissing => "rejected_missing",
        }
    }
}

/// One recorded mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Correlates the entry with one logical request.
    pub correlation_uuid: Uuid,
    /// Entity kind the attempt targeted, e.g. `line_item`.
    pub entity_type: &'static str,
    /// Target entity id.
    pub entity_uuid: Uuid,
    /// Owning document, when known.
    pub document_uuid: Option<Uuid>,
    /// Authenticated actor, when known.
    pub actor: Option<String>,
    pub outcome: AuditOutcome,
    /// Unix epoch milliseconds at which the attempt was observed.
    pub recorded_at: i64,
}

impl AuditEntry {
    /// Builds an entry stamped with a fresh correlation id and current time.
    pub fn now(
        entity_type: &'static str,
        entity_uuid: Uuid,
        document_uuid: Option<Uuid>,
        actor: Option<&str>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            correlation_uuid: Uuid::new_v4(),
            entity_type,
            entity_uuid,
            document_uuid,
            actor: actor.map(str::to_string),
            outcome,
            recorded_at: epoch_ms_now(),
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Failure while persisting an audit entry.
#[derive(Debug)]
pub enum AuditError {
    Db(rusqlite::Error),
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value)
    }
}

/// Sink for mutation attempts.
///
/// Implementations must not participate in the caller's transaction; the
/// service notifies the sink after the guard's outcome is already decided.
pub trait AuditSink {
    fn record(&self, entry: &AuditEntry) -> AuditResult<()>;
}

/// SQLite-backed audit trail writing to `api_audit_log`.
///
/// Owns its own connection so audit writes stay outside the repository's
/// transaction boundary even when both target the same database file.
pub struct SqliteAuditLog {
    conn: Connection,
}

impl SqliteAuditLog {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl AuditSink for SqliteAuditLog {
    fn record(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.conn.execute(
            "INSERT INTO api_audit_log (
                correlation_uuid,
                entity_type,
                entity_uuid,
                document_uuid,
                actor,
                outcome,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                entry.correlation_uuid.to_string(),
                entry.entity_type,
                entry.entity_uuid.to_string(),
                entry.document_uuid.map(|id| id.to_string()),
                entry.actor.as_deref(),
                entry.outcome.as_db_str(),
                entry.recorded_at,
            ],
        )?;
        Ok(())
    }
}

fn epoch_ms_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
