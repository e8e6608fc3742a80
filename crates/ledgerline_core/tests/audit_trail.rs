use ledgerline_core::db::{open_db, open_db_in_memory};
use ledgerline_core::{
    AuditEntry, AuditError, AuditOutcome, AuditResult, AuditSink, CreateLineItemRequest, Document,
    DocumentId, DocumentRepository, LineItemPatch, LineItemService, PatchError,
    SqliteAuditLog, SqliteDocumentRepository, SqliteLineItemRepository,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Default, Clone)]
struct RecordingSink {
    entries: Rc<RefCell<Vec<AuditEntry>>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries.borrow_mut().push(entry.clone());
        Ok(())
    }
}

/// Sink whose backing store is always broken.
struct FailingSink;

impl AuditSink for FailingSink {
    fn record(&self, _entry: &AuditEntry) -> AuditResult<()> {
        Err(AuditError::from(rusqlite::Error::InvalidQuery))
    }
}

fn seed_document(conn: &Connection) -> DocumentId {
    let repo = SqliteDocumentRepository::new(conn);
    let document = Document::new("IF-2026-0001", 7, 1_760_000_000_000);
    repo.create_document(&document, Some("tester")).unwrap().uuid
}

fn fields_with_quantity(quantity: i64) -> LineItemPatch {
    LineItemPatch {
        quantity: Decimal::from(quantity),
        price: "99.90".parse().unwrap(),
        discount: Decimal::ZERO,
        margin: Decimal::ZERO,
        vat_rate: 20,
        calculate_excise: false,
        calculate_tax: true,
    }
}

#[test]
fn every_attempt_is_recorded_with_its_outcome() {
    let mut conn = open_db_in_memory().unwrap();
    let document_uuid = seed_document(&conn);
    let repo = SqliteLineItemRepository::try_new(&mut conn).unwrap();
    let sink = RecordingSink::default();
    let entries = Rc::clone(&sink.entries);
    let mut service = LineItemService::new(repo, sink);

    let created = service
        .create(
            &CreateLineItemRequest {
                document_uuid,
                article_id: 42,
                fields: fields_with_quantity(10),
            },
            Some("alice"),
        )
        .unwrap();

    // Accepted patch.
    let updated = service
        .apply_patch(
            created.uuid,
            &created.etag,
            &fields_with_quantity(12),
            Some("alice"),
        )
        .unwrap();
    // Stale patch.
    let _ = service
        .apply_patch(
            created.uuid,
            &created.etag,
            &fields_with_quantity(15),
            Some("bob"),
        )
        .unwrap_err();
    // Invalid patch.
    let _ = service
        .apply_patch(
            created.uuid,
            &updated.etag,
            &fields_with_quantity(-1),
            Some("bob"),
        )
        .unwrap_err();
    // Missing target.
    let missing = Uuid::new_v4();
    let _ = service
        .apply_patch(missing, &created.etag, &fields_with_quantity(1), Some("bob"))
        .unwrap_err();

    let recorded = entries.borrow();
    let outcomes: Vec<AuditOutcome> = recorded.iter().map(|entry| entry.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AuditOutcome::Applied,
            AuditOutcome::Applied,
            AuditOutcome::RejectedConflict,
            AuditOutcome::RejectedValidation,
            AuditOutcome::RejectedMissing,
        ]
    );

    assert!(recorded
        .iter()
        .all(|entry| entry.entity_type == "line_item"));
    assert_eq!(recorded[2].actor.as_deref(), Some("bob"));
    assert_eq!(recorded[4].entity_uuid, missing);
    // Correlation ids are unique per attempt.
    let mut correlations: Vec<_> = recorded.iter().map(|entry| entry.correlation_uuid).collect();
    correlations.sort();
    correlations.dedup();
    assert_eq!(correlations.len(), recorded.len());
}

#[test]
fn create_rejected_for_missing_document_is_audited() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteLineItemRepository::try_new(&mut conn).unwrap();
    let sink = RecordingSink::default();
    let entries = Rc::clone(&sink.entries);
    let mut service = LineItemService::new(repo, sink);

    let orphan_document = Uuid::new_v4();
    let err = service
        .create(
            &CreateLineItemRequest {
                document_uuid: orphan_document,
                article_id: 1,
                fields: fields_with_quantity(10),
            },
            Some("alice"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ledgerline_core::RepoError::DocumentNotFound(id) if id == orphan_document
    ));

    let recorded = entries.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].outcome, AuditOutcome::RejectedMissing);
    assert_eq!(recorded[0].document_uuid, Some(orphan_document));
    assert_eq!(recorded[0].actor.as_deref(), Some("alice"));
}

#[test]
fn sink_failure_never_masks_the_primary_outcome() {
    let mut conn = open_db_in_memory().unwrap();
    let document_uuid = seed_document(&conn);
    let repo = SqliteLineItemRepository::try_new(&mut conn).unwrap();
    let mut service = LineItemService::new(repo, FailingSink);

    let created = service
        .create(
            &CreateLineItemRequest {
                document_uuid,
                article_id: 1,
                fields: fields_with_quantity(10),
            },
            None,
        )
        .expect("create must succeed despite failing audit sink");

    let updated = service
        .apply_patch(created.uuid, &created.etag, &fields_with_quantity(11), None)
        .expect("patch must succeed despite failing audit sink");
    assert_ne!(updated.etag, created.etag);

    // Conflicts are still reported as conflicts, not audit errors.
    let err = service
        .apply_patch(created.uuid, &created.etag, &fields_with_quantity(12), None)
        .unwrap_err();
    assert!(matches!(err, PatchError::VersionConflict { .. }));
}

#[test]
fn sqlite_sink_persists_entries_outside_the_guard_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");

    let (item_uuid, document_uuid) = {
        let mut conn = open_db(&path).unwrap();
        let document_uuid = seed_document(&conn);
        let repo = SqliteLineItemRepository::try_new(&mut conn).unwrap();
        // Audit writes go through a second connection to the same file.
        let sink = SqliteAuditLog::new(open_db(&path).unwrap());
        let mut service = LineItemService::new(repo, sink);

        let created = service
            .create(
                &CreateLineItemRequest {
                    document_uuid,
                    article_id: 42,
                    fields: fields_with_quantity(10),
                },
                Some("alice"),
            )
            .unwrap();
        let _ = service
            .apply_patch(
                created.uuid,
                &created.etag,
                &fields_with_quantity(12),
                Some("alice"),
            )
            .unwrap();
        let _ = service
            .apply_patch(
                created.uuid,
                &created.etag,
                &fields_with_quantity(15),
                Some("bob"),
            )
            .unwrap_err();

        (created.uuid, document_uuid)
    };

    let conn = open_db(&path).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT outcome, actor, document_uuid
             FROM api_audit_log
             WHERE entity_uuid = ?1
             ORDER BY id ASC;",
        )
        .unwrap();
    let rows: Vec<(String, Option<String>, Option<String>)> = stmt
        .query_map([item_uuid.to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap()
        .map(Result::unwrap)
        .collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0, "applied");
    assert_eq!(rows[1].0, "applied");
    assert_eq!(rows[2].0, "rejected_conflict");
    assert_eq!(rows[2].1.as_deref(), Some("bob"));
    assert_eq!(rows[2].2.as_deref(), Some(document_uuid.to_string().as_str()));
}
