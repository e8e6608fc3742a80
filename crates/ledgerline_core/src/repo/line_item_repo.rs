//! Line-item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `line_items` storage.
//! - Own the compare-and-set primitive behind the optimistic-concurrency
//!   guard: version check and field write commit or roll back together.
//!
//! # Invariants
//! - Write paths must validate field values before SQL mutations.
//! - An accepted patch always bumps `row_version` by exactly one.
//! - A rejected patch leaves the row untouched; there is no partial state.
//! - The current version is never cached across the check-and-write.

use crate::db::DbError;
use crate::model::line_item::{
    DocumentId, LineItem, LineItemId, LineItemPatch, LineItemValidationError,
};
use crate::model::version::RowVersion;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const LINE_ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    document_uuid,
    article_id,
    quantity,
    price,
    discount,
    margin,
    vat_rate,
    calculate_excise,
    calculate_tax,
    row_version,
    is_deleted,
    created_at,
    updated_at,
    created_by,
    updated_by
FROM line_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for line-item persistence and the concurrency guard.
#[derive(Debug)]
pub enum RepoError {
    /// Patch or draft fields fail domain constraints. Raised before any
    /// version compare, so it never consumes a version slot.
    Validation(LineItemValidationError),
    /// Underlying SQLite/bootstrap failure.
    Db(DbError),
    /// No active line item at this id.
    NotFound(LineItemId),
    /// Referenced document does not exist or is soft-deleted.
    DocumentNotFound(DocumentId),
    /// The row exists but its current version differs from the one the
    /// caller last read. Carries the current row so the caller can rebase.
    VersionConflict { current: Box<LineItem> },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "line item not found: {id}"),
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::VersionConflict { current } => write!(
                f,
                "line item {} changed concurrently, current version {}",
                current.uuid,
                current.row_version.encode()
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "line item repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "line item repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "line item repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted line item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LineItemValidationError> for RepoError {
    fn from(value: LineItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for line-item CRUD and the conditional patch.
pub trait LineItemRepository {
    /// Persists a new line item draft and returns the stored row.
    fn create_line_item(&mut self, item: &LineItem, actor: Option<&str>) -> RepoResult<LineItem>;
    /// Gets one line item by ID with optional deleted-row visibility.
    fn get_line_item(&self, id: LineItemId, include_deleted: bool) -> RepoResult<Option<LineItem>>;
    /// Lists line items belonging to one document in stable order.
    fn list_by_document(
        &self,
        document_uuid: DocumentId,
        include_deleted: bool,
    ) -> RepoResult<Vec<LineItem>>;
    /// Applies a full-field patch if and only if `expected` matches the
    /// row's current version. See [`SqliteLineItemRepository::patch_line_item`].
    fn patch_line_item(
        &mut self,
        id: LineItemId,
        expected: RowVersion,
        patch: &LineItemPatch,
        actor: Option<&str>,
    ) -> RepoResult<LineItem>;
    /// Soft-deletes a line item by ID. Idempotent.
    fn soft_delete_line_item(&mut self, id: LineItemId) -> RepoResult<()>;
}

/// SQLite-backed line-item repository.
pub struct SqliteLineItemRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteLineItemRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_line_item_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LineItemRepository for SqliteLineItemRepository<'_> {
    fn create_line_item(&mut self, item: &LineItem, actor: Option<&str>) -> RepoResult<LineItem> {
        item.validate()?;

        if !document_is_active(self.conn, item.document_uuid)? {
            return Err(RepoError::DocumentNotFound(item.document_uuid));
        }

        self.conn.execute(
            "INSERT INTO line_items (
                uuid,
                document_uuid,
                article_id,
                quantity,
                price,
                discount,
                margin,
                vat_rate,
                calculate_excise,
                calculate_tax,
                row_version,
                is_deleted,
                created_by,
                updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?12);",
            params![
                item.uuid.to_string(),
                item.document_uuid.to_string(),
                item.article_id,
                item.quantity.to_string(),
                item.price.to_string(),
                item.discount.to_string(),
                item.margin.to_string(),
                item.vat_rate,
                bool_to_int(item.calculate_excise),
                bool_to_int(item.calculate_tax),
                RowVersion::initial().as_i64(),
                actor,
            ],
        )?;

        load_required_line_item(self.conn, item.uuid)
    }

    fn get_line_item(&self, id: LineItemId, include_deleted: bool) -> RepoResult<Option<LineItem>> {
        load_line_item(self.conn, id, include_deleted)
    }

    fn list_by_document(
        &self,
        document_uuid: DocumentId,
        include_deleted: bool,
    ) -> RepoResult<Vec<LineItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LINE_ITEM_SELECT_SQL}
             WHERE document_uuid = ?1
               AND (?2 = 1 OR is_deleted = 0)
             ORDER BY created_at ASC, uuid ASC;"
        ))?;

        let mut rows = stmt.query(params![
            document_uuid.to_string(),
            bool_to_int(include_deleted)
        ])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_line_item_row(row)?);
        }

        Ok(items)
    }

    /// Compare-and-set core of the concurrency guard.
    ///
    /// Runs inside one IMMEDIATE transaction, so the read of the current
    /// version and the conditional write cannot interleave with another
    /// writer on the same row. Exactly one of {applied, rejected} holds:
    /// every rejection path returns before commit, which rolls the
    /// transaction back wholesale.
    fn patch_line_item(
        &mut self,
        id: LineItemId,
        expected: RowVersion,
        patch: &LineItemPatch,
        actor: Option<&str>,
    ) -> RepoResult<LineItem> {
        patch.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = match load_line_item(&tx, id, false)? {
            Some(row) => row,
            None => return Err(RepoError::NotFound(id)),
        };

        if current.row_version != expected {
            return Err(RepoError::VersionConflict {
                current: Box::new(current),
            });
        }

        let next = current.row_version.next();
        let changed = tx.execute(
            "UPDATE line_items
             SET
                quantity = ?2,
                price = ?3,
                discount = ?4,
                margin = ?5,
                vat_rate = ?6,
                calculate_excise = ?7,
                calculate_tax = ?8,
                row_version = ?9,
                updated_at = (strftime('%s', 'now') * 1000),
                updated_by = ?10
             WHERE uuid = ?1
               AND row_version = ?11
               AND is_deleted = 0;",
            params![
                id.to_string(),
                patch.quantity.to_string(),
                patch.price.to_string(),
                patch.discount.to_string(),
                patch.margin.to_string(),
                patch.vat_rate,
                bool_to_int(patch.calculate_excise),
                bool_to_int(patch.calculate_tax),
                next.as_i64(),
                actor,
                expected.as_i64(),
            ],
        )?;

        // The row was read under the same exclusive transaction, so the
        // conditional write must hit it.
        if changed != 1 {
            return Err(RepoError::InvalidData(format!(
                "conditional update matched {changed} rows for line item {id}"
            )));
        }

        let updated = load_required_line_item(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn soft_delete_line_item(&mut self, id: LineItemId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE line_items
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

fn load_line_item(
    conn: &Connection,
    id: LineItemId,
    include_deleted: bool,
) -> RepoResult<Option<LineItem>> {
    let mut stmt = conn.prepare(&format!(
        "{LINE_ITEM_SELECT_SQL}
         WHERE uuid = ?1
           AND (?2 = 1 OR is_deleted = 0);"
    ))?;

    let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_line_item_row(row)?));
    }

    Ok(None)
}

fn load_required_line_item(conn: &Connection, id: LineItemId) -> RepoResult<LineItem> {
    load_line_item(conn, id, true)?.ok_or(RepoError::NotFound(id))
}

fn document_is_active(conn: &Connection, document_uuid: DocumentId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM documents
            WHERE uuid = ?1 AND is_deleted = 0
        );",
        [document_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_line_item_row(row: &Row<'_>) -> RepoResult<LineItem> {
    let uuid = parse_uuid_column(row, "uuid")?;
    let document_uuid = parse_uuid_column(row, "document_uuid")?;

    let raw_version: i64 = row.get("row_version")?;
    let row_version = RowVersion::from_i64(raw_version).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid row_version value `{raw_version}` in line_items.row_version"
        ))
    })?;

    let item = LineItem {
        uuid,
        document_uuid,
        article_id: row.get("article_id")?,
        quantity: parse_decimal_column(row, "quantity")?,
        price: parse_decimal_column(row, "price")?,
        discount: parse_decimal_column(row, "discount")?,
        margin: parse_decimal_column(row, "margin")?,
        vat_rate: row.get("vat_rate")?,
        calculate_excise: parse_bool_column(row, "calculate_excise")?,
        calculate_tax: parse_bool_column(row, "calculate_tax")?,
        row_version,
        is_deleted: parse_bool_column(row, "is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        created_by: row.get("created_by")?,
        updated_by: row.get("updated_by")?,
    };
    item.validate()?;
    Ok(item)
}

fn parse_uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{text}` in line_items.{column}"))
    })
}

fn parse_decimal_column(row: &Row<'_>, column: &'static str) -> RepoResult<Decimal> {
    let text: String = row.get(column)?;
    text.parse().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid decimal value `{text}` in line_items.{column}"
        ))
    })
}

fn parse_bool_column(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in line_items.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_line_item_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = crate::db::migrations::latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    ensure_table(conn, "line_items")?;
    for column in [
        "uuid",
        "document_uuid",
        "quantity",
        "price",
        "row_version",
        "is_deleted",
    ] {
        ensure_column(conn, "line_items", column)?;
    }

    Ok(())
}

fn ensure_table(conn: &Connection, table: &'static str) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable(table));
    }
    Ok(())
}

fn ensure_column(conn: &Connection, table: &'static str, column: &'static str) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(
                SELECT 1
                FROM pragma_table_info('{table}')
                WHERE name = ?1
            );"
        ),
        [column],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredColumn { table, column });
    }
    Ok(())
}
