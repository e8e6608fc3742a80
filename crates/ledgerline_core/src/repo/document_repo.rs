//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `documents` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Document::validate()` before SQL mutations.
//! - Only active (`is_deleted=0`) documents are returned by default.

use crate::db::DbError;
use crate::model::document::{Document, DocumentValidationError};
use crate::model::line_item::DocumentId;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    uuid,
    number,
    partner_id,
    issued_at,
    note,
    is_deleted,
    created_at,
    updated_at,
    created_by,
    updated_by
FROM documents";

pub type DocumentRepoResult<T> = Result<T, DocumentRepoError>;

/// Repository error for document persistence and query operations.
#[derive(Debug)]
pub enum DocumentRepoError {
    Validation(DocumentValidationError),
    Db(DbError),
    NotFound(DocumentId),
    InvalidData(String),
}

impl Display for DocumentRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document data: {message}"),
        }
    }
}

impl Error for DocumentRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DocumentValidationError> for DocumentRepoError {
    fn from(value: DocumentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for DocumentRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DocumentRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentListQuery {
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for document CRUD operations.
pub trait DocumentRepository {
    fn create_document(&self, document: &Document, actor: Option<&str>)
        -> DocumentRepoResult<Document>;
    fn get_document(
        &self,
        id: DocumentId,
        include_deleted: bool,
    ) -> DocumentRepoResult<Option<Document>>;
    fn list_documents(&self, query: &DocumentListQuery) -> DocumentRepoResult<Vec<Document>>;
    fn soft_delete_document(&self, id: DocumentId) -> DocumentRepoResult<()>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_document(
        &self,
        document: &Document,
        actor: Option<&str>,
    ) -> DocumentRepoResult<Document> {
        document.validate()?;

        self.conn.execute(
            "INSERT INTO documents (
                uuid,
                number,
                partner_id,
                issued_at,
                note,
                is_deleted,
                created_by,
                updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6);",
            params![
                document.uuid.to_string(),
                document.number.as_str(),
                document.partner_id,
                document.issued_at,
                document.note.as_deref(),
                actor,
            ],
        )?;

        load_document(self.conn, document.uuid, true)?
            .ok_or(DocumentRepoError::NotFound(document.uuid))
    }

    fn get_document(
        &self,
        id: DocumentId,
        include_deleted: bool,
    ) -> DocumentRepoResult<Option<Document>> {
        load_document(self.conn, id, include_deleted)
    }

    fn list_documents(&self, query: &DocumentListQuery) -> DocumentRepoResult<Vec<Document>> {
        let mut sql = format!("{DOCUMENT_SELECT_SQL} WHERE 1 = 1");
        if !query.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        sql.push_str(" ORDER BY issued_at DESC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if query.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", query.offset));
            }
        } else if query.offset > 0 {
            sql.push_str(&format!(" LIMIT -1 OFFSET {}", query.offset));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }

        Ok(documents)
    }

    fn soft_delete_document(&self, id: DocumentId) -> DocumentRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(DocumentRepoError::NotFound(id));
        }

        Ok(())
    }
}

fn load_document(
    conn: &Connection,
    id: DocumentId,
    include_deleted: bool,
) -> DocumentRepoResult<Option<Document>> {
    let mut stmt = conn.prepare(&format!(
        "{DOCUMENT_SELECT_SQL}
         WHERE uuid = ?1
           AND (?2 = 1 OR is_deleted = 0);"
    ))?;

    let flag = i64::from(include_deleted);
    let mut rows = stmt.query(params![id.to_string(), flag])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_document_row(row)?));
    }

    Ok(None)
}

fn parse_document_row(row: &Row<'_>) -> DocumentRepoResult<Document> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        DocumentRepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in documents.uuid"
        ))
    })?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(DocumentRepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in documents.is_deleted"
            )));
        }
    };

    let document = Document {
        uuid,
        number: row.get("number")?,
        partner_id: row.get("partner_id")?,
        issued_at: row.get("issued_at")?,
        note: row.get("note")?,
        is_deleted,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        created_by: row.get("created_by")?,
        updated_by: row.get("updated_by")?,
    };
    document.validate()?;
    Ok(document)
}
