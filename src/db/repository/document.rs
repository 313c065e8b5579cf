use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Document;

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, title, source_text, source_language, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            doc.id.to_string(),
            doc.title,
            doc.source_text,
            doc.source_language,
            doc.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, source_text, source_language, created_at
         FROM documents WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(DocumentRow {
            id: row.get::<_, String>(0)?,
            title: row.get::<_, String>(1)?,
            source_text: row.get::<_, String>(2)?,
            source_language: row.get::<_, Option<String>>(3)?,
            created_at: row.get::<_, DateTime<Utc>>(4)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_documents(conn: &Connection) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, source_text, source_language, created_at
         FROM documents ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(DocumentRow {
            id: row.get::<_, String>(0)?,
            title: row.get::<_, String>(1)?,
            source_text: row.get::<_, String>(2)?,
            source_language: row.get::<_, Option<String>>(3)?,
            created_at: row.get::<_, DateTime<Utc>>(4)?,
        })
    })?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Delete a document. Its output records go with it via ON DELETE CASCADE.
pub fn delete_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM documents WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        });
    }
    tracing::info!(document_id = %id, "Document deleted with its output records");
    Ok(())
}

// Internal row type for Document mapping
struct DocumentRow {
    id: String,
    title: String,
    source_text: String,
    source_language: Option<String>,
    created_at: DateTime<Utc>,
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        title: row.title,
        source_text: row.source_text,
        source_language: row.source_language,
        created_at: row.created_at,
    })
}
