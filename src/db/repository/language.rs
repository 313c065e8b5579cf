use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::Language;

/// Look up a target language by ISO code. Unknown codes come back as `None`
/// so callers can reject them before any record is created.
pub fn get_language(conn: &Connection, code: &str) -> Result<Option<Language>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT code, name FROM languages WHERE code = ?1")?;

    let result = stmt.query_row(params![code], |row| {
        Ok(Language {
            code: row.get(0)?,
            name: row.get(1)?,
        })
    });

    match result {
        Ok(lang) => Ok(Some(lang)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_languages(conn: &Connection) -> Result<Vec<Language>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT code, name FROM languages ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok(Language {
            code: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut languages = Vec::new();
    for row in rows {
        languages.push(row?);
    }
    Ok(languages)
}
