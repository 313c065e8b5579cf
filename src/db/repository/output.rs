use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{
    OutputRecord, PhaseStats, ProofreadStatus, Proposal, TranslationStatus,
};

const OUTPUT_COLUMNS: &str = "id, document_id, language_code, language_name, model, \
     translated_text, proofread_proposed_changes, proofread_original_translation, \
     translation_status, proofread_status, \
     translation_duration_ms, translation_output_tokens, \
     proofread_duration_ms, proofread_output_tokens, updated_at";

pub fn insert_output_record(conn: &Connection, record: &OutputRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO output_records (id, document_id, language_code, language_name, model,
             translated_text, proofread_proposed_changes, proofread_original_translation,
             translation_status, proofread_status,
             translation_duration_ms, translation_output_tokens,
             proofread_duration_ms, proofread_output_tokens, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            record.id.to_string(),
            record.document_id.to_string(),
            record.language_code,
            record.language_name,
            record.model,
            record.translated_text,
            serialize_proposal(record.proofread_proposed_changes.as_ref())?,
            record.proofread_original_translation,
            record.translation_status.as_str(),
            record.proofread_status.as_str(),
            record.translation_stats.map(|s| s.duration_ms),
            record.translation_stats.and_then(|s| s.output_tokens),
            record.proofread_stats.map(|s| s.duration_ms),
            record.proofread_stats.and_then(|s| s.output_tokens),
            record.updated_at,
        ],
    )?;
    Ok(())
}

/// Remove any prior record for this (document, language) pair. Reruns call
/// this before inserting the fresh record, so a language never accumulates
/// more than one row.
pub fn delete_output_for_language(
    conn: &Connection,
    document_id: &Uuid,
    language_code: &str,
) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM output_records WHERE document_id = ?1 AND language_code = ?2",
        params![document_id.to_string(), language_code],
    )?;
    if deleted > 0 {
        tracing::debug!(
            document_id = %document_id,
            language = language_code,
            "Replaced existing output record"
        );
    }
    Ok(())
}

pub fn get_output_record(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<OutputRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OUTPUT_COLUMNS} FROM output_records WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some(output_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_outputs_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<OutputRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OUTPUT_COLUMNS} FROM output_records
         WHERE document_id = ?1 ORDER BY language_code"
    ))?;

    let rows = stmt.query_map(params![document_id.to_string()], read_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(output_from_row(row?)?);
    }
    Ok(records)
}

// ─── Status transitions ───
//
// Each transition refreshes updated_at and reports whether a row matched.
// A fresh rerun deletes the old row first, so a runner still holding the
// old record id sees `false` here and must stop writing.

pub fn mark_translating(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records SET translation_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            TranslationStatus::Translating.as_str(),
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

pub fn complete_translation(
    conn: &Connection,
    id: &Uuid,
    translated_text: &str,
    stats: PhaseStats,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records
         SET translated_text = ?1, translation_status = ?2,
             translation_duration_ms = ?3, translation_output_tokens = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            translated_text,
            TranslationStatus::Completed.as_str(),
            stats.duration_ms,
            stats.output_tokens,
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

pub fn fail_translation(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records SET translation_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            TranslationStatus::Failed.as_str(),
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

/// Begin proofreading. Snapshots the current translation so the original
/// survives even after step 2 rewrites `translated_text`.
pub fn mark_proof_reading(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records
         SET proofread_status = ?1, proofread_original_translation = translated_text,
             updated_at = ?2
         WHERE id = ?3",
        params![
            ProofreadStatus::ProofReading.as_str(),
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

/// Persist the step-1 proposal and advance to the apply phase. The proposal
/// lands in storage before any apply work begins, so a crash between the two
/// steps never loses it.
pub fn store_proposal(
    conn: &Connection,
    id: &Uuid,
    proposal: &Proposal,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records
         SET proofread_proposed_changes = ?1, proofread_status = ?2, updated_at = ?3
         WHERE id = ?4",
        params![
            serialize_proposal(Some(proposal))?,
            ProofreadStatus::ApplyingProofread.as_str(),
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

pub fn complete_proofread(
    conn: &Connection,
    id: &Uuid,
    final_text: &str,
    stats: PhaseStats,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records
         SET translated_text = ?1, proofread_status = ?2,
             proofread_duration_ms = ?3, proofread_output_tokens = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            final_text,
            ProofreadStatus::Completed.as_str(),
            stats.duration_ms,
            stats.output_tokens,
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

pub fn fail_proofread(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE output_records SET proofread_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            ProofreadStatus::Failed.as_str(),
            Utc::now(),
            id.to_string()
        ],
    )?;
    Ok(updated == 1)
}

// ─── Row mapping ───

struct OutputRow {
    id: String,
    document_id: String,
    language_code: String,
    language_name: String,
    model: String,
    translated_text: Option<String>,
    proofread_proposed_changes: Option<String>,
    proofread_original_translation: Option<String>,
    translation_status: String,
    proofread_status: String,
    translation_duration_ms: Option<i64>,
    translation_output_tokens: Option<i64>,
    proofread_duration_ms: Option<i64>,
    proofread_output_tokens: Option<i64>,
    updated_at: DateTime<Utc>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutputRow> {
    Ok(OutputRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        language_code: row.get(2)?,
        language_name: row.get(3)?,
        model: row.get(4)?,
        translated_text: row.get(5)?,
        proofread_proposed_changes: row.get(6)?,
        proofread_original_translation: row.get(7)?,
        translation_status: row.get(8)?,
        proofread_status: row.get(9)?,
        translation_duration_ms: row.get(10)?,
        translation_output_tokens: row.get(11)?,
        proofread_duration_ms: row.get(12)?,
        proofread_output_tokens: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn output_from_row(row: OutputRow) -> Result<OutputRecord, DatabaseError> {
    Ok(OutputRecord {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        document_id: Uuid::parse_str(&row.document_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        language_code: row.language_code,
        language_name: row.language_name,
        model: row.model,
        translated_text: row.translated_text,
        proofread_proposed_changes: row
            .proofread_proposed_changes
            .as_deref()
            .map(deserialize_proposal)
            .transpose()?,
        proofread_original_translation: row.proofread_original_translation,
        translation_status: row.translation_status.parse::<TranslationStatus>()?,
        proofread_status: row.proofread_status.parse::<ProofreadStatus>()?,
        translation_stats: row.translation_duration_ms.map(|duration_ms| PhaseStats {
            duration_ms,
            output_tokens: row.translation_output_tokens,
        }),
        proofread_stats: row.proofread_duration_ms.map(|duration_ms| PhaseStats {
            duration_ms,
            output_tokens: row.proofread_output_tokens,
        }),
        updated_at: row.updated_at,
    })
}

fn serialize_proposal(proposal: Option<&Proposal>) -> Result<Option<String>, DatabaseError> {
    proposal
        .map(|p| {
            serde_json::to_string(p)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
        })
        .transpose()
}

// A stored proposal is always written through `serialize_proposal`, so a
// column that fails to parse is corruption, not a raw-text proposal.
fn deserialize_proposal(raw: &str) -> Result<Proposal, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
