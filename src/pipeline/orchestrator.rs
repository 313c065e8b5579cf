//! Fan-out across target languages.
//!
//! Each run replaces the records for its requested languages, then
//! launches one task per language and awaits them as a set in the
//! background. The replace happens before any task starts, so a task
//! from an earlier run that is still in flight finds its record gone
//! and stops writing.

use tokio::task::JoinSet;

use crate::db::{repository, with_retry};
use crate::models::{Document, Language, OutputRecord, ProofreadStatus};

use super::{proofread, translate, PipelineContext, PipelineError};

/// Start a run over the given languages: replace each record, then spawn
/// the language tasks. Returns the fresh records once they are all
/// persisted; the phase work continues in the background.
///
/// An `instruction` replaces the built-in phase instructions for every
/// language in the run. Rerunning a single language is the same call
/// with a one-element list.
pub async fn start_run(
    ctx: &PipelineContext,
    document: Document,
    languages: Vec<Language>,
    model: &str,
    proofread: bool,
    instruction: Option<String>,
) -> Result<Vec<OutputRecord>, PipelineError> {
    let mut records = Vec::with_capacity(languages.len());
    for language in &languages {
        let document_id = document.id;
        let record = with_retry(&ctx.retry, "replace_output_record", || {
            let conn = ctx.store.connect()?;
            repository::delete_output_for_language(&conn, &document_id, &language.code)?;
            let record = OutputRecord::new(document_id, language, model, proofread);
            repository::insert_output_record(&conn, &record)?;
            Ok(record)
        })
        .await?;
        records.push(record);
    }

    tracing::info!(
        document_id = %document.id,
        languages = records.len(),
        model,
        "Run started"
    );

    // Phase failures are terminal for the record and logged in the
    // task; they never surface to the caller that triggered the run.
    let mut tasks = JoinSet::new();
    for record in &records {
        let ctx = ctx.clone();
        let document = document.clone();
        let record = record.clone();
        let instruction = instruction.clone();
        tasks.spawn(async move {
            if let Err(e) = run_language(&ctx, &document, &record, instruction.as_deref()).await {
                tracing::warn!(
                    document_id = %document.id,
                    language = %record.language_code,
                    error = %e,
                    "Language run ended in failure"
                );
            }
        });
    }

    // The set is drained off the request path; callers only wait for
    // the records above.
    let document_id = document.id;
    tokio::spawn(async move {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(
                    document_id = %document_id,
                    error = %e,
                    "Language task panicked"
                );
            }
        }
        tracing::info!(document_id = %document_id, "Run settled");
    });

    Ok(records)
}

async fn run_language(
    ctx: &PipelineContext,
    document: &Document,
    record: &OutputRecord,
    instruction: Option<&str>,
) -> Result<(), PipelineError> {
    let Some(translated) = translate::run_translation(ctx, document, record, instruction).await?
    else {
        return Ok(());
    };
    if record.proofread_status == ProofreadStatus::Skipped {
        return Ok(());
    }
    proofread::run_proofread(ctx, document, record, &translated, instruction).await?;
    Ok(())
}
