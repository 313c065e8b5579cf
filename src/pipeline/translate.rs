//! Translation phase runner.

use std::time::Instant;

use crate::db::{repository, with_retry};
use crate::gateway::GenerationRequest;
use crate::models::{Document, OutputRecord, PhaseStats};

use super::{prompt, PipelineContext, PipelineError};

/// Run the translation phase for one record.
///
/// Returns the translated text, or `None` when the record was replaced by
/// a newer run mid-flight; the caller stops quietly in that case. A failed
/// generation marks the record failed and propagates; it is never retried.
/// A caller-supplied `instruction` replaces the built-in translation
/// instruction.
pub async fn run_translation(
    ctx: &PipelineContext,
    document: &Document,
    record: &OutputRecord,
    instruction: Option<&str>,
) -> Result<Option<String>, PipelineError> {
    let matched = with_retry(&ctx.retry, "mark_translating", || {
        let conn = ctx.store.connect()?;
        repository::mark_translating(&conn, &record.id)
    })
    .await?;
    if !matched {
        tracing::debug!(record_id = %record.id, "Record replaced before translation began");
        return Ok(None);
    }

    tracing::info!(
        document_id = %document.id,
        language = %record.language_code,
        model = %record.model,
        "Translating"
    );

    // Full-document outputs stream; only the short propose call is plain.
    let started = Instant::now();
    let instruction = match instruction {
        Some(custom) => custom.to_string(),
        None => prompt::translation_instruction(&record.language_name),
    };
    let request =
        GenerationRequest::new(&record.model, &instruction, &document.source_text).streamed();

    let generation = match ctx.generator.generate(request).await {
        Ok(generation) => generation,
        Err(e) => {
            tracing::warn!(
                document_id = %document.id,
                language = %record.language_code,
                elapsed_ms = started.elapsed().as_millis() as i64,
                error = %e,
                "Translation generation failed"
            );
            with_retry(&ctx.retry, "fail_translation", || {
                let conn = ctx.store.connect()?;
                repository::fail_translation(&conn, &record.id)
            })
            .await?;
            return Err(e.into());
        }
    };

    let translated = generation.text.trim().to_string();
    let stats = PhaseStats {
        duration_ms: started.elapsed().as_millis() as i64,
        output_tokens: generation.output_tokens,
    };

    let matched = with_retry(&ctx.retry, "complete_translation", || {
        let conn = ctx.store.connect()?;
        repository::complete_translation(&conn, &record.id, &translated, stats)
    })
    .await?;
    if !matched {
        tracing::debug!(record_id = %record.id, "Record replaced during translation");
        return Ok(None);
    }

    tracing::info!(
        document_id = %document.id,
        language = %record.language_code,
        elapsed_ms = stats.duration_ms,
        "Translation completed"
    );
    Ok(Some(translated))
}
