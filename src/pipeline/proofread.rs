//! Proofreading phase runner: propose, then apply.

use std::time::Instant;

use crate::db::{repository, with_retry};
use crate::gateway::{ChatTurn, GatewayError, GenerationRequest};
use crate::models::{Document, OutputRecord, PhaseStats};

use super::{prompt, proposal, PipelineContext, PipelineError};

/// Run both proofread steps for a record whose translation just completed.
///
/// Step 1 presents the source text beside the translation and asks for
/// structured corrections, persisting whatever came back, structured or
/// raw; extraction never fails the phase. Step 2 replays the step-1
/// exchange as prior turns and asks for the corrected text, which
/// replaces the stored translation. Returns `None` when the record was
/// replaced by a newer run mid-flight. A caller-supplied `instruction`
/// replaces the built-in one for both steps.
pub async fn run_proofread(
    ctx: &PipelineContext,
    document: &Document,
    record: &OutputRecord,
    translated_text: &str,
    instruction: Option<&str>,
) -> Result<Option<()>, PipelineError> {
    let matched = with_retry(&ctx.retry, "mark_proof_reading", || {
        let conn = ctx.store.connect()?;
        repository::mark_proof_reading(&conn, &record.id)
    })
    .await?;
    if !matched {
        tracing::debug!(record_id = %record.id, "Record replaced before proofreading began");
        return Ok(None);
    }

    tracing::info!(
        document_id = %record.document_id,
        language = %record.language_code,
        model = %record.model,
        "Proofreading"
    );

    let started = Instant::now();
    let instruction = match instruction {
        Some(custom) => custom.to_string(),
        None => prompt::proofread_instruction(&record.language_name),
    };
    let propose_input = prompt::propose_input(&document.source_text, translated_text);

    let propose_request = GenerationRequest::new(&record.model, &instruction, &propose_input);
    let proposed = match ctx.generator.generate(propose_request).await {
        Ok(generation) => generation,
        Err(e) => return fail(ctx, record, "propose", started, e).await,
    };

    let proposal = proposal::parse_proposal(&proposed.text);
    let matched = with_retry(&ctx.retry, "store_proposal", || {
        let conn = ctx.store.connect()?;
        repository::store_proposal(&conn, &record.id, &proposal)
    })
    .await?;
    if !matched {
        tracing::debug!(record_id = %record.id, "Record replaced during proofreading");
        return Ok(None);
    }

    // The apply call sees the propose exchange as its own prior turns.
    let apply_request = GenerationRequest::new(&record.model, &instruction, prompt::apply_input())
        .with_history(vec![
            ChatTurn::user(propose_input),
            ChatTurn::assistant(proposed.text.clone()),
        ])
        .streamed();
    let applied = match ctx.generator.generate(apply_request).await {
        Ok(generation) => generation,
        Err(e) => return fail(ctx, record, "apply", started, e).await,
    };

    let final_text = applied.text.trim().to_string();
    let stats = PhaseStats {
        duration_ms: started.elapsed().as_millis() as i64,
        output_tokens: combined_tokens(proposed.output_tokens, applied.output_tokens),
    };

    let matched = with_retry(&ctx.retry, "complete_proofread", || {
        let conn = ctx.store.connect()?;
        repository::complete_proofread(&conn, &record.id, &final_text, stats)
    })
    .await?;
    if !matched {
        tracing::debug!(record_id = %record.id, "Record replaced during proofreading");
        return Ok(None);
    }

    tracing::info!(
        document_id = %record.document_id,
        language = %record.language_code,
        elapsed_ms = stats.duration_ms,
        "Proofreading completed"
    );
    Ok(Some(()))
}

async fn fail(
    ctx: &PipelineContext,
    record: &OutputRecord,
    step: &'static str,
    started: Instant,
    e: GatewayError,
) -> Result<Option<()>, PipelineError> {
    tracing::warn!(
        document_id = %record.document_id,
        language = %record.language_code,
        step,
        elapsed_ms = started.elapsed().as_millis() as i64,
        error = %e,
        "Proofread generation failed"
    );
    with_retry(&ctx.retry, "fail_proofread", || {
        let conn = ctx.store.connect()?;
        repository::fail_proofread(&conn, &record.id)
    })
    .await?;
    Err(e.into())
}

fn combined_tokens(propose: Option<i64>, apply: Option<i64>) -> Option<i64> {
    match (propose, apply) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{repository, RetryPolicy, Store};
    use crate::gateway::MockGenerator;
    use crate::models::{Document, Language, ProofreadStatus, Proposal};
    use std::sync::Arc;

    const PROPOSE_REPLY: &str = "Here you go:\n```json\n[{\"original\": \"Texto orignal.\", \"change\": \"Texto original.\", \"reason\": \"typo\"}]\n```";

    fn test_ctx(generator: Arc<MockGenerator>) -> (PipelineContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        let ctx = PipelineContext {
            store,
            generator,
            retry: RetryPolicy {
                max_attempts: 3,
                delays_ms: vec![1, 1],
                jitter: false,
            },
        };
        (ctx, dir)
    }

    fn seed_translated_record(ctx: &PipelineContext) -> (Document, OutputRecord) {
        let conn = ctx.store.connect().unwrap();
        let doc = Document::new("Report", "Original body", None);
        repository::insert_document(&conn, &doc).unwrap();
        let language = Language {
            code: "es".into(),
            name: "Spanish".into(),
        };
        let record = OutputRecord::new(doc.id, &language, "gpt-4o-mini", true);
        repository::insert_output_record(&conn, &record).unwrap();
        repository::complete_translation(
            &conn,
            &record.id,
            "Texto orignal.",
            PhaseStats {
                duration_ms: 10,
                output_tokens: Some(4),
            },
        )
        .unwrap();
        (doc, record)
    }

    #[tokio::test]
    async fn full_proofread_replaces_text_and_stores_proposal() {
        let mock = Arc::new(
            MockGenerator::new()
                .with_reply(PROPOSE_REPLY)
                .with_reply("Texto original."),
        );
        let (ctx, _dir) = test_ctx(mock.clone());
        let (doc, record) = seed_translated_record(&ctx);

        let outcome = run_proofread(&ctx, &doc, &record, "Texto orignal.", None)
            .await
            .unwrap();
        assert!(outcome.is_some());

        let conn = ctx.store.connect().unwrap();
        let fetched = repository::get_output_record(&conn, &record.id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.proofread_status, ProofreadStatus::Completed);
        assert_eq!(fetched.translated_text.as_deref(), Some("Texto original."));
        assert_eq!(
            fetched.proofread_original_translation.as_deref(),
            Some("Texto orignal.")
        );
        match fetched.proofread_proposed_changes.unwrap() {
            Proposal::Changes(changes) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].reason, "typo");
            }
            Proposal::Raw(raw) => panic!("expected structured proposal, got {raw}"),
        }
        // Both scripted replies carry 7 tokens each
        assert_eq!(fetched.proofread_stats.unwrap().output_tokens, Some(14));
    }

    #[tokio::test]
    async fn apply_request_replays_propose_exchange() {
        let mock = Arc::new(
            MockGenerator::new()
                .with_reply(PROPOSE_REPLY)
                .with_reply("Texto original."),
        );
        let (ctx, _dir) = test_ctx(mock.clone());
        let (doc, record) = seed_translated_record(&ctx);

        run_proofread(&ctx, &doc, &record, "Texto orignal.", None)
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);

        let propose = &requests[0];
        assert!(propose.history.is_empty());
        assert!(propose.input.contains("Original body"));
        assert!(propose.input.contains("Texto orignal."));
        assert!(!propose.stream);

        let apply = &requests[1];
        assert_eq!(apply.history.len(), 2);
        assert_eq!(apply.history[0].content, propose.input);
        assert_eq!(apply.history[1].content, PROPOSE_REPLY);
        assert_eq!(apply.input, prompt::apply_input());
        assert_eq!(apply.instruction, propose.instruction);
        assert!(apply.stream);
    }

    #[tokio::test]
    async fn prose_proposal_is_carried_raw_and_phase_completes() {
        let mock = Arc::new(
            MockGenerator::new()
                .with_reply("The translation reads well, only minor polish needed.")
                .with_reply("Texto final."),
        );
        let (ctx, _dir) = test_ctx(mock);
        let (doc, record) = seed_translated_record(&ctx);

        run_proofread(&ctx, &doc, &record, "Texto orignal.", None)
            .await
            .unwrap();

        let conn = ctx.store.connect().unwrap();
        let fetched = repository::get_output_record(&conn, &record.id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.proofread_status, ProofreadStatus::Completed);
        assert_eq!(
            fetched.proofread_proposed_changes,
            Some(Proposal::Raw(
                "The translation reads well, only minor polish needed.".into()
            ))
        );
        assert_eq!(fetched.translated_text.as_deref(), Some("Texto final."));
    }

    #[tokio::test]
    async fn propose_failure_marks_failed_and_skips_apply() {
        let mock = Arc::new(MockGenerator::new().failing_when("propose corrections"));
        let (ctx, _dir) = test_ctx(mock.clone());
        let (doc, record) = seed_translated_record(&ctx);

        let result = run_proofread(&ctx, &doc, &record, "Texto orignal.", None).await;
        assert!(result.is_err());

        let conn = ctx.store.connect().unwrap();
        let fetched = repository::get_output_record(&conn, &record.id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.proofread_status, ProofreadStatus::Failed);
        assert!(fetched.proofread_proposed_changes.is_none());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn apply_failure_marks_failed_but_keeps_proposal() {
        let mock = Arc::new(
            MockGenerator::new()
                .with_reply(PROPOSE_REPLY)
                .failing_when("apply the corrections"),
        );
        let (ctx, _dir) = test_ctx(mock.clone());
        let (doc, record) = seed_translated_record(&ctx);

        let result = run_proofread(&ctx, &doc, &record, "Texto orignal.", None).await;
        assert!(result.is_err());

        let conn = ctx.store.connect().unwrap();
        let fetched = repository::get_output_record(&conn, &record.id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.proofread_status, ProofreadStatus::Failed);
        assert!(matches!(
            fetched.proofread_proposed_changes,
            Some(Proposal::Changes(_))
        ));
        assert_eq!(
            fetched.proofread_original_translation.as_deref(),
            Some("Texto orignal.")
        );
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn replaced_record_abandons_before_generating() {
        let mock = Arc::new(MockGenerator::new());
        let (ctx, _dir) = test_ctx(mock.clone());
        let (doc, record) = seed_translated_record(&ctx);

        let conn = ctx.store.connect().unwrap();
        repository::delete_output_for_language(&conn, &record.document_id, "es").unwrap();
        drop(conn);

        let outcome = run_proofread(&ctx, &doc, &record, "Texto orignal.", None)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn caller_instruction_replaces_the_default() {
        let mock = Arc::new(
            MockGenerator::new()
                .with_reply(PROPOSE_REPLY)
                .with_reply("Texto original."),
        );
        let (ctx, _dir) = test_ctx(mock.clone());
        let (doc, record) = seed_translated_record(&ctx);

        run_proofread(
            &ctx,
            &doc,
            &record,
            "Texto orignal.",
            Some("Use formal register throughout."),
        )
        .await
        .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].instruction, "Use formal register throughout.");
        assert_eq!(requests[1].instruction, "Use formal register throughout.");
    }

    #[tokio::test]
    async fn failure_log_carries_elapsed_time() {
        #[derive(Clone, Default)]
        struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);
        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = Arc::new(MockGenerator::new().failing_when("propose corrections"));
        let (ctx, _dir) = test_ctx(mock);
        let (doc, record) = seed_translated_record(&ctx);

        let result = run_proofread(&ctx, &doc, &record, "Texto orignal.", None).await;
        assert!(result.is_err());

        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Proofread generation failed"));
        assert!(logs.contains("elapsed_ms"));
    }
}
