use std::sync::Arc;

use tavira::application::ports::{JobRepository, UsageRepository};
use tavira::application::services::{
    JobProcessor, ProcessorError, SttDiarizeProcessor, SttProcessor, TextChunker, TtsProcessor,
};
use tavira::domain::{Job, JobType, UserId};

use super::support::{
    ENHANCER_COMPLETION_TOKENS, ENHANCER_PROMPT_TOKENS, FailingSynthesizer, FixedEnhancer,
    FixedSynthesizer, FixedTranscriptionEngine, FlakyEnhancer, RecordingFileStore, fixture,
    make_wav,
};

async fn submitted_job(
    f: &super::support::Fixture,
    user: UserId,
    job_type: JobType,
    parameters: serde_json::Value,
) -> Job {
    let job_id = f.admission.submit(user, job_type, parameters).await.unwrap();
    f.jobs.get_by_id(job_id).await.unwrap().unwrap()
}

#[tokio::test]
async fn given_stt_job_when_processed_then_transcript_and_provider_duration_are_reported() {
    let f = fixture();
    let store = Arc::new(RecordingFileStore::with_audio(b"audio bytes".to_vec()));
    let engine = Arc::new(FixedTranscriptionEngine {
        phrases: vec!["Hello from the meeting.".to_string()],
        duration_milliseconds: 45_600,
    });
    let processor = SttProcessor::new(store.clone(), engine, f.recorder.clone());

    let user = UserId::new();
    let job = submitted_job(&f, user, JobType::Stt, serde_json::json!({ "file_id": "audio-1" })).await;

    let result = processor.process(&job).await.unwrap();

    assert_eq!(result["transcript"], "Hello from the meeting.");
    assert_eq!(result["seconds_processed"].as_f64().unwrap(), 45.6);

    let records = f.usage.all_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metrics.audio_seconds_processed, 45.6);
    assert_eq!(records[0].model_used.as_deref(), Some("ms_stt"));

    assert_eq!(store.deleted(), vec!["audio-1".to_string()]);
}

#[tokio::test]
async fn given_cleanup_failure_when_transcription_succeeded_then_job_still_completes() {
    let f = fixture();
    let store =
        Arc::new(RecordingFileStore::with_audio(b"audio bytes".to_vec()).failing_deletes());
    let engine = Arc::new(FixedTranscriptionEngine {
        phrases: vec!["Still here.".to_string()],
        duration_milliseconds: 2_000,
    });
    let processor = SttProcessor::new(store, engine, f.recorder.clone());

    let user = UserId::new();
    let job = submitted_job(&f, user, JobType::Stt, serde_json::json!({ "file_id": "audio-1" })).await;

    let result = processor.process(&job).await.unwrap();

    assert_eq!(result["transcript"], "Still here.");
    assert_eq!(f.usage.all_records()[0].metrics.audio_seconds_processed, 2.0);
}

#[tokio::test]
async fn given_malformed_parameters_when_processing_then_the_job_fails_as_an_input_error() {
    let f = fixture();
    let store = Arc::new(RecordingFileStore::with_audio(Vec::new()));
    let engine = Arc::new(FixedTranscriptionEngine {
        phrases: Vec::new(),
        duration_milliseconds: 0,
    });
    let processor = SttProcessor::new(store, engine, f.recorder.clone());

    let job = Job::new(JobType::Stt, UserId::new(), serde_json::json!({ "wrong": true }));

    let result = processor.process(&job).await;

    assert!(matches!(result, Err(ProcessorError::InvalidParameters(_))));
}

#[tokio::test]
async fn given_diarize_job_within_token_budget_when_processed_then_single_enhancement_call_is_split_billed()
 {
    let f = fixture();
    let store = Arc::new(RecordingFileStore::with_audio(b"audio bytes".to_vec()));
    let engine = Arc::new(FixedTranscriptionEngine {
        phrases: vec!["First phrase.".to_string(), "Second phrase.".to_string()],
        duration_milliseconds: 120_000,
    });
    let enhancer = Arc::new(FixedEnhancer::new());
    let processor = SttDiarizeProcessor::new(
        store,
        engine,
        enhancer.clone(),
        f.recorder.clone(),
        TextChunker::new(8_000, 400),
        3_000,
    );

    let user = UserId::new();
    let job = submitted_job(
        &f,
        user,
        JobType::SttDiarize,
        serde_json::json!({ "file_id": "audio-2" }),
    )
    .await;
    let audit_id = f.usage.all_records()[0].api_log_id.unwrap();

    let result = processor.process(&job).await.unwrap();

    assert_eq!(enhancer.calls(), vec![(0, 1)]);
    assert_eq!(
        result["transcript"],
        "Speaker 1: First phrase. Second phrase."
    );
    assert_eq!(result["seconds_processed"].as_f64().unwrap(), 120.0);
    assert_eq!(result["chunks"], 1);

    let rows = f.usage.list_by_audit(audit_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    let recognizer = rows
        .iter()
        .find(|r| r.model_used.as_deref() == Some("ms_stt"))
        .unwrap();
    assert_eq!(recognizer.metrics.audio_seconds_processed, 120.0);
    assert_eq!(recognizer.metrics.total_tokens, 0);
    let enhancement = rows
        .iter()
        .find(|r| r.model_used.as_deref() == Some("llm_enhance"))
        .unwrap();
    assert_eq!(enhancement.metrics.audio_seconds_processed, 0.0);
    assert_eq!(enhancement.metrics.prompt_tokens, ENHANCER_PROMPT_TOKENS);
    assert_eq!(f.usage.primary_usage_of(audit_id), Some(recognizer.id));
}

#[tokio::test]
async fn given_long_transcript_when_diarizing_then_chunks_are_enhanced_in_order_and_usage_sums() {
    let f = fixture();
    let sentence = "This transcript goes on and on about quarterly planning. ";
    let engine = Arc::new(FixedTranscriptionEngine {
        phrases: vec![sentence.repeat(8)],
        duration_milliseconds: 600_000,
    });
    let store = Arc::new(RecordingFileStore::with_audio(b"audio bytes".to_vec()));
    let enhancer = Arc::new(FixedEnhancer::new());
    // A tiny token budget forces the chunked path.
    let processor = SttDiarizeProcessor::new(
        store,
        engine,
        enhancer.clone(),
        f.recorder.clone(),
        TextChunker::new(120, 20),
        5,
    );

    let user = UserId::new();
    let job = submitted_job(
        &f,
        user,
        JobType::SttDiarize,
        serde_json::json!({ "file_id": "audio-3" }),
    )
    .await;
    let audit_id = f.usage.all_records()[0].api_log_id.unwrap();

    let result = processor.process(&job).await.unwrap();

    let calls = enhancer.calls();
    assert!(calls.len() >= 2, "expected the chunked path");
    let total = calls.len();
    for (position, call) in calls.iter().enumerate() {
        assert_eq!(*call, (position, total));
    }
    assert_eq!(result["chunks"], total as u64);

    let rows = f.usage.list_by_audit(audit_id).await.unwrap();
    let enhancement = rows
        .iter()
        .find(|r| r.model_used.as_deref() == Some("llm_enhance"))
        .unwrap();
    assert_eq!(
        enhancement.metrics.prompt_tokens,
        ENHANCER_PROMPT_TOKENS * total as i64
    );
    assert_eq!(
        enhancement.metrics.completion_tokens,
        ENHANCER_COMPLETION_TOKENS * total as i64
    );
}

#[tokio::test]
async fn given_enhancement_failure_mid_chunks_when_diarizing_then_nothing_is_partially_committed() {
    let f = fixture();
    let sentence = "Another long transcript about incident retrospectives. ";
    let engine = Arc::new(FixedTranscriptionEngine {
        phrases: vec![sentence.repeat(8)],
        duration_milliseconds: 300_000,
    });
    let store = Arc::new(RecordingFileStore::with_audio(b"audio bytes".to_vec()));
    let enhancer = Arc::new(FlakyEnhancer::failing_after(1));
    let processor = SttDiarizeProcessor::new(
        store,
        engine,
        enhancer,
        f.recorder.clone(),
        TextChunker::new(120, 20),
        5,
    );

    let user = UserId::new();
    let job = submitted_job(
        &f,
        user,
        JobType::SttDiarize,
        serde_json::json!({ "file_id": "audio-4" }),
    )
    .await;

    let result = processor.process(&job).await;

    assert!(matches!(result, Err(ProcessorError::Enhancement(_))));
    // The provisional row is untouched: still one record, still zeroed.
    let records = f.usage.all_records();
    assert_eq!(records.len(), 1);
    assert!(records[0].model_used.is_none());
    assert_eq!(records[0].metrics.audio_seconds_processed, 0.0);
}

#[tokio::test]
async fn given_tts_job_when_processed_then_container_duration_and_prompt_tokens_are_billed() {
    let f = fixture();
    let store = Arc::new(RecordingFileStore::with_audio(Vec::new()));
    // Half a second of 16 kHz mono PCM.
    let synthesizer = Arc::new(FixedSynthesizer {
        audio: make_wav(16_000, 8_000),
    });
    let processor = TtsProcessor::new(
        store.clone(),
        synthesizer,
        f.recorder.clone(),
        "en-US-JennyNeural",
    );

    let user = UserId::new();
    let job = submitted_job(
        &f,
        user,
        JobType::Tts,
        serde_json::json!({ "text": "Hello out there" }),
    )
    .await;

    let result = processor.process(&job).await.unwrap();

    assert!((result["seconds_processed"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(result["file_id"], "out-1");
    assert!(result["prompt_tokens"].as_i64().unwrap() > 0);
    assert_eq!(store.uploads().len(), 1);

    let records = f.usage.all_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].model_used.as_deref(), Some("ms_tts"));
    assert!((records[0].metrics.audio_seconds_processed - 0.5).abs() < 1e-9);
    assert_eq!(records[0].metrics.files_uploaded, 1);
    assert!(records[0].metrics.prompt_tokens > 0);
}

#[tokio::test]
async fn given_synthesis_failure_when_processing_tts_then_job_fails_and_provisional_row_is_untouched()
 {
    let f = fixture();
    let store = Arc::new(RecordingFileStore::with_audio(Vec::new()));
    let processor = TtsProcessor::new(
        store,
        Arc::new(FailingSynthesizer),
        f.recorder.clone(),
        "en-US-JennyNeural",
    );

    let user = UserId::new();
    let job = submitted_job(
        &f,
        user,
        JobType::Tts,
        serde_json::json!({ "text": "Doomed request" }),
    )
    .await;

    let result = processor.process(&job).await;

    assert!(matches!(result, Err(ProcessorError::Synthesis(_))));
    let records = f.usage.all_records();
    assert_eq!(records.len(), 1);
    assert!(records[0].model_used.is_none());
    assert_eq!(records[0].metrics.audio_seconds_processed, 0.0);
}

#[tokio::test]
async fn given_empty_text_when_processing_tts_then_it_is_an_input_error() {
    let f = fixture();
    let store = Arc::new(RecordingFileStore::with_audio(Vec::new()));
    let processor = TtsProcessor::new(
        store,
        Arc::new(FailingSynthesizer),
        f.recorder.clone(),
        "en-US-JennyNeural",
    );

    let job = Job::new(
        JobType::Tts,
        UserId::new(),
        serde_json::json!({ "text": "   " }),
    );

    let result = processor.process(&job).await;

    assert!(matches!(result, Err(ProcessorError::InvalidParameters(_))));
}
