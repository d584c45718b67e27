use tavira::application::ports::UsageRepository;
use tavira::domain::{JobType, TokenUsage, UsageId, UsageMetrics, UsageRecord, UserId};

use super::support::fixture;

const ENHANCER_TAG: &str = "llm_enhance";
const RECOGNIZER_TAG: &str = "ms_stt";

#[tokio::test]
async fn given_explicit_usage_reference_when_reconciling_then_that_row_is_updated_in_place() {
    let f = fixture();
    let user = UserId::new();

    let audit_id = f.usage.open_audit(user, f.stt_endpoint).await.unwrap();
    let provisional = UsageRecord::provisional(user, f.stt_endpoint, audit_id);
    f.usage.insert(&provisional).await.unwrap();

    let reconciled = f
        .recorder
        .reconcile(
            user,
            JobType::Stt,
            RECOGNIZER_TAG,
            UsageMetrics::audio_seconds(45.6),
            Some(provisional.id),
        )
        .await
        .unwrap();

    assert_eq!(reconciled, provisional.id);
    let records = f.usage.all_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metrics.audio_seconds_processed, 45.6);
    assert_eq!(records[0].model_used.as_deref(), Some(RECOGNIZER_TAG));
}

#[tokio::test]
async fn given_no_usage_reference_when_reconciling_then_the_recent_provisional_row_is_found() {
    let f = fixture();
    let user = UserId::new();

    let audit_id = f.usage.open_audit(user, f.stt_endpoint).await.unwrap();
    let provisional = UsageRecord::provisional(user, f.stt_endpoint, audit_id);
    f.usage.insert(&provisional).await.unwrap();

    let reconciled = f
        .recorder
        .reconcile(
            user,
            JobType::Stt,
            RECOGNIZER_TAG,
            UsageMetrics::audio_seconds(12.0),
            None,
        )
        .await
        .unwrap();

    assert_eq!(reconciled, provisional.id);
}

#[tokio::test]
async fn given_no_provisional_row_when_reconciling_then_a_fallback_row_is_inserted() {
    let f = fixture();
    let user = UserId::new();

    let reconciled = f
        .recorder
        .reconcile(
            user,
            JobType::Stt,
            RECOGNIZER_TAG,
            UsageMetrics::audio_seconds(7.5),
            None,
        )
        .await
        .unwrap();

    let records = f.usage.all_records();
    assert_eq!(records.len(), 1, "measured usage must never be lost");
    assert_eq!(records[0].id, reconciled);
    assert_eq!(records[0].metrics.audio_seconds_processed, 7.5);
    assert!(records[0].api_log_id.is_none());
}

#[tokio::test]
async fn given_dangling_usage_reference_when_reconciling_then_the_window_search_still_finds_the_row()
 {
    let f = fixture();
    let user = UserId::new();

    let audit_id = f.usage.open_audit(user, f.stt_endpoint).await.unwrap();
    let provisional = UsageRecord::provisional(user, f.stt_endpoint, audit_id);
    f.usage.insert(&provisional).await.unwrap();

    let reconciled = f
        .recorder
        .reconcile(
            user,
            JobType::Stt,
            RECOGNIZER_TAG,
            UsageMetrics::audio_seconds(3.2),
            Some(UsageId::new()),
        )
        .await
        .unwrap();

    assert_eq!(reconciled, provisional.id);
}

#[tokio::test]
async fn given_split_reconciliation_then_exactly_two_rows_share_the_audit_reference() {
    let f = fixture();
    let user = UserId::new();

    let audit_id = f
        .usage
        .open_audit(user, f.stt_diarize_endpoint)
        .await
        .unwrap();
    let provisional = UsageRecord::provisional(user, f.stt_diarize_endpoint, audit_id);
    f.usage.insert(&provisional).await.unwrap();
    f.usage
        .set_primary_usage(audit_id, provisional.id)
        .await
        .unwrap();

    let tokens = TokenUsage {
        prompt_tokens: 300,
        completion_tokens: 120,
        total_tokens: 420,
        cached_tokens: 30,
    };
    let (recognizer_id, enhancer_id) = f
        .recorder
        .reconcile_split(
            user,
            JobType::SttDiarize,
            61.2,
            tokens,
            Some(provisional.id),
        )
        .await
        .unwrap();

    let rows = f.usage.list_by_audit(audit_id).await.unwrap();
    assert_eq!(rows.len(), 2, "the provisional row must be replaced by exactly two");

    let recognizer = rows.iter().find(|r| r.id == recognizer_id).unwrap();
    assert_eq!(recognizer.model_used.as_deref(), Some(RECOGNIZER_TAG));
    assert_eq!(recognizer.metrics.audio_seconds_processed, 61.2);
    assert_eq!(recognizer.metrics.prompt_tokens, 0);
    assert_eq!(recognizer.metrics.total_tokens, 0);

    let enhancer = rows.iter().find(|r| r.id == enhancer_id).unwrap();
    assert_eq!(enhancer.model_used.as_deref(), Some(ENHANCER_TAG));
    assert_eq!(enhancer.metrics.audio_seconds_processed, 0.0);
    assert_eq!(enhancer.metrics.prompt_tokens, 300);
    assert_eq!(enhancer.metrics.completion_tokens, 120);
    assert_eq!(enhancer.metrics.total_tokens, 420);
    assert_eq!(enhancer.metrics.cached_tokens, 30);

    // The original row is gone and the audit entry points at the recognizer
    // share.
    assert!(f.usage.get_by_id(provisional.id).await.unwrap().is_none());
    assert_eq!(f.usage.primary_usage_of(audit_id), Some(recognizer_id));
}
