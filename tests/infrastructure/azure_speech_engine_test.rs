use axum::Router;
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use tavira::application::ports::{TranscriptionEngine, TranscriptionError};
use tavira::infrastructure::audio::AzureSpeechEngine;

async fn start_mock_speech_server(
    response_status: u16,
    response_body: &'static str,
) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new().route(
        "/speechtotext/transcriptions:transcribe",
        post(move || async move {
            let status = axum::http::StatusCode::from_u16(response_status).unwrap();
            (status, response_body).into_response()
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (base_url, shutdown_tx)
}

#[tokio::test]
async fn given_valid_audio_when_transcribing_then_phrases_and_provider_duration_are_returned() {
    let response_body = r#"{
        "durationMilliseconds": 45600,
        "combinedPhrases": [{ "text": "Hello from the recognizer. " }]
    }"#;
    let (base_url, shutdown_tx) = start_mock_speech_server(200, response_body).await;

    let engine = AzureSpeechEngine::new(&base_url, "test-key", "2024-11-15", "en-US");
    let result = engine.transcribe(b"fake audio", "meeting.wav").await.unwrap();

    assert_eq!(result.phrases, vec!["Hello from the recognizer.".to_string()]);
    assert_eq!(result.duration_milliseconds, 45_600);
    assert_eq!(result.seconds(), 45.6);
    assert_eq!(result.primary_text(), "Hello from the recognizer.");
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_error_status_when_transcribing_then_api_error_carries_the_body() {
    let response_body = r#"{"error": {"code": "InvalidAudio", "message": "bad audio"}}"#;
    let (base_url, shutdown_tx) = start_mock_speech_server(400, response_body).await;

    let engine = AzureSpeechEngine::new(&base_url, "test-key", "2024-11-15", "en-US");
    let result = engine.transcribe(b"bad audio", "meeting.wav").await;

    match result {
        Err(TranscriptionError::ApiRequestFailed(message)) => {
            assert!(message.contains("InvalidAudio"), "got: {}", message);
        }
        other => panic!("expected api error, got {:?}", other.map(|_| ())),
    }
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_malformed_body_when_transcribing_then_it_is_a_malformed_response_error() {
    let (base_url, shutdown_tx) = start_mock_speech_server(200, "not json").await;

    let engine = AzureSpeechEngine::new(&base_url, "test-key", "2024-11-15", "en-US");
    let result = engine.transcribe(b"fake audio", "meeting.wav").await;

    assert!(matches!(
        result,
        Err(TranscriptionError::MalformedResponse(_))
    ));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_no_phrases_when_transcribing_then_primary_text_is_empty() {
    let response_body = r#"{ "durationMilliseconds": 1200 }"#;
    let (base_url, shutdown_tx) = start_mock_speech_server(200, response_body).await;

    let engine = AzureSpeechEngine::new(&base_url, "test-key", "2024-11-15", "en-US");
    let result = engine.transcribe(b"silence", "silence.wav").await.unwrap();

    assert!(result.phrases.is_empty());
    assert_eq!(result.primary_text(), "");
    shutdown_tx.send(()).ok();
}
