use axum::Router;
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use tavira::application::ports::{SpeechSynthesizer, SynthesisError};
use tavira::domain::AudioFormat;
use tavira::infrastructure::audio::AzureTtsEngine;

async fn start_mock_tts_server(
    response_status: u16,
    response_body: &'static [u8],
) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new().route(
        "/cognitiveservices/v1",
        post(move || async move {
            let status = axum::http::StatusCode::from_u16(response_status).unwrap();
            (status, response_body.to_vec()).into_response()
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
async fn given_text_when_synthesizing_then_audio_bytes_come_back() {
    let (base_url, shutdown_tx) = start_mock_tts_server(200, b"RIFFfake-audio").await;

    let engine = AzureTtsEngine::new(&base_url, "test-key", "en-US");
    let audio = engine
        .synthesize("Hello out there", "en-US-JennyNeural", AudioFormat::Wav)
        .await
        .unwrap();

    assert_eq!(audio, b"RIFFfake-audio".to_vec());
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_empty_body_when_synthesizing_then_it_is_an_empty_audio_error() {
    let (base_url, shutdown_tx) = start_mock_tts_server(200, b"").await;

    let engine = AzureTtsEngine::new(&base_url, "test-key", "en-US");
    let result = engine
        .synthesize("Hello", "en-US-JennyNeural", AudioFormat::Mp3)
        .await;

    assert!(matches!(result, Err(SynthesisError::EmptyAudio)));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_error_status_when_synthesizing_then_api_error_is_surfaced() {
    let (base_url, shutdown_tx) = start_mock_tts_server(401, b"unauthorized").await;

    let engine = AzureTtsEngine::new(&base_url, "bad-key", "en-US");
    let result = engine
        .synthesize("Hello", "en-US-JennyNeural", AudioFormat::Wav)
        .await;

    assert!(matches!(result, Err(SynthesisError::ApiRequestFailed(_))));
    shutdown_tx.send(()).ok();
}
