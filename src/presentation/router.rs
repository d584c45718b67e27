use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    admin_set_balance_handler, balance_handler, health_handler, job_status_handler,
    submit_stt_diarize_handler, submit_stt_handler, submit_tts_handler,
};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/stt", post(submit_stt_handler))
        .route("/api/v1/stt_diarize", post(submit_stt_diarize_handler))
        .route("/api/v1/tts", post(submit_tts_handler))
        .route("/api/v1/jobs/{job_id}", get(job_status_handler))
        .route("/api/v1/balance", get(balance_handler))
        .route("/api/v1/admin/balance", put(admin_set_balance_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
