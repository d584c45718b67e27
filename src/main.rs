use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use tavira::application::ports::{
    BalanceRepository, EndpointCatalog, FileStore, JobRepository, SpeechSynthesizer,
    TranscriptEnhancer, TranscriptionEngine, UsageRepository,
};
use tavira::application::services::{
    AdmissionService, BalanceLedger, JobScheduler, LedgerConfig, SchedulerConfig,
    SttDiarizeProcessor, SttProcessor, TextChunker, TierAllowances, TtsProcessor, UsageRecorder,
};
use tavira::infrastructure::audio::{AzureSpeechEngine, AzureTtsEngine};
use tavira::infrastructure::llm::OpenAiEnhancer;
use tavira::infrastructure::observability::{TracingConfig, init_tracing};
use tavira::infrastructure::persistence::{
    PgBalanceRepository, PgEndpointCatalog, PgJobRepository, PgUsageRepository, create_pool,
};
use tavira::infrastructure::storage::HttpFileStore;
use tavira::presentation::{AppState, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    init_tracing(
        TracingConfig {
            environment: settings.environment.to_string(),
            ..TracingConfig::default()
        },
        settings.server.port,
    );

    let pool = create_pool(&settings.database.url, settings.database.max_connections).await?;
    sqlx::migrate!().run(&pool).await?;

    let job_repository: Arc<dyn JobRepository> = Arc::new(PgJobRepository::new(pool.clone()));
    let balance_repository: Arc<dyn BalanceRepository> =
        Arc::new(PgBalanceRepository::new(pool.clone()));
    let usage_repository: Arc<dyn UsageRepository> = Arc::new(PgUsageRepository::new(pool.clone()));
    let catalog: Arc<dyn EndpointCatalog> = Arc::new(PgEndpointCatalog::new(pool.clone()));

    let ledger = Arc::new(BalanceLedger::new(
        Arc::clone(&balance_repository),
        Arc::clone(&catalog),
        LedgerConfig {
            tier_allowances: TierAllowances {
                free: settings.billing.free_tier_allowance,
                standard: settings.billing.standard_tier_allowance,
                premium: settings.billing.premium_tier_allowance,
            },
            fallback_allowance: settings.billing.fallback_allowance,
        },
    ));
    let recorder = Arc::new(UsageRecorder::new(
        Arc::clone(&usage_repository),
        Arc::clone(&catalog),
        settings.billing.namespace.clone(),
        chrono::Duration::minutes(settings.billing.reconcile_window_minutes),
    ));

    let file_store: Arc<dyn FileStore> = Arc::new(HttpFileStore::new(&settings.files.base_url));
    let transcription_engine: Arc<dyn TranscriptionEngine> = Arc::new(AzureSpeechEngine::new(
        &settings.speech.base_url,
        &settings.speech.api_key,
        &settings.speech.api_version,
        &settings.speech.locale,
    ));
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(AzureTtsEngine::new(
        &settings.speech.base_url,
        &settings.speech.api_key,
        &settings.speech.language,
    ));
    let enhancer: Arc<dyn TranscriptEnhancer> = Arc::new(OpenAiEnhancer::new(
        &settings.llm.base_url,
        &settings.llm.api_key,
        &settings.llm.model,
    ));

    let mut scheduler = JobScheduler::new(
        Arc::clone(&job_repository),
        Arc::clone(&ledger),
        SchedulerConfig {
            poll_interval: Duration::from_secs(settings.scheduler.poll_interval_secs),
            fetch_limit: settings.scheduler.fetch_limit,
            stale_after: chrono::Duration::minutes(settings.scheduler.stale_after_minutes),
            max_attempts: settings.scheduler.max_attempts,
            refund_on_failure: settings.billing.refund_on_failure,
            endpoint_namespace: settings.billing.namespace.clone(),
        },
    );
    scheduler.register(Arc::new(SttProcessor::new(
        Arc::clone(&file_store),
        Arc::clone(&transcription_engine),
        Arc::clone(&recorder),
    )));
    scheduler.register(Arc::new(SttDiarizeProcessor::new(
        Arc::clone(&file_store),
        Arc::clone(&transcription_engine),
        Arc::clone(&enhancer),
        Arc::clone(&recorder),
        TextChunker::new(
            settings.chunking.chunk_chars,
            settings.chunking.overlap_chars,
        ),
        settings.chunking.enhancement_token_budget,
    )));
    scheduler.register(Arc::new(TtsProcessor::new(
        Arc::clone(&file_store),
        Arc::clone(&synthesizer),
        Arc::clone(&recorder),
        settings.speech.default_voice.clone(),
    )));
    let scheduler_handle = scheduler.start();

    let admission = Arc::new(AdmissionService::new(
        Arc::clone(&job_repository),
        Arc::clone(&usage_repository),
        Arc::clone(&catalog),
        Arc::clone(&ledger),
        settings.billing.namespace.clone(),
    ));

    let state = AppState {
        admission,
        ledger,
        job_repository,
    };
    let router = create_router(state);

    let addr = SocketAddr::new(settings.server.host.parse()?, settings.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_handle.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
