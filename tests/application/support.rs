use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use tavira::application::ports::{
    EnhancedChunk, EnhancementError, FetchedFile, FileStore, FileStoreError, JobRepository,
    SpeechSynthesizer, SynthesisError, Transcription, TranscriptEnhancer, TranscriptionEngine,
    TranscriptionError,
};
use tavira::application::services::{
    AdmissionService, BalanceLedger, LedgerConfig, TierAllowances, UsageRecorder,
};
use tavira::domain::{AudioFormat, EndpointId, JobId, JobStatus, TokenUsage, UserId};
use tavira::infrastructure::persistence::{
    InMemoryBalanceRepository, InMemoryJobRepository, InMemoryUsageRepository,
    StaticEndpointCatalog,
};

pub const NAMESPACE: &str = "/api/v1";
pub const ENHANCER_PROMPT_TOKENS: i64 = 100;
pub const ENHANCER_COMPLETION_TOKENS: i64 = 40;

pub struct Fixture {
    pub jobs: Arc<InMemoryJobRepository>,
    pub balances: Arc<InMemoryBalanceRepository>,
    pub usage: Arc<InMemoryUsageRepository>,
    pub catalog: Arc<StaticEndpointCatalog>,
    pub ledger: Arc<BalanceLedger>,
    pub recorder: Arc<UsageRecorder>,
    pub admission: Arc<AdmissionService>,
    pub stt_endpoint: EndpointId,
    pub stt_diarize_endpoint: EndpointId,
    pub tts_endpoint: EndpointId,
}

pub fn fixture() -> Fixture {
    fixture_with_catalog(|_| {})
}

pub fn fixture_with_catalog(customize: impl FnOnce(&mut StaticEndpointCatalog)) -> Fixture {
    let mut catalog = StaticEndpointCatalog::new();
    let stt_endpoint = catalog.add_endpoint(format!("{}/stt", NAMESPACE), dec!(1));
    let stt_diarize_endpoint = catalog.add_endpoint(format!("{}/stt_diarize", NAMESPACE), dec!(2));
    let tts_endpoint = catalog.add_endpoint(format!("{}/tts", NAMESPACE), dec!(1));
    customize(&mut catalog);
    let catalog = Arc::new(catalog);

    let jobs = Arc::new(InMemoryJobRepository::new());
    let balances = Arc::new(InMemoryBalanceRepository::new());
    let usage = Arc::new(InMemoryUsageRepository::new());

    let ledger = Arc::new(BalanceLedger::new(
        balances.clone(),
        catalog.clone(),
        LedgerConfig {
            tier_allowances: TierAllowances {
                free: dec!(5),
                standard: dec!(50),
                premium: dec!(500),
            },
            fallback_allowance: dec!(10),
        },
    ));
    let recorder = Arc::new(UsageRecorder::new(
        usage.clone(),
        catalog.clone(),
        NAMESPACE,
        chrono::Duration::hours(1),
    ));
    let admission = Arc::new(AdmissionService::new(
        jobs.clone(),
        usage.clone(),
        catalog.clone(),
        ledger.clone(),
        NAMESPACE,
    ));

    Fixture {
        jobs,
        balances,
        usage,
        catalog,
        ledger,
        recorder,
        admission,
        stt_endpoint,
        stt_diarize_endpoint,
        tts_endpoint,
    }
}

pub struct RecordingFileStore {
    data: Vec<u8>,
    name: String,
    fail_delete: bool,
    deleted: Mutex<Vec<String>>,
    uploads: Mutex<Vec<String>>,
}

impl RecordingFileStore {
    pub fn with_audio(data: Vec<u8>) -> Self {
        Self {
            data,
            name: "input.wav".to_string(),
            fail_delete: false,
            deleted: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for RecordingFileStore {
    async fn fetch(&self, _file_id: &str, _user_id: UserId) -> Result<FetchedFile, FileStoreError> {
        Ok(FetchedFile {
            data: self.data.clone(),
            name: self.name.clone(),
        })
    }

    async fn upload(
        &self,
        name: &str,
        _content_type: &str,
        _data: Vec<u8>,
        _user_id: UserId,
    ) -> Result<String, FileStoreError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(name.to_string());
        Ok(format!("out-{}", uploads.len()))
    }

    async fn delete(&self, file_id: &str, _user_id: UserId) -> Result<(), FileStoreError> {
        if self.fail_delete {
            return Err(FileStoreError::DeleteFailed("storage unavailable".to_string()));
        }
        self.deleted.lock().unwrap().push(file_id.to_string());
        Ok(())
    }
}

pub struct FixedTranscriptionEngine {
    pub phrases: Vec<String>,
    pub duration_milliseconds: u64,
}

#[async_trait]
impl TranscriptionEngine for FixedTranscriptionEngine {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        _filename: &str,
    ) -> Result<Transcription, TranscriptionError> {
        Ok(Transcription {
            phrases: self.phrases.clone(),
            duration_milliseconds: self.duration_milliseconds,
        })
    }
}

pub struct FailingTranscriptionEngine;

#[async_trait]
impl TranscriptionEngine for FailingTranscriptionEngine {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        _filename: &str,
    ) -> Result<Transcription, TranscriptionError> {
        Err(TranscriptionError::ApiRequestFailed(
            "recognizer unavailable".to_string(),
        ))
    }
}

pub struct FixedSynthesizer {
    pub audio: Vec<u8>,
}

#[async_trait]
impl SpeechSynthesizer for FixedSynthesizer {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _format: AudioFormat,
    ) -> Result<Vec<u8>, SynthesisError> {
        Ok(self.audio.clone())
    }
}

pub struct FailingSynthesizer;

#[async_trait]
impl SpeechSynthesizer for FailingSynthesizer {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _format: AudioFormat,
    ) -> Result<Vec<u8>, SynthesisError> {
        Err(SynthesisError::ApiRequestFailed(
            "synthesis backend exploded".to_string(),
        ))
    }
}

/// Labels every chunk and reports a fixed token usage per call.
pub struct FixedEnhancer {
    calls: Mutex<Vec<(usize, usize)>>,
}

impl FixedEnhancer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptEnhancer for FixedEnhancer {
    async fn enhance(
        &self,
        chunk: &str,
        chunk_index: usize,
        total_chunks: usize,
    ) -> Result<EnhancedChunk, EnhancementError> {
        self.calls.lock().unwrap().push((chunk_index, total_chunks));
        Ok(EnhancedChunk {
            text: format!("Speaker 1: {}", chunk),
            usage: TokenUsage {
                prompt_tokens: ENHANCER_PROMPT_TOKENS,
                completion_tokens: ENHANCER_COMPLETION_TOKENS,
                total_tokens: ENHANCER_PROMPT_TOKENS + ENHANCER_COMPLETION_TOKENS,
                cached_tokens: 0,
            },
        })
    }
}

/// Succeeds on the first `succeed_for` calls, then fails.
pub struct FlakyEnhancer {
    succeed_for: usize,
    calls: Mutex<usize>,
}

impl FlakyEnhancer {
    pub fn failing_after(succeed_for: usize) -> Self {
        Self {
            succeed_for,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl TranscriptEnhancer for FlakyEnhancer {
    async fn enhance(
        &self,
        chunk: &str,
        _chunk_index: usize,
        _total_chunks: usize,
    ) -> Result<EnhancedChunk, EnhancementError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls > self.succeed_for {
            return Err(EnhancementError::ApiRequestFailed(
                "enhancement backend exploded".to_string(),
            ));
        }
        Ok(EnhancedChunk {
            text: chunk.to_string(),
            usage: TokenUsage::default(),
        })
    }
}

/// Minimal PCM WAV container: duration is `num_samples / sample_rate`.
pub fn make_wav(sample_rate: u32, num_samples: u32) -> Vec<u8> {
    let data_len = num_samples * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    bytes
}

/// Polls the repository until the job reaches a terminal state.
pub async fn wait_until_terminal(jobs: &InMemoryJobRepository, job_id: JobId) -> JobStatus {
    for _ in 0..200 {
        if let Some(job) = jobs.get_by_id(job_id).await.unwrap() {
            if job.status.is_terminal() {
                return job.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}
