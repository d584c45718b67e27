mod balance_repository;
mod endpoint_catalog;
mod file_store;
mod job_repository;
mod repository_error;
mod speech_synthesizer;
mod transcript_enhancer;
mod transcription_engine;
mod usage_repository;

pub use balance_repository::{BalanceRepository, DeductOutcome};
pub use endpoint_catalog::EndpointCatalog;
pub use file_store::{FetchedFile, FileStore, FileStoreError};
pub use job_repository::{JobRepository, SweepOutcome};
pub use repository_error::RepositoryError;
pub use speech_synthesizer::{SpeechSynthesizer, SynthesisError};
pub use transcript_enhancer::{EnhancedChunk, EnhancementError, TranscriptEnhancer};
pub use transcription_engine::{Transcription, TranscriptionEngine, TranscriptionError};
pub use usage_repository::UsageRepository;
