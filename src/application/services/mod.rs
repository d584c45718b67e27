mod admission;
pub mod audio_duration;
mod balance_ledger;
mod processor;
mod scheduler;
mod stt_diarize_processor;
mod stt_processor;
mod text_chunker;
pub mod token_counter;
mod tts_processor;
mod usage_recorder;

pub use admission::{AdmissionError, AdmissionService};
pub use balance_ledger::{BalanceLedger, LedgerConfig, LedgerError, TierAllowances};
pub use processor::{JobProcessor, ProcessorError};
pub use scheduler::{JobScheduler, SchedulerConfig, SchedulerHandle};
pub use stt_diarize_processor::SttDiarizeProcessor;
pub use stt_processor::SttProcessor;
pub use text_chunker::{TextChunk, TextChunker};
pub use tts_processor::TtsProcessor;
pub use usage_recorder::{
    ENHANCER_MODEL_TAG, RECOGNIZER_MODEL_TAG, SYNTHESIZER_MODEL_TAG, UsageError, UsageRecorder,
    endpoint_path,
};
