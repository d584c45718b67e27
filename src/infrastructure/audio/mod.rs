mod azure_speech_engine;
mod azure_tts_engine;

pub use azure_speech_engine::AzureSpeechEngine;
pub use azure_tts_engine::AzureTtsEngine;
