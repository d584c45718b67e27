mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    BillingSettings, ChunkingSettings, DatabaseSettings, FileServiceSettings, LlmSettings,
    SchedulerSettings, ServerSettings, Settings, SettingsError, SpeechSettings,
};
