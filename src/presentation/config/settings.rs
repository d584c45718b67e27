use rust_decimal::Decimal;
use serde::Deserialize;

use super::environment::Environment;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("missing environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(skip, default = "default_environment")]
    pub environment: Environment,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub speech: SpeechSettings,
    pub llm: LlmSettings,
    pub files: FileServiceSettings,
    pub billing: BillingSettings,
    pub chunking: ChunkingSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechSettings {
    pub base_url: String,
    pub api_key: String,
    pub api_version: String,
    pub locale: String,
    pub default_voice: String,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileServiceSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingSettings {
    /// Path prefix the metered endpoints are registered under.
    pub namespace: String,
    /// Lookback for the provisional-row search when a job carries no usage
    /// reference.
    pub reconcile_window_minutes: i64,
    /// Whether a failed job credits its admission cost back.
    pub refund_on_failure: bool,
    pub free_tier_allowance: Decimal,
    pub standard_tier_allowance: Decimal,
    pub premium_tier_allowance: Decimal,
    pub fallback_allowance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingSettings {
    /// Transcripts at or under this many tokens are enhanced whole.
    pub enhancement_token_budget: usize,
    pub chunk_chars: usize,
    pub overlap_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub poll_interval_secs: u64,
    pub fetch_limit: i64,
    pub stale_after_minutes: i64,
    pub max_attempts: i32,
}

impl Settings {
    /// Builds the settings tree from environment variables, with working
    /// defaults for everything but credentials and the database URL.
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            environment: Environment::try_from(var_or("APP_ENV", "local"))
                .map_err(|e| SettingsError::InvalidValue("APP_ENV", e))?,
            server: ServerSettings {
                host: var_or("SERVER_HOST", "0.0.0.0"),
                port: parse_or("SERVER_PORT", 3000)?,
            },
            database: DatabaseSettings {
                url: required("DATABASE_URL")?,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            speech: SpeechSettings {
                base_url: required("SPEECH_BASE_URL")?,
                api_key: required("SPEECH_API_KEY")?,
                api_version: var_or("SPEECH_API_VERSION", "2024-11-15"),
                locale: var_or("SPEECH_LOCALE", "en-US"),
                default_voice: var_or("SPEECH_DEFAULT_VOICE", "en-US-JennyNeural"),
                language: var_or("SPEECH_LANGUAGE", "en-US"),
            },
            llm: LlmSettings {
                base_url: var_or("LLM_BASE_URL", "https://api.openai.com/v1"),
                api_key: required("LLM_API_KEY")?,
                model: var_or("LLM_MODEL", "gpt-4o-mini"),
            },
            files: FileServiceSettings {
                base_url: required("FILE_SERVICE_URL")?,
            },
            billing: BillingSettings {
                namespace: var_or("BILLING_NAMESPACE", "/api/v1"),
                reconcile_window_minutes: parse_or("BILLING_RECONCILE_WINDOW_MINUTES", 60)?,
                refund_on_failure: parse_or("BILLING_REFUND_ON_FAILURE", false)?,
                free_tier_allowance: parse_or("BILLING_FREE_TIER_ALLOWANCE", Decimal::new(5, 0))?,
                standard_tier_allowance: parse_or(
                    "BILLING_STANDARD_TIER_ALLOWANCE",
                    Decimal::new(50, 0),
                )?,
                premium_tier_allowance: parse_or(
                    "BILLING_PREMIUM_TIER_ALLOWANCE",
                    Decimal::new(500, 0),
                )?,
                fallback_allowance: parse_or("BILLING_FALLBACK_ALLOWANCE", Decimal::new(10, 0))?,
            },
            chunking: ChunkingSettings {
                enhancement_token_budget: parse_or("CHUNKING_TOKEN_BUDGET", 3000)?,
                chunk_chars: parse_or("CHUNKING_CHUNK_CHARS", 8000)?,
                overlap_chars: parse_or("CHUNKING_OVERLAP_CHARS", 400)?,
            },
            scheduler: SchedulerSettings {
                poll_interval_secs: parse_or("SCHEDULER_POLL_INTERVAL_SECS", 10)?,
                fetch_limit: parse_or("SCHEDULER_FETCH_LIMIT", 5)?,
                stale_after_minutes: parse_or("SCHEDULER_STALE_AFTER_MINUTES", 30)?,
                max_attempts: parse_or("SCHEDULER_MAX_ATTEMPTS", 3)?,
            },
        })
    }
}

fn default_environment() -> Environment {
    Environment::Local
}

fn required(name: &'static str) -> Result<String, SettingsError> {
    std::env::var(name).map_err(|_| SettingsError::MissingVar(name))
}

fn var_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, SettingsError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| SettingsError::InvalidValue(name, e.to_string())),
        Err(_) => Ok(default),
    }
}
