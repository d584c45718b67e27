use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageId(Uuid);

impl UsageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UsageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UsageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(Uuid);

impl EndpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the admission-time audit entry a usage row originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(Uuid);

impl AuditId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token counts as reported by an LLM provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cached_tokens: i64,
}

impl TokenUsage {
    /// Sums usage across chunked provider calls.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cached_tokens += other.cached_tokens;
    }
}

/// Measured quantities of one billable operation. A provisional record holds
/// the default (all-zero) metrics until the async processor reconciles it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageMetrics {
    pub audio_seconds_processed: f64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cached_tokens: i64,
    pub files_uploaded: i32,
    pub pages_processed: i32,
    pub images_generated: i32,
    pub documents_processed: i32,
}

impl UsageMetrics {
    pub fn audio_seconds(seconds: f64) -> Self {
        Self {
            audio_seconds_processed: seconds,
            ..Self::default()
        }
    }

    pub fn tokens(usage: TokenUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cached_tokens: usage.cached_tokens,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub id: UsageId,
    pub user_id: UserId,
    pub endpoint_id: EndpointId,
    pub recorded_at: DateTime<Utc>,
    pub model_used: Option<String>,
    pub metrics: UsageMetrics,
    pub api_log_id: Option<AuditId>,
}

impl UsageRecord {
    /// The zeroed row written at admission time, before any work has run.
    pub fn provisional(user_id: UserId, endpoint_id: EndpointId, api_log_id: AuditId) -> Self {
        Self {
            id: UsageId::new(),
            user_id,
            endpoint_id,
            recorded_at: Utc::now(),
            model_used: None,
            metrics: UsageMetrics::default(),
            api_log_id: Some(api_log_id),
        }
    }

    pub fn measured(
        user_id: UserId,
        endpoint_id: EndpointId,
        model_used: &str,
        metrics: UsageMetrics,
        api_log_id: Option<AuditId>,
    ) -> Self {
        Self {
            id: UsageId::new(),
            user_id,
            endpoint_id,
            recorded_at: Utc::now(),
            model_used: Some(model_used.to_string()),
            metrics,
            api_log_id,
        }
    }
}
