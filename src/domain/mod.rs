mod account;
mod balance;
mod job;
mod job_params;
mod job_status;
mod job_type;
mod usage;

pub use account::{AccountTier, UserId};
pub use balance::{BalanceMonth, BalanceSnapshot, BalanceTransaction};
pub use job::{Job, JobId};
pub use job_params::{AudioFormat, SynthesisJobParameters, TranscriptionJobParameters};
pub use job_status::JobStatus;
pub use job_type::JobType;
pub use usage::{AuditId, EndpointId, TokenUsage, UsageId, UsageMetrics, UsageRecord};
