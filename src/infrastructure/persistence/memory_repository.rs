//! Functional in-memory adapters, for service-level tests and local
//! experimentation without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::ports::{
    BalanceRepository, DeductOutcome, EndpointCatalog, JobRepository, RepositoryError,
    SweepOutcome, UsageRepository,
};
use crate::domain::{
    AccountTier, AuditId, BalanceMonth, BalanceTransaction, EndpointId, Job, JobId, JobStatus,
    JobType, UsageId, UsageMetrics, UsageRecord, UserId,
};

const ABANDONED_MESSAGE: &str = "abandoned after repeated processing attempts";

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        self.jobs
            .lock()
            .expect("job map lock poisoned")
            .insert(job.id, job.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .expect("job map lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn claim(&self, id: JobId) -> Result<bool, RepositoryError> {
        let mut jobs = self.jobs.lock().expect("job map lock poisoned");
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Processing;
                job.attempts += 1;
                job.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: JobId,
        result: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().expect("job map lock poisoned");
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", id)))?;
        if job.status != JobStatus::Processing {
            return Err(RepositoryError::StateConflict(format!(
                "job {} was not in {} when completing",
                id,
                JobStatus::Processing
            )));
        }
        job.status = JobStatus::Completed;
        job.result = Some(result.clone());
        job.error_message = None;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().expect("job map lock poisoned");
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", id)))?;
        if job.status.is_terminal() {
            return Err(RepositoryError::StateConflict(format!(
                "job {} was already terminal when failing",
                id
            )));
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn list_pending(
        &self,
        job_type: JobType,
        limit: i64,
    ) -> Result<Vec<Job>, RepositoryError> {
        let jobs = self.jobs.lock().expect("job map lock poisoned");
        let mut pending: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued && j.job_type == job_type)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn requeue_stale(
        &self,
        stuck_after: Duration,
        max_attempts: i32,
    ) -> Result<SweepOutcome, RepositoryError> {
        let cutoff: DateTime<Utc> = Utc::now() - stuck_after;
        let mut outcome = SweepOutcome::default();

        let mut jobs = self.jobs.lock().expect("job map lock poisoned");
        for job in jobs.values_mut() {
            if job.status != JobStatus::Processing || job.updated_at >= cutoff {
                continue;
            }
            if job.attempts >= max_attempts {
                job.status = JobStatus::Failed;
                job.error_message = Some(ABANDONED_MESSAGE.to_string());
                outcome.abandoned += 1;
            } else {
                job.status = JobStatus::Queued;
                outcome.requeued += 1;
            }
            job.updated_at = Utc::now();
        }
        Ok(outcome)
    }
}

#[derive(Default)]
struct BalanceState {
    records: HashMap<(UserId, BalanceMonth), Decimal>,
    transactions: Vec<BalanceTransaction>,
}

#[derive(Default)]
pub struct InMemoryBalanceRepository {
    state: Mutex<BalanceState>,
}

impl InMemoryBalanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> Vec<BalanceTransaction> {
        self.state
            .lock()
            .expect("balance state lock poisoned")
            .transactions
            .clone()
    }
}

#[async_trait]
impl BalanceRepository for InMemoryBalanceRepository {
    async fn ensure_month(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        seed: Decimal,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("balance state lock poisoned")
            .records
            .entry((user_id, month))
            .or_insert(seed);
        Ok(())
    }

    async fn current_balance(
        &self,
        user_id: UserId,
        month: BalanceMonth,
    ) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("balance state lock poisoned")
            .records
            .get(&(user_id, month))
            .copied())
    }

    async fn deduct(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        endpoint_id: EndpointId,
        amount: Decimal,
    ) -> Result<DeductOutcome, RepositoryError> {
        // The single lock plays the role of the database row lock.
        let mut state = self.state.lock().expect("balance state lock poisoned");
        let current = *state.records.get(&(user_id, month)).ok_or_else(|| {
            RepositoryError::NotFound(format!("balance record for user {} in {}", user_id, month))
        })?;

        if current < amount {
            return Ok(DeductOutcome::InsufficientBalance { current });
        }

        let new_balance = current - amount;
        state.records.insert((user_id, month), new_balance);
        state.transactions.push(BalanceTransaction {
            id: Uuid::new_v4(),
            user_id,
            endpoint_id,
            deducted_amount: amount,
            balance_after: new_balance,
            transaction_date: Utc::now(),
        });
        Ok(DeductOutcome::Deducted { new_balance })
    }

    async fn credit(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        endpoint_id: EndpointId,
        amount: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        let mut state = self.state.lock().expect("balance state lock poisoned");
        let current = *state.records.get(&(user_id, month)).ok_or_else(|| {
            RepositoryError::NotFound(format!("balance record for user {} in {}", user_id, month))
        })?;

        let new_balance = current + amount;
        state.records.insert((user_id, month), new_balance);
        state.transactions.push(BalanceTransaction {
            id: Uuid::new_v4(),
            user_id,
            endpoint_id,
            deducted_amount: -amount,
            balance_after: new_balance,
            transaction_date: Utc::now(),
        });
        Ok(new_balance)
    }

    async fn set_balance(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        amount: Decimal,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("balance state lock poisoned")
            .records
            .insert((user_id, month), amount);
        Ok(())
    }
}

struct AuditEntry {
    primary_usage_id: Option<UsageId>,
}

#[derive(Default)]
struct UsageState {
    records: Vec<UsageRecord>,
    audits: HashMap<AuditId, AuditEntry>,
}

#[derive(Default)]
pub struct InMemoryUsageRepository {
    state: Mutex<UsageState>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_records(&self) -> Vec<UsageRecord> {
        self.state
            .lock()
            .expect("usage state lock poisoned")
            .records
            .clone()
    }

    pub fn primary_usage_of(&self, api_log_id: AuditId) -> Option<UsageId> {
        self.state
            .lock()
            .expect("usage state lock poisoned")
            .audits
            .get(&api_log_id)
            .and_then(|a| a.primary_usage_id)
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn insert(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("usage state lock poisoned")
            .records
            .push(record.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: UsageId) -> Result<Option<UsageRecord>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("usage state lock poisoned")
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn update_metrics(
        &self,
        id: UsageId,
        model_used: &str,
        metrics: &UsageMetrics,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("usage state lock poisoned");
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("usage record {}", id)))?;
        record.model_used = Some(model_used.to_string());
        record.metrics = *metrics;
        Ok(())
    }

    async fn latest_within(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
        window: Duration,
    ) -> Result<Option<UsageRecord>, RepositoryError> {
        let since = Utc::now() - window;
        Ok(self
            .state
            .lock()
            .expect("usage state lock poisoned")
            .records
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.endpoint_id == endpoint_id && r.recorded_at >= since
            })
            .max_by_key(|r| r.recorded_at)
            .cloned())
    }

    async fn replace_with_split(
        &self,
        original: UsageId,
        first: &UsageRecord,
        second: &UsageRecord,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("usage state lock poisoned");
        let position = state
            .records
            .iter()
            .position(|r| r.id == original)
            .ok_or_else(|| RepositoryError::NotFound(format!("usage record {}", original)))?;
        state.records.remove(position);
        state.records.push(first.clone());
        state.records.push(second.clone());

        if let Some(audit_id) = first.api_log_id {
            if let Some(audit) = state.audits.get_mut(&audit_id) {
                audit.primary_usage_id = Some(first.id);
            }
        }
        Ok(())
    }

    async fn list_by_audit(
        &self,
        api_log_id: AuditId,
    ) -> Result<Vec<UsageRecord>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("usage state lock poisoned")
            .records
            .iter()
            .filter(|r| r.api_log_id == Some(api_log_id))
            .cloned()
            .collect())
    }

    async fn open_audit(
        &self,
        _user_id: UserId,
        _endpoint_id: EndpointId,
    ) -> Result<AuditId, RepositoryError> {
        let audit_id = AuditId::new();
        self.state
            .lock()
            .expect("usage state lock poisoned")
            .audits
            .insert(
                audit_id,
                AuditEntry {
                    primary_usage_id: None,
                },
            );
        Ok(audit_id)
    }

    async fn set_primary_usage(
        &self,
        api_log_id: AuditId,
        usage_id: UsageId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("usage state lock poisoned");
        let audit = state
            .audits
            .get_mut(&api_log_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("audit entry {}", api_log_id)))?;
        audit.primary_usage_id = Some(usage_id);
        Ok(())
    }
}

/// Fixed endpoint/account catalog for tests and local runs.
#[derive(Default)]
pub struct StaticEndpointCatalog {
    endpoints: HashMap<String, EndpointId>,
    costs: HashMap<EndpointId, Decimal>,
    allowances: HashMap<UserId, Decimal>,
    tiers: HashMap<UserId, AccountTier>,
}

impl StaticEndpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_endpoint(&mut self, path: impl Into<String>, cost: Decimal) -> EndpointId {
        let id = EndpointId::new();
        self.endpoints.insert(path.into(), id);
        self.costs.insert(id, cost);
        id
    }

    pub fn set_tier(&mut self, user_id: UserId, tier: AccountTier) {
        self.tiers.insert(user_id, tier);
    }

    pub fn set_allowance(&mut self, user_id: UserId, allowance: Decimal) {
        self.allowances.insert(user_id, allowance);
    }
}

#[async_trait]
impl EndpointCatalog for StaticEndpointCatalog {
    async fn endpoint_by_path(&self, path: &str) -> Result<Option<EndpointId>, RepositoryError> {
        Ok(self.endpoints.get(path).copied())
    }

    async fn endpoint_cost(&self, id: EndpointId) -> Result<Decimal, RepositoryError> {
        self.costs
            .get(&id)
            .copied()
            .ok_or_else(|| RepositoryError::NotFound(format!("endpoint {}", id)))
    }

    async fn monthly_allowance(
        &self,
        user_id: UserId,
    ) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self.allowances.get(&user_id).copied())
    }

    async fn account_tier(&self, user_id: UserId) -> Result<AccountTier, RepositoryError> {
        self.tiers
            .get(&user_id)
            .copied()
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", user_id)))
    }
}
