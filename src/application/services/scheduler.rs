use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::application::ports::JobRepository;
use crate::application::services::balance_ledger::BalanceLedger;
use crate::application::services::processor::JobProcessor;
use crate::application::services::usage_recorder::endpoint_path;
use crate::domain::{Job, JobType};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Per-tick, per-type fetch cap. Not a worker-pool bound; dispatched
    /// workers are fire-and-forget.
    pub fetch_limit: i64,
    /// PROCESSING jobs untouched this long are assumed orphaned by a crash
    /// and swept back to QUEUED.
    pub stale_after: chrono::Duration,
    pub max_attempts: i32,
    /// Whether a failed job credits the admission cost back to the user.
    pub refund_on_failure: bool,
    pub endpoint_namespace: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            fetch_limit: 5,
            stale_after: chrono::Duration::minutes(30),
            max_attempts: 3,
            refund_on_failure: false,
            endpoint_namespace: "/api/v1".to_string(),
        }
    }
}

/// Long-lived polling loop: each tick sweeps stale jobs, lists QUEUED work
/// per registered type and dispatches one concurrent worker per job. Workers
/// claim their job with an atomic conditional transition before any other
/// side effect, so an overlapping tick or second poller cannot double-run it.
pub struct JobScheduler {
    jobs: Arc<dyn JobRepository>,
    ledger: Arc<BalanceLedger>,
    processors: HashMap<JobType, Arc<dyn JobProcessor>>,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        ledger: Arc<BalanceLedger>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            jobs,
            ledger,
            processors: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, processor: Arc<dyn JobProcessor>) {
        self.processors.insert(processor.job_type(), processor);
    }

    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::new(self);

        let handle = tokio::spawn(async move {
            tracing::info!(
                interval_secs = scheduler.config.poll_interval.as_secs(),
                job_types = scheduler.processors.len(),
                "Job scheduler started"
            );
            let mut ticker = tokio::time::interval(scheduler.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => scheduler.tick().await,
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Job scheduler stopping");
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }

    /// One poll cycle. Listing or sweep failures are logged and never stop
    /// the loop or starve the other job types.
    pub async fn tick(&self) {
        match self
            .jobs
            .requeue_stale(self.config.stale_after, self.config.max_attempts)
            .await
        {
            Ok(sweep) if sweep.requeued > 0 || sweep.abandoned > 0 => {
                tracing::warn!(
                    requeued = sweep.requeued,
                    abandoned = sweep.abandoned,
                    "Swept stale processing jobs"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Stale job sweep failed"),
        }

        for (job_type, processor) in &self.processors {
            let pending = match self
                .jobs
                .list_pending(*job_type, self.config.fetch_limit)
                .await
            {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(error = %e, job_type = %job_type, "Failed to list pending jobs");
                    continue;
                }
            };

            for job in pending {
                let jobs = Arc::clone(&self.jobs);
                let ledger = Arc::clone(&self.ledger);
                let processor = Arc::clone(processor);
                let refund_on_failure = self.config.refund_on_failure;
                let namespace = self.config.endpoint_namespace.clone();

                let span = tracing::info_span!(
                    "job",
                    job_id = %job.id,
                    job_type = %job.job_type,
                    user_id = %job.user_id,
                );
                tokio::spawn(
                    run_job(jobs, ledger, processor, job, refund_on_failure, namespace)
                        .instrument(span),
                );
            }
        }
    }
}

async fn run_job(
    jobs: Arc<dyn JobRepository>,
    ledger: Arc<BalanceLedger>,
    processor: Arc<dyn JobProcessor>,
    job: Job,
    refund_on_failure: bool,
    namespace: String,
) {
    // Claim before any other side effect; losing the claim means another
    // worker owns the job.
    match jobs.claim(job.id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!("Job no longer queued; skipping");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to claim job");
            return;
        }
    }

    match processor.process(&job).await {
        Ok(result) => match jobs.complete(job.id, &result).await {
            Ok(()) => tracing::info!("Job completed"),
            Err(e) => tracing::error!(error = %e, "Failed to record job completion"),
        },
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(error = %message, "Job failed");
            if let Err(record_err) = jobs.fail(job.id, &message).await {
                tracing::error!(error = %record_err, "Failed to record job failure");
            }
            if refund_on_failure {
                let path = endpoint_path(&namespace, job.job_type);
                if let Err(refund_err) = ledger.refund_path_cost(job.user_id, &path).await {
                    tracing::error!(error = %refund_err, "Failed to refund job cost");
                }
            }
        }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop to stop and waits for the current tick to finish.
    /// In-flight workers are not awaited; re-processing after an abrupt stop
    /// is handled by the stale sweep.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
