//! Cron-driven escalation sweep.
//!
//! Triggers the core escalation sweep at fixed intervals. Join handles are
//! tracked, cancellation is explicit, and every asynchronous operation is
//! wrapped in a timeout. Each run records `metrics` counters and a duration
//! histogram.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use servicedesk_core::{EscalationSweeper, LifecycleService};
//! use servicedesk_infra::scheduling::{
//!     EscalationScheduler, EscalationSchedulerConfig, SchedulerResult,
//! };
//!
//! # async fn example(service: Arc<LifecycleService>) -> SchedulerResult<()> {
//! let sweeper = Arc::new(EscalationSweeper::new(service));
//! let mut scheduler = EscalationScheduler::with_config(
//!     EscalationSchedulerConfig {
//!         cron_expression: "0 */5 * * * *".into(), // every 5 minutes
//!         ..Default::default()
//!     },
//!     sweeper,
//! )
//! .await?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use servicedesk_core::{EscalationSweeper, SweepReport};
use servicedesk_domain::EscalationConfig;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::InfraError;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

pub const SWEEPS_TOTAL: &str = "servicedesk_escalation_sweeps_total";
pub const ESCALATIONS_APPLIED_TOTAL: &str = "servicedesk_escalations_applied_total";
pub const SWEEP_SECONDS: &str = "servicedesk_escalation_sweep_seconds";

/// One sweep over the open requests.
#[async_trait]
pub trait SweepJob: Send + Sync {
    async fn run(&self) -> Result<SweepReport, InfraError>;
}

#[async_trait]
impl SweepJob for EscalationSweeper {
    async fn run(&self) -> Result<SweepReport, InfraError> {
        self.sweep_now().await.map_err(InfraError::from)
    }
}

/// Configuration for the escalation scheduler.
#[derive(Debug, Clone)]
pub struct EscalationSchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    /// Timeout applied to a single sweep.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for EscalationSchedulerConfig {
    fn default() -> Self {
        Self::from(&EscalationConfig::default())
    }
}

impl From<&EscalationConfig> for EscalationSchedulerConfig {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            cron_expression: config.cron_expression.clone(),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Escalation scheduler with explicit lifecycle management.
pub struct EscalationScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: EscalationSchedulerConfig,
    job_id: Uuid,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    job: Arc<dyn SweepJob>,
}

impl EscalationScheduler {
    /// Create a scheduler with the default timeouts.
    pub async fn new(cron_expression: String, job: Arc<dyn SweepJob>) -> SchedulerResult<Self> {
        let config = EscalationSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, job).await
    }

    /// Create a scheduler with a custom configuration.
    ///
    /// The cron expression is validated here by registering the job.
    pub async fn with_config(
        config: EscalationSchedulerConfig,
        job: Arc<dyn SweepJob>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id: Uuid::nil(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            job,
        };

        scheduler.job_id = scheduler.register_sweep_job().await?;
        Ok(scheduler)
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        if self.job_id.is_nil() {
            self.job_id = self.register_sweep_job().await?;
        }
        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!(cron = %self.config.cron_expression, "Escalation scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    ///
    /// A stopped scheduler can be started again; the underlying job scheduler
    /// is rebuilt on the next start.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??
        }

        let fresh =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        self.scheduler = Arc::new(RwLock::new(fresh));
        self.job_id = Uuid::nil();

        info!("Escalation scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn register_sweep_job(&mut self) -> SchedulerResult<Uuid> {
        if !self.job_id.is_nil() {
            return Ok(self.job_id);
        }

        let cron_expr = self.config.cron_expression.clone();
        let job = self.job.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let job = job.clone();
            Box::pin(async move {
                run_sweep(job.as_ref(), job_timeout).await;
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered escalation sweep job");
        Ok(job_id)
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Escalation scheduler monitor cancelled");
    }
}

/// Run one sweep under `job_timeout`, recording metrics for the outcome.
async fn run_sweep(job: &dyn SweepJob, job_timeout: Duration) {
    let started = Instant::now();

    let outcome = match tokio::time::timeout(job_timeout, job.run()).await {
        Ok(Ok(report)) => {
            metrics::counter!(ESCALATIONS_APPLIED_TOTAL).increment(u64::try_from(report.escalated).unwrap_or(u64::MAX));
            if report.failures > 0 || report.conflicts > 0 {
                warn!(
                    failures = report.failures,
                    conflicts = report.conflicts,
                    "Escalation sweep finished with skipped requests"
                );
            } else {
                debug!(
                    examined = report.examined,
                    escalated = report.escalated,
                    refreshed = report.refreshed,
                    "Escalation sweep finished"
                );
            }
            "ok"
        }
        Ok(Err(err)) => {
            error!(error = %err, "Escalation sweep failed");
            "error"
        }
        Err(_) => {
            warn!(timeout_secs = job_timeout.as_secs(), "Escalation sweep timed out");
            "timeout"
        }
    };

    metrics::counter!(SWEEPS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(SWEEP_SECONDS).record(started.elapsed().as_secs_f64());
}

impl Drop for EscalationScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("EscalationScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use servicedesk_domain::ServiceDeskError;

    use super::*;

    struct CountingJob {
        runs: AtomicUsize,
    }

    impl CountingJob {
        fn new() -> Self {
            Self { runs: AtomicUsize::new(0) }
        }

        fn run_count(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SweepJob for CountingJob {
        async fn run(&self) -> Result<SweepReport, InfraError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(SweepReport { examined: 1, ..SweepReport::default() })
        }
    }

    struct SlowJob;

    #[async_trait]
    impl SweepJob for SlowJob {
        async fn run(&self) -> Result<SweepReport, InfraError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(InfraError(ServiceDeskError::Internal("unreachable".into())))
        }
    }

    fn fast_config() -> EscalationSchedulerConfig {
        EscalationSchedulerConfig {
            cron_expression: "*/1 * * * * *".into(), // every second
            job_timeout: Duration::from_secs(2),
            start_timeout: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_runs_successfully() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler =
            EscalationScheduler::with_config(fast_config(), job.clone()).await.expect("created");

        scheduler.start().await.expect("start succeeds");
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop().await.expect("stop succeeds");

        assert!(job.run_count() >= 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler =
            EscalationScheduler::with_config(fast_config(), job).await.expect("created");

        scheduler.start().await.expect("first start");
        let err = scheduler.start().await.expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        scheduler.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_without_start_is_rejected() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler =
            EscalationScheduler::with_config(fast_config(), job).await.expect("created");

        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_after_stop_succeeds() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler =
            EscalationScheduler::with_config(fast_config(), job).await.expect("created");

        scheduler.start().await.expect("start succeeds");
        scheduler.stop().await.expect("stop succeeds");
        assert!(!scheduler.is_running());

        scheduler.start().await.expect("start again");
        scheduler.stop().await.expect("stop again");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_rejected() {
        let job = Arc::new(CountingJob::new());
        let config = EscalationSchedulerConfig {
            cron_expression: "not-a-cron".into(),
            ..fast_config()
        };

        let result = EscalationScheduler::with_config(config, job).await;
        assert!(matches!(result, Err(SchedulerError::JobRegistrationFailed { .. })));
    }

    #[tokio::test]
    async fn slow_sweep_times_out() {
        let started = Instant::now();
        run_sweep(&SlowJob, Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
