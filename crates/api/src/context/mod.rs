//! Application context - dependency injection container

use std::path::Path;
use std::sync::Arc;

use servicedesk_core::{
    Clock, EscalationSweeper, LifecycleService, NotificationDispatcher, SlaCalculator,
    SystemClock,
};
use servicedesk_domain::{Config, Result, ServiceDeskError};
use servicedesk_infra::scheduling::SweepJob;
use servicedesk_infra::{
    notifier_from_config, DbManager, EscalationScheduler, EscalationSchedulerConfig,
    SqliteIdentityProvider, SqliteRequestStore, SqliteSlaPolicyRepository, SqliteTeamRepository,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub requests: Arc<SqliteRequestStore>,
    pub identity: Arc<SqliteIdentityProvider>,
    pub teams: Arc<SqliteTeamRepository>,
    pub policies: Arc<SqliteSlaPolicyRepository>,
    pub lifecycle: Arc<LifecycleService>,
    pub sweeper: Arc<EscalationSweeper>,
    pub scheduler: Mutex<EscalationScheduler>,
}

impl AppContext {
    /// Create a context with the system clock.
    ///
    /// Runs migrations; the escalation scheduler is built but not started.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Create a context with an explicit clock.
    pub async fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        ensure_parent_dir(Path::new(&config.database.path))?;

        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let requests = Arc::new(SqliteRequestStore::new(Arc::clone(&db)));
        let identity = Arc::new(SqliteIdentityProvider::new(Arc::clone(&db)));
        let teams = Arc::new(SqliteTeamRepository::new(Arc::clone(&db)));
        let policies = Arc::new(SqliteSlaPolicyRepository::new(Arc::clone(&db)));

        let notifier = notifier_from_config(&config.notifications)?;
        let dispatcher = NotificationDispatcher::from_config(notifier, &config.notifications);

        let lifecycle = Arc::new(
            LifecycleService::new(
                requests.clone(),
                identity.clone(),
                policies.clone(),
                teams.clone(),
                dispatcher,
                clock,
            )
            .with_sla_calculator(SlaCalculator::from_minutes(config.sla.at_risk_window_minutes)),
        );

        let sweeper = Arc::new(EscalationSweeper::new(Arc::clone(&lifecycle)));
        let job: Arc<dyn SweepJob> = sweeper.clone();
        let scheduler =
            EscalationScheduler::with_config(EscalationSchedulerConfig::from(&config.escalation), job)
                .await?;

        info!(
            db_path = %db.path().display(),
            escalation_enabled = config.escalation.enabled,
            webhook = config.notifications.webhook_url.is_some(),
            "application context initialized"
        );

        Ok(Self {
            config,
            db,
            requests,
            identity,
            teams,
            policies,
            lifecycle,
            sweeper,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Start the escalation scheduler when enabled in configuration.
    ///
    /// Returns whether the scheduler is running afterwards.
    pub async fn start_scheduler(&self) -> Result<bool> {
        if !self.config.escalation.enabled {
            info!("escalation scheduler disabled by configuration");
            return Ok(false);
        }

        let mut scheduler = self.scheduler.lock().await;
        if !scheduler.is_running() {
            scheduler.start().await?;
        }
        Ok(true)
    }

    /// Check health of all application components
    ///
    /// The score is healthy components over total components; the app is
    /// healthy at a score of 0.8 or above.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new().add_component(self.check_database_health().await);

        let running = self.scheduler.lock().await.is_running();
        status = status.add_component(match (self.config.escalation.enabled, running) {
            (true, true) | (false, false) => ComponentHealth::healthy("escalation_scheduler"),
            (true, false) => ComponentHealth::unhealthy("escalation_scheduler", "not running"),
            (false, true) => {
                ComponentHealth::healthy_with("escalation_scheduler", "running while disabled")
            }
        });

        status = status.add_component(match &self.config.notifications.webhook_url {
            Some(_) => ComponentHealth::healthy_with("notifications", "webhook"),
            None => ComponentHealth::healthy_with("notifications", "log only"),
        });

        status.calculate_score();
        status
    }

    /// Uses spawn_blocking to keep the query off the async runtime.
    async fn check_database_health(&self) -> ComponentHealth {
        let db = Arc::clone(&self.db);
        match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(e)) => {
                warn!(error = %e, "database health check failed");
                ComponentHealth::unhealthy("database", format!("query failed: {e}"))
            }
            Err(e) => {
                tracing::error!(error = %e, "database health check task panicked");
                ComponentHealth::unhealthy("database", format!("task panic: {e}"))
            }
        }
    }

    /// Stop the escalation scheduler if it is running.
    ///
    /// Idempotent; the database pool closes when the context is dropped.
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_running() {
            scheduler.stop().await?;
            info!(component = "EscalationScheduler", "scheduler stopped");
        }
        info!("application context shut down");
        Ok(())
    }
}

fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceDeskError::Config(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })
        }
        _ => Ok(()),
    }
}
