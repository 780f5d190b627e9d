//! Escalation sweeper
//!
//! Re-evaluates SLA status on every open request that carries a policy and
//! applies escalation rules whose threshold was crossed. A rule level is
//! applied at most once per request, so repeated sweeps are idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use servicedesk_domain::{RequestId, Result, ServiceDeskError, SlaPolicy, SlaPolicyId};
use tracing::{debug, error, info, warn};

use crate::sla::SlaCalculator;
use crate::workflow::{LifecycleService, UnitOfWork};

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    /// Requests that received at least one escalation.
    pub escalated: usize,
    /// Requests whose derived SLA fields changed without escalating.
    pub refreshed: usize,
    /// Requests skipped because another writer got there first.
    pub conflicts: usize,
    pub failures: usize,
}

enum SweepOutcome {
    Unchanged,
    Refreshed,
    Escalated,
}

pub struct EscalationSweeper {
    service: Arc<LifecycleService>,
}

impl EscalationSweeper {
    pub fn new(service: Arc<LifecycleService>) -> Self {
        Self { service }
    }

    /// Sweep at the service clock's current time.
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        let now = self.service.clock().now();
        self.sweep(now).await
    }

    /// # Errors
    /// Only when listing candidates fails. Per-request failures are logged
    /// and counted in the report.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let ids = self.service.store().list_open_with_sla().await?;
        let mut policies: HashMap<SlaPolicyId, Option<SlaPolicy>> = HashMap::new();
        let mut report = SweepReport::default();

        for request_id in ids {
            report.examined += 1;
            match self.sweep_one(request_id, now, &mut policies).await {
                Ok(SweepOutcome::Escalated) => report.escalated += 1,
                Ok(SweepOutcome::Refreshed) => report.refreshed += 1,
                Ok(SweepOutcome::Unchanged) => {}
                Err(ServiceDeskError::ConcurrentModification(reason)) => {
                    warn!(%request_id, %reason, "request changed during sweep, retrying next run");
                    report.conflicts += 1;
                }
                Err(err) => {
                    error!(%request_id, error = %err, "escalation sweep failed for request");
                    report.failures += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            escalated = report.escalated,
            refreshed = report.refreshed,
            conflicts = report.conflicts,
            failures = report.failures,
            "escalation sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(
        &self,
        request_id: RequestId,
        now: DateTime<Utc>,
        policies: &mut HashMap<SlaPolicyId, Option<SlaPolicy>>,
    ) -> Result<SweepOutcome> {
        let Some(request) = self.service.store().load(request_id).await? else {
            return Ok(SweepOutcome::Unchanged);
        };
        if request.stage.is_terminal() {
            return Ok(SweepOutcome::Unchanged);
        }
        let Some(policy_id) = request.sla_policy_id else {
            return Ok(SweepOutcome::Unchanged);
        };
        if !policies.contains_key(&policy_id) {
            let policy = self.service.policy_for(&request).await?;
            policies.insert(policy_id, policy);
        }
        let Some(policy) = policies.get(&policy_id).and_then(Option::as_ref) else {
            return Ok(SweepOutcome::Unchanged);
        };

        let engine = self.service.engine();
        let mut uow = UnitOfWork::new(request.clone());
        engine.sla().recompute(&mut uow.request, Some(policy), now);

        let mut applied = 0;
        if policy.escalation_enabled {
            if let Some(elapsed) = SlaCalculator::elapsed_percent(&uow.request, now) {
                for rule in policy.rules_by_level() {
                    if elapsed >= rule.trigger_after_percent
                        && engine.apply_escalation_rule(&mut uow, rule, elapsed, now)
                    {
                        applied += 1;
                    }
                }
            }
        }

        if uow.history.is_empty() && uow.request == request {
            return Ok(SweepOutcome::Unchanged);
        }

        let outcome = self.service.commit_unit(uow, request.version, now).await?;
        debug!(
            %request_id,
            levels_applied = applied,
            sla_status = %outcome.sla_status,
            "sweep committed request"
        );
        Ok(if applied > 0 { SweepOutcome::Escalated } else { SweepOutcome::Refreshed })
    }
}
