//! Lifecycle service
//!
//! Each call resolves the actor, loads a fresh copy of the request, runs the
//! engine against it and commits the result as one unit of work. Nothing is
//! cached between calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use servicedesk_domain::{
    Locale, RequestDraft, RequestId, Result, Role, ServiceDeskError, ServiceRequest, SlaPolicy,
    SlaStatus, Stage, TeamId, UserId, WorkOrderId,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{
    request_number, ActionContext, Audience, Prefetched, RequestAction, StageTransitionEngine,
    UnitOfWork,
};
use super::ports::{RequestCommit, RequestStore};
use crate::access::ports::IdentityProvider;
use crate::access::PermissionSet;
use crate::assignment::ports::TeamDirectory;
use crate::assignment::TeamAssignmentResolver;
use crate::history::{HistoryLedger, TimelineEntry};
use crate::notify::ports::Notification;
use crate::notify::NotificationDispatcher;
use crate::sla::ports::SlaPolicyRepository;
use crate::sla::SlaCalculator;
use crate::time::Clock;

/// What an accepted action left behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub request_id: RequestId,
    pub stage: Stage,
    pub sla_status: SlaStatus,
    pub version: u64,
    /// Set by `CreateWorkOrder`.
    pub work_order_id: Option<WorkOrderId>,
    /// Replacement opened by a rejection.
    pub spawned_request_id: Option<RequestId>,
}

pub struct LifecycleService {
    store: Arc<dyn RequestStore>,
    identity: Arc<dyn IdentityProvider>,
    policies: Arc<dyn SlaPolicyRepository>,
    resolver: TeamAssignmentResolver,
    ledger: HistoryLedger,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    engine: StageTransitionEngine,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        identity: Arc<dyn IdentityProvider>,
        policies: Arc<dyn SlaPolicyRepository>,
        directory: Arc<dyn TeamDirectory>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver: TeamAssignmentResolver::new(directory, Arc::clone(&store)),
            ledger: HistoryLedger::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            identity,
            policies,
            dispatcher,
            clock,
            engine: StageTransitionEngine::default(),
        }
    }

    /// Override the at-risk window used for SLA status.
    pub fn with_sla_calculator(mut self, calculator: SlaCalculator) -> Self {
        self.engine = StageTransitionEngine::new(calculator);
        self
    }

    pub fn engine(&self) -> &StageTransitionEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &TeamAssignmentResolver {
        &self.resolver
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub(crate) fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// # Errors
    /// `NotFound` when the request does not exist.
    pub async fn request(&self, request_id: RequestId) -> Result<ServiceRequest> {
        self.store
            .load(request_id)
            .await?
            .ok_or_else(|| ServiceDeskError::NotFound(format!("request {request_id}")))
    }

    /// Everything `actor_id` may currently do on the request.
    pub async fn permissions(&self, request_id: RequestId, actor_id: UserId) -> Result<PermissionSet> {
        let actor = self.identity.resolve(actor_id).await?;
        let request = self.request(request_id).await?;
        let effective_team = self.resolver.effective_team(&request).await?;
        Ok(self.engine.permissions().permissions(&actor, &request, effective_team))
    }

    pub async fn timeline(&self, request_id: RequestId, locale: Locale) -> Result<Vec<TimelineEntry>> {
        self.request(request_id).await?;
        self.ledger.timeline(request_id, locale).await
    }

    /// Policy attached to the request. A dangling id is logged and treated
    /// as no policy.
    pub(crate) async fn policy_for(&self, request: &ServiceRequest) -> Result<Option<SlaPolicy>> {
        let Some(policy_id) = request.sla_policy_id else {
            return Ok(None);
        };
        let policy = self.policies.get(policy_id).await?;
        if policy.is_none() {
            warn!(request_id = %request.id, %policy_id, "SLA policy referenced by request no longer exists");
        }
        Ok(policy)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Open a new request owned by `actor_id`.
    ///
    /// A request without an applicable SLA policy is still created; it just
    /// carries no deadlines.
    ///
    /// # Errors
    /// `InvalidInput` for an empty title, `NotFound` for an explicit policy
    /// id that does not exist, storage errors otherwise.
    pub async fn create_request(&self, actor_id: UserId, mut draft: RequestDraft) -> Result<ServiceRequest> {
        if draft.title.trim().is_empty() {
            return Err(ServiceDeskError::InvalidInput("title is required".into()));
        }
        let actor = self.identity.resolve(actor_id).await?;
        if draft.department_id.is_none() {
            draft.department_id = actor.department_id;
        }

        let now = self.clock.now();
        let id = Uuid::now_v7();
        let mut request = ServiceRequest::from_draft(id, request_number(id), actor_id, draft, now);

        let policy = match request.sla_policy_id {
            Some(policy_id) => Some(
                self.policies
                    .get(policy_id)
                    .await?
                    .ok_or_else(|| ServiceDeskError::NotFound(format!("SLA policy {policy_id}")))?,
            ),
            None => {
                let active = self.policies.list_active().await?;
                match self.engine.sla().resolve_policy(&active, &request) {
                    Ok(policy) => Some(policy.clone()),
                    Err(err) => {
                        warn!(request = %request.number, error = %err, "request created without SLA policy");
                        None
                    }
                }
            }
        };
        request.sla_policy_id = policy.as_ref().map(|p| p.id);
        self.engine.sla().recompute(&mut request, policy.as_ref(), now);

        self.store.insert(&request).await?;
        info!(
            request_id = %request.id,
            number = %request.number,
            priority = %request.priority,
            "service request created"
        );
        Ok(request)
    }

    /// Apply `action` as `actor_id`.
    ///
    /// `observed_stage` is the stage the caller last saw; when it no longer
    /// matches the stored stage the call fails with `ConcurrentModification`.
    ///
    /// # Errors
    /// Any engine error, `NotFound` for unknown requests, teams or work
    /// orders, and `ConcurrentModification` when another writer committed
    /// first. No state is written on error.
    pub async fn perform(
        &self,
        request_id: RequestId,
        actor_id: UserId,
        action: RequestAction,
        observed_stage: Option<Stage>,
    ) -> Result<ActionOutcome> {
        let name = action.name();
        let actor = self.identity.resolve(actor_id).await?;
        let request = self.request(request_id).await?;
        if let Some(observed) = observed_stage {
            if observed != request.stage {
                return Err(ServiceDeskError::ConcurrentModification(format!(
                    "request {} moved from {observed} to {} since it was read",
                    request.number, request.stage
                )));
            }
        }

        let effective_team = self.resolver.effective_team(&request).await?;
        let policy = self.policy_for(&request).await?;
        let facts = self.prefetch(&request, &action, effective_team).await?;

        let now = self.clock.now();
        let expected_version = request.version;
        let mut uow = UnitOfWork::new(request);
        let ctx = ActionContext { actor: &actor, effective_team, policy: policy.as_ref(), now };

        if let Err(err) = self.engine.apply(&mut uow, action, &ctx, &facts) {
            debug!(%request_id, %actor_id, action = name, error = %err, "action rejected");
            return Err(err);
        }

        let outcome = self.commit_unit(uow, expected_version, now).await?;
        info!(
            %request_id,
            %actor_id,
            action = name,
            stage = %outcome.stage,
            version = outcome.version,
            "request action applied"
        );
        Ok(outcome)
    }

    async fn prefetch(
        &self,
        request: &ServiceRequest,
        action: &RequestAction,
        effective_team: Option<TeamId>,
    ) -> Result<Prefetched> {
        let mut facts = Prefetched::default();
        match action {
            RequestAction::AssignTeam { team_id } => {
                let team = self
                    .resolver
                    .directory()
                    .team(*team_id)
                    .await?
                    .ok_or_else(|| ServiceDeskError::NotFound(format!("team {team_id}")))?;
                if team.auto_assign && team.active && request.technician_id.is_none() {
                    facts.auto_assignee = self.resolver.auto_assign_technician(&team, request).await?;
                }
                facts.team = Some(team);
            }
            RequestAction::Escalate => {
                facts.escalation_contact = self.resolver.escalation_contact(effective_team).await?;
            }
            RequestAction::UpdateDetails(patch) => {
                if let Some(policy_id) = patch.sla_policy_id {
                    facts.new_policy = self.policies.get(policy_id).await?;
                }
            }
            _ => {}
        }
        Ok(facts)
    }

    /// Persist a unit of work, then run the post-commit side effects.
    ///
    /// Side effects (round-robin bookkeeping and notifications) never fail
    /// the call once the commit went through.
    pub(crate) async fn commit_unit(
        &self,
        uow: UnitOfWork,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome> {
        let UnitOfWork {
            request,
            history,
            notifications,
            spawned,
            created_work_order,
            assignment_to_record,
            ..
        } = uow;

        let spawned_request_id = spawned.as_ref().map(|r| r.id);
        let commit = RequestCommit {
            request,
            expected_version,
            history: self.ledger.stamp_all(history, now),
            spawned,
        };
        let version = self.store.commit(commit.clone()).await?;
        let request = commit.request;

        if let Some((team_id, user_id)) = assignment_to_record {
            if let Err(err) = self.resolver.record_assignment(team_id, user_id, now).await {
                warn!(%team_id, %user_id, error = %err, "failed to record assignment");
            }
        }

        let mut outgoing = Vec::with_capacity(notifications.len());
        for pending in notifications {
            let recipients = match self.audience_members(&request, pending.audience).await {
                Ok(recipients) if recipients.is_empty() => {
                    debug!(request_id = %request.id, subject = %pending.subject, "notification has no recipients");
                    continue;
                }
                Ok(recipients) => recipients,
                Err(err) => {
                    warn!(request_id = %request.id, error = %err, "could not resolve notification recipients");
                    continue;
                }
            };
            outgoing.push(Notification {
                recipients,
                subject: pending.subject,
                body: pending.body,
                related_request_id: request.id,
            });
        }
        self.dispatcher.dispatch(outgoing).await;

        Ok(ActionOutcome {
            request_id: request.id,
            stage: request.stage,
            sla_status: request.sla_status,
            version,
            work_order_id: created_work_order,
            spawned_request_id,
        })
    }

    async fn audience_members(&self, request: &ServiceRequest, audience: Audience) -> Result<Vec<UserId>> {
        match audience {
            Audience::Users(users) => Ok(users),
            Audience::Approvers => {
                if let Some(team_id) = self.resolver.effective_team(request).await? {
                    if let Some(manager) = self
                        .resolver
                        .directory()
                        .team(team_id)
                        .await?
                        .and_then(|team| team.department_manager_id)
                    {
                        return Ok(vec![manager]);
                    }
                }
                self.identity.users_with_role(Role::Cto).await
            }
        }
    }
}
