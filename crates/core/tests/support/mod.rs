//! Shared test helpers for `servicedesk-core` integration tests.
//!
//! In-memory implementations of every core port plus a harness that wires
//! them into a `LifecycleService` driven by a manual clock.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use servicedesk_core::{
    DeliveryMode, EscalationSweeper, IdentityProvider, LifecycleService, ManualClock,
    Notification, NotificationDispatcher, Notifier, RequestCommit, RequestStore,
    SlaPolicyRepository, TeamDirectory,
};
use servicedesk_domain::{
    CompanyId, DepartmentId, HistoryEntry, Level, MemberRole, RequestDraft, RequestId,
    Result as DomainResult, Role, ServiceDeskError, ServiceRequest, SlaPolicy, SlaPolicyId,
    Team, TeamId, TeamMember, UserId,
};
use uuid::Uuid;

// ============================================================================
// Requests
// ============================================================================

#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: Mutex<HashMap<RequestId, ServiceRequest>>,
    history: Mutex<Vec<HistoryEntry>>,
    fail_commits: AtomicBool,
}

impl InMemoryRequestStore {
    /// Make every following commit and history append fail with a
    /// persistence error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: RequestId) -> Option<ServiceRequest> {
        self.requests.lock().get(&id).cloned()
    }

    pub fn entries(&self, id: RequestId) -> Vec<HistoryEntry> {
        self.history.lock().iter().filter(|e| e.request_id == id).cloned().collect()
    }

    /// Overwrite the stored copy as if another writer committed.
    pub fn bump(&self, id: RequestId, update: impl FnOnce(&mut ServiceRequest)) {
        if let Some(request) = self.requests.lock().get_mut(&id) {
            update(request);
            request.version += 1;
        }
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: &ServiceRequest) -> DomainResult<()> {
        self.requests.lock().insert(request.id, request.clone());
        Ok(())
    }

    async fn load(&self, id: RequestId) -> DomainResult<Option<ServiceRequest>> {
        Ok(self.get(id))
    }

    async fn commit(&self, commit: RequestCommit) -> DomainResult<u64> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(ServiceDeskError::Persistence("disk full".into()));
        }
        let mut requests = self.requests.lock();
        let stored = requests
            .get(&commit.request.id)
            .map(|r| r.version)
            .ok_or_else(|| ServiceDeskError::NotFound(commit.request.id.to_string()))?;
        if stored != commit.expected_version {
            return Err(ServiceDeskError::ConcurrentModification(format!(
                "expected version {}, found {stored}",
                commit.expected_version
            )));
        }

        let mut request = commit.request;
        request.version = stored + 1;
        let version = request.version;
        requests.insert(request.id, request);
        if let Some(spawned) = commit.spawned {
            requests.insert(spawned.id, spawned);
        }
        self.history.lock().extend(commit.history);
        Ok(version)
    }

    async fn history(&self, id: RequestId) -> DomainResult<Vec<HistoryEntry>> {
        Ok(self.entries(id))
    }

    async fn append_history(&self, entry: &HistoryEntry) -> DomainResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(ServiceDeskError::Persistence("disk full".into()));
        }
        self.history.lock().push(entry.clone());
        Ok(())
    }

    async fn list_open_with_sla(&self) -> DomainResult<Vec<RequestId>> {
        let mut open: Vec<(DateTime<Utc>, RequestId)> = self
            .requests
            .lock()
            .values()
            .filter(|r| !r.stage.is_done() && r.sla_policy_id.is_some())
            .map(|r| (r.created_at, r.id))
            .collect();
        open.sort();
        Ok(open.into_iter().map(|(_, id)| id).collect())
    }

    async fn count_active_for_technician(&self, technician_id: UserId) -> DomainResult<usize> {
        Ok(self
            .requests
            .lock()
            .values()
            .filter(|r| r.technician_id == Some(technician_id) && !r.stage.is_done())
            .count())
    }

    async fn delete(&self, id: RequestId) -> DomainResult<()> {
        self.requests.lock().remove(&id);
        self.history.lock().retain(|e| e.request_id != id);
        Ok(())
    }
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Default, Clone)]
struct Profile {
    roles: HashSet<Role>,
    teams: HashSet<TeamId>,
    department: Option<DepartmentId>,
}

#[derive(Default)]
pub struct InMemoryIdentity {
    users: Mutex<HashMap<UserId, Profile>>,
}

impl InMemoryIdentity {
    pub fn add_user(&self, roles: &[Role], department: Option<DepartmentId>) -> UserId {
        let id = Uuid::now_v7();
        self.users.lock().insert(
            id,
            Profile { roles: roles.iter().copied().collect(), teams: HashSet::new(), department },
        );
        id
    }

    pub fn join_team(&self, user: UserId, team: TeamId) {
        self.users.lock().entry(user).or_default().teams.insert(team);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn roles_of(&self, user_id: UserId) -> DomainResult<HashSet<Role>> {
        Ok(self.users.lock().get(&user_id).map(|p| p.roles.clone()).unwrap_or_default())
    }

    async fn team_memberships_of(&self, user_id: UserId) -> DomainResult<HashSet<TeamId>> {
        Ok(self.users.lock().get(&user_id).map(|p| p.teams.clone()).unwrap_or_default())
    }

    async fn department_of(&self, user_id: UserId) -> DomainResult<Option<DepartmentId>> {
        Ok(self.users.lock().get(&user_id).and_then(|p| p.department))
    }

    async fn users_with_role(&self, role: Role) -> DomainResult<Vec<UserId>> {
        let mut users: Vec<UserId> = self
            .users
            .lock()
            .iter()
            .filter(|(_, p)| p.roles.contains(&role))
            .map(|(id, _)| *id)
            .collect();
        users.sort();
        Ok(users)
    }
}

// ============================================================================
// Teams
// ============================================================================

#[derive(Default)]
pub struct InMemoryTeams {
    teams: Mutex<Vec<Team>>,
    members: Mutex<Vec<TeamMember>>,
}

impl InMemoryTeams {
    pub fn add(&self, team: Team) -> TeamId {
        let id = team.id;
        self.teams.lock().push(team);
        id
    }

    pub fn add_member(&self, member: TeamMember) {
        self.members.lock().push(member);
    }

    pub fn member(&self, team_id: TeamId, user_id: UserId) -> Option<TeamMember> {
        self.members
            .lock()
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .cloned()
    }
}

#[async_trait]
impl TeamDirectory for InMemoryTeams {
    async fn default_team(&self) -> DomainResult<Option<Team>> {
        Ok(self.teams.lock().iter().find(|t| t.active && t.is_default_assignment_team).cloned())
    }

    async fn company_team(&self, company_id: CompanyId) -> DomainResult<Option<Team>> {
        Ok(self.teams.lock().iter().find(|t| t.active && t.company_id == Some(company_id)).cloned())
    }

    async fn any_team(&self) -> DomainResult<Option<Team>> {
        Ok(self.teams.lock().iter().find(|t| t.active).cloned())
    }

    async fn team(&self, team_id: TeamId) -> DomainResult<Option<Team>> {
        Ok(self.teams.lock().iter().find(|t| t.id == team_id).cloned())
    }

    async fn members(&self, team_id: TeamId) -> DomainResult<Vec<TeamMember>> {
        Ok(self.members.lock().iter().filter(|m| m.team_id == team_id).cloned().collect())
    }

    async fn record_assignment(
        &self,
        team_id: TeamId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(member) = self
            .members
            .lock()
            .iter_mut()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
        {
            member.last_assigned_at = Some(at);
        }
        Ok(())
    }
}

// ============================================================================
// SLA policies
// ============================================================================

#[derive(Default)]
pub struct InMemoryPolicies {
    policies: Mutex<HashMap<SlaPolicyId, SlaPolicy>>,
}

impl InMemoryPolicies {
    /// Store a policy without validating it.
    pub fn insert_unchecked(&self, policy: SlaPolicy) {
        self.policies.lock().insert(policy.id, policy);
    }
}

#[async_trait]
impl SlaPolicyRepository for InMemoryPolicies {
    async fn get(&self, id: SlaPolicyId) -> DomainResult<Option<SlaPolicy>> {
        Ok(self.policies.lock().get(&id).cloned())
    }

    async fn list_active(&self) -> DomainResult<Vec<SlaPolicy>> {
        let mut active: Vec<SlaPolicy> =
            self.policies.lock().values().filter(|p| p.active).cloned().collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    async fn save(&self, policy: &SlaPolicy) -> DomainResult<()> {
        policy.validate()?;
        self.policies.lock().insert(policy.id, policy.clone());
        Ok(())
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.subject.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> DomainResult<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Monday 2026-03-02 09:00 UTC, inside default business hours.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid timestamp")
}

pub struct Harness {
    pub store: Arc<InMemoryRequestStore>,
    pub identity: Arc<InMemoryIdentity>,
    pub teams: Arc<InMemoryTeams>,
    pub policies: Arc<InMemoryPolicies>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<LifecycleService>,
    pub department: DepartmentId,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryRequestStore::default());
        let identity = Arc::new(InMemoryIdentity::default());
        let teams = Arc::new(InMemoryTeams::default());
        let policies = Arc::new(InMemoryPolicies::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let dispatcher = NotificationDispatcher::new(notifier.clone(), DeliveryMode::Inline)
            .with_retry(1, Duration::ZERO);

        let service = Arc::new(LifecycleService::new(
            store.clone(),
            identity.clone(),
            policies.clone(),
            teams.clone(),
            dispatcher,
            clock.clone(),
        ));

        Self {
            store,
            identity,
            teams,
            policies,
            notifier,
            clock,
            service,
            department: Uuid::now_v7(),
        }
    }

    pub fn sweeper(&self) -> EscalationSweeper {
        EscalationSweeper::new(self.service.clone())
    }

    /// A user in the harness department holding `roles`.
    pub fn user(&self, roles: &[Role]) -> UserId {
        self.identity.add_user(roles, Some(self.department))
    }

    /// Active team in the harness department.
    pub fn team(&self, name: &str, is_default: bool) -> TeamId {
        let mut team = Team::new(Uuid::now_v7(), name);
        team.is_default_assignment_team = is_default;
        self.teams.add(team)
    }

    /// Add `user` to `team` with the matching membership role.
    pub fn join(&self, team: TeamId, user: UserId, role: MemberRole) {
        self.identity.join_team(user, team);
        self.teams.add_member(TeamMember::new(team, user, role));
    }

    pub async fn create(&self, owner: UserId, impact: Level, urgency: Level) -> ServiceRequest {
        let draft = RequestDraft {
            title: "Projector not working".into(),
            description: "Room B-204 projector shows no signal".into(),
            impact: Some(impact),
            urgency: Some(urgency),
            ..RequestDraft::default()
        };
        self.service.create_request(owner, draft).await.expect("request created")
    }

    pub async fn save_policy(&self, policy: SlaPolicy) {
        self.policies.save(&policy).await.expect("policy saved");
    }
}
