//! End-to-end lifecycle flows against in-memory ports.

mod support;

use chrono::Duration;
use servicedesk_core::RequestAction;
use servicedesk_domain::{
    ApprovalStatus, DetailsPatch, HistoryEventType, Level, Locale, MemberRole, PriorityLevel,
    ReplacementDraft, Role, ServiceDeskError, SlaLine, SlaPolicy, SlaStatus, Stage, TeamId,
    UserId, WorkOrderDraft,
};
use support::Harness;
use uuid::Uuid;

/// Owner, dispatcher, team leader, technician and CTO around one team.
struct Cast {
    owner: UserId,
    dispatcher: UserId,
    leader: UserId,
    technician: UserId,
    cto: UserId,
    team: TeamId,
}

fn cast(h: &Harness) -> Cast {
    let team = h.team("Facilities", true);
    let leader = h.user(&[Role::TeamLeader]);
    let technician = h.user(&[Role::Technician]);
    h.join(team, leader, MemberRole::TeamLeader);
    h.join(team, technician, MemberRole::Technician);
    Cast {
        owner: h.user(&[]),
        dispatcher: h.user(&[Role::Dispatcher]),
        leader,
        technician,
        cto: h.user(&[Role::Cto]),
        team,
    }
}

fn work_order(name: &str) -> WorkOrderDraft {
    WorkOrderDraft { name: name.into(), checklist: vec!["Check cable".into()], ..Default::default() }
}

#[tokio::test]
async fn scenario_a_priority_without_policy() {
    let h = Harness::new();
    let owner = h.user(&[]);

    let request = h.create(owner, Level::Medium, Level::High).await;

    assert_eq!(request.priority, PriorityLevel::P1);
    assert_eq!(request.stage, Stage::New);
    assert!(request.sla_policy_id.is_none());
    assert!(request.response_deadline.is_none());
    assert!(request.resolution_deadline.is_none());
    assert_eq!(request.sla_status, SlaStatus::OnTrack);
    assert!(request.number.starts_with("REQ-"));
    assert_eq!(request.department_id, Some(h.department));
    assert!(h.store.entries(request.id).is_empty());
}

#[tokio::test]
async fn scenario_b_owner_cancels_new_request_directly() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;

    let outcome = h
        .service
        .perform(request.id, c.owner, RequestAction::Cancel { reason: "Duplicate".into() }, None)
        .await
        .unwrap();

    assert_eq!(outcome.stage, Stage::Cancelled);
    let stored = h.store.get(request.id).unwrap();
    assert!(!stored.pending_cancel);
    assert!(stored.closed_at.is_some());

    let entries = h.store.entries(request.id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, HistoryEventType::Approval);
    assert_eq!(entries[0].approval_status, Some(ApprovalStatus::Cancelled));
    assert_eq!(entries[0].old_stage, Some(Stage::New));
    assert_eq!(entries[0].new_stage, Some(Stage::Cancelled));
}

#[tokio::test]
async fn scenario_c_dispatcher_cancel_routes_through_owner_approval() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Medium, Level::Medium).await;

    h.service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    let outcome = h
        .service
        .perform(
            request.id,
            c.dispatcher,
            RequestAction::Cancel { reason: "Handled by vendor".into() },
            Some(Stage::TeamAssigned),
        )
        .await
        .unwrap();

    assert_eq!(outcome.stage, Stage::PendingApproval);
    let pending = h.store.get(request.id).unwrap();
    assert!(pending.pending_cancel);
    assert_eq!(pending.cancel_requested_by, Some(c.dispatcher));
    assert_eq!(pending.previous_stage, Some(Stage::TeamAssigned));
    let to_owner = h.notifier.sent();
    assert_eq!(to_owner.len(), 1);
    assert_eq!(to_owner[0].recipients, vec![c.owner]);

    let outcome =
        h.service.perform(request.id, c.owner, RequestAction::Approve, None).await.unwrap();

    assert_eq!(outcome.stage, Stage::Cancelled);
    let cancelled = h.store.get(request.id).unwrap();
    assert!(!cancelled.pending_cancel);
    assert!(cancelled.cancel_requested_by.is_none());

    let last = h.store.entries(request.id).pop().unwrap();
    assert_eq!(last.event_type, HistoryEventType::Approval);
    assert_eq!(last.approval_status, Some(ApprovalStatus::Cancelled));
    assert_eq!(last.actor_id, Some(c.owner));
}

#[tokio::test]
async fn scenario_d_sla_status_tracks_clock() {
    let h = Harness::new();
    let owner = h.user(&[]);
    let mut policy = SlaPolicy::new(Uuid::now_v7(), "Standard");
    policy.lines.push(SlaLine::new(PriorityLevel::P2, 2.0, 8.0));
    h.save_policy(policy.clone()).await;

    let request = h.create(owner, Level::Medium, Level::Medium).await;
    assert_eq!(request.sla_policy_id, Some(policy.id));
    assert_eq!(request.resolution_deadline, Some(support::t0() + Duration::hours(8)));

    let sweeper = h.sweeper();
    h.clock.advance(Duration::hours(7) + Duration::minutes(5));
    sweeper.sweep_now().await.unwrap();
    assert_eq!(h.store.get(request.id).unwrap().sla_status, SlaStatus::AtRisk);

    h.clock.advance(Duration::minutes(56));
    sweeper.sweep_now().await.unwrap();
    assert_eq!(h.store.get(request.id).unwrap().sla_status, SlaStatus::Breached);
}

#[tokio::test]
async fn full_flow_to_completion() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::High, Level::Medium).await;
    let service = &h.service;

    service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    let created = service
        .perform(
            request.id,
            c.leader,
            RequestAction::CreateWorkOrder { draft: work_order("Replace HDMI cable") },
            None,
        )
        .await
        .unwrap();
    assert_eq!(created.stage, Stage::WorkOrderCreated);
    let work_order_id = created.work_order_id.unwrap();

    service
        .perform(
            request.id,
            c.leader,
            RequestAction::AssignTechnician { technician_id: c.technician },
            None,
        )
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(30));
    let started = service
        .perform(request.id, c.technician, RequestAction::StartWork { work_order_id }, None)
        .await
        .unwrap();
    assert_eq!(started.stage, Stage::InProgress);

    h.clock.advance(Duration::minutes(45));
    service
        .perform(request.id, c.technician, RequestAction::CompleteWork { work_order_id }, None)
        .await
        .unwrap();
    let stored = h.store.get(request.id).unwrap();
    let wo = stored.work_order(work_order_id).unwrap();
    assert_eq!(wo.actual_duration(), Duration::minutes(45));

    service
        .perform(request.id, c.technician, RequestAction::SendForApproval, None)
        .await
        .unwrap();
    let approval_request = h.notifier.sent().pop().unwrap();
    assert_eq!(approval_request.recipients, vec![c.cto]);

    let done = service.perform(request.id, c.cto, RequestAction::Approve, None).await.unwrap();
    assert_eq!(done.stage, Stage::Completed);
    assert_eq!(h.notifier.sent().pop().unwrap().recipients, vec![c.owner]);

    let entries = h.store.entries(request.id);
    let types: Vec<HistoryEventType> = entries.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            HistoryEventType::Assignment,
            HistoryEventType::StageChange,
            HistoryEventType::WorkOrder,
            HistoryEventType::StageChange,
            HistoryEventType::Assignment,
            HistoryEventType::WorkOrder,
            HistoryEventType::StageChange,
            HistoryEventType::WorkOrder,
            HistoryEventType::Comment,
            HistoryEventType::StageChange,
            HistoryEventType::Approval,
        ]
    );
    assert!(entries[8].is_automatic);

    let timeline = service.timeline(request.id, Locale::En).await.unwrap();
    assert_eq!(timeline.len(), entries.len());
    // WorkOrderCreated -> InProgress after 30 minutes
    assert_eq!(timeline[6].stage_duration_hours, Some(0.5));
    assert!(timeline.iter().all(|t| !t.description.is_empty()));
}

#[tokio::test]
async fn send_for_approval_requires_completed_work_orders() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::High).await;
    let service = &h.service;

    service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    let first = service
        .perform(request.id, c.leader, RequestAction::CreateWorkOrder { draft: work_order("A") }, None)
        .await
        .unwrap()
        .work_order_id
        .unwrap();
    service
        .perform(request.id, c.leader, RequestAction::CreateWorkOrder { draft: work_order("B") }, None)
        .await
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::StartWork { work_order_id: first }, None)
        .await
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::CompleteWork { work_order_id: first }, None)
        .await
        .unwrap();

    let before = h.store.entries(request.id).len();
    let err = service
        .perform(request.id, c.leader, RequestAction::SendForApproval, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceDeskError::InvalidTransition(_)));
    assert_eq!(h.store.entries(request.id).len(), before);
    assert_eq!(h.store.get(request.id).unwrap().stage, Stage::InProgress);
}

#[tokio::test]
async fn denied_action_writes_nothing() {
    let h = Harness::new();
    let c = cast(&h);
    let outsider = h.user(&[Role::Technician]);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    h.service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    let before = h.store.get(request.id).unwrap();
    let entries_before = h.store.entries(request.id).len();

    let err = h
        .service
        .perform(request.id, outsider, RequestAction::Cancel { reason: "no".into() }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceDeskError::PermissionDenied(_)));
    assert_eq!(h.store.get(request.id).unwrap(), before);
    assert_eq!(h.store.entries(request.id).len(), entries_before);
}

#[tokio::test]
async fn pending_approval_is_read_only_for_every_role() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    h.service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    h.service
        .perform(request.id, c.dispatcher, RequestAction::Cancel { reason: "moved".into() }, None)
        .await
        .unwrap();

    let patch = DetailsPatch { title: Some("Renamed".into()), ..DetailsPatch::default() };
    for actor in [c.cto, c.dispatcher, c.leader, c.technician, c.owner] {
        let err = h
            .service
            .perform(request.id, actor, RequestAction::UpdateDetails(patch.clone()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceDeskError::PermissionDenied(_)), "actor {actor}");
    }
    let permissions = h.service.permissions(request.id, c.cto).await.unwrap();
    assert!(permissions.is_read_only);
    assert!(permissions.can_approve);
}

#[tokio::test]
async fn rejected_cancellation_returns_to_previous_stage() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    h.service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    h.service
        .perform(request.id, c.dispatcher, RequestAction::Cancel { reason: "moved".into() }, None)
        .await
        .unwrap();

    let outcome = h
        .service
        .perform(
            request.id,
            c.owner,
            RequestAction::Reject { reason: "Still needed".into(), replacement: None },
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.stage, Stage::TeamAssigned);
    assert!(outcome.spawned_request_id.is_none());
    let stored = h.store.get(request.id).unwrap();
    assert!(!stored.pending_cancel);
    assert!(stored.previous_stage.is_none());

    let last = h.store.entries(request.id).pop().unwrap();
    assert_eq!(last.event_type, HistoryEventType::Cancellation);
    assert_eq!(last.approval_status, Some(ApprovalStatus::Rejected));
    assert_eq!(h.notifier.sent().pop().unwrap().recipients, vec![c.dispatcher]);
}

#[tokio::test]
async fn rejection_opens_replacement_request() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::High, Level::High).await;
    let service = &h.service;
    service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    let wo = service
        .perform(request.id, c.leader, RequestAction::CreateWorkOrder { draft: work_order("Fix") }, None)
        .await
        .unwrap()
        .work_order_id
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::StartWork { work_order_id: wo }, None)
        .await
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::CompleteWork { work_order_id: wo }, None)
        .await
        .unwrap();
    service.perform(request.id, c.leader, RequestAction::SendForApproval, None).await.unwrap();

    let replacement = ReplacementDraft { title: Some("Projector still flickers".into()), description: None };
    let outcome = service
        .perform(
            request.id,
            c.cto,
            RequestAction::Reject { reason: "Not fixed".into(), replacement: Some(replacement) },
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.stage, Stage::Rejected);
    let spawned = h.store.get(outcome.spawned_request_id.unwrap()).unwrap();
    assert_eq!(spawned.stage, Stage::New);
    assert_eq!(spawned.replaces, Some(request.id));
    assert_eq!(spawned.title, "Projector still flickers");
    assert_eq!(spawned.description, request.description);
    assert_eq!(spawned.assigned_team_id, Some(c.team));
    assert_eq!(spawned.owner_id, c.owner);
    assert_eq!(spawned.priority, PriorityLevel::P1);

    let rejected = h.notifier.sent().pop().unwrap();
    assert_eq!(rejected.recipients, vec![c.owner]);
}

#[tokio::test]
async fn hold_and_resume_restore_the_previous_stage() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    let service = &h.service;
    service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();

    let err = service
        .perform(
            request.id,
            c.leader,
            RequestAction::PutOnHold { reason: "   ".into(), expected_resume_at: None },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceDeskError::InvalidInput(_)));

    let held = service
        .perform(
            request.id,
            c.leader,
            RequestAction::PutOnHold { reason: "Waiting for parts".into(), expected_resume_at: None },
            None,
        )
        .await
        .unwrap();
    assert_eq!(held.stage, Stage::OnHold);
    assert_eq!(h.store.get(request.id).unwrap().resume_stage, Some(Stage::TeamAssigned));

    let resumed =
        service.perform(request.id, c.leader, RequestAction::ResumeFromHold, None).await.unwrap();
    assert_eq!(resumed.stage, Stage::TeamAssigned);
    let stored = h.store.get(request.id).unwrap();
    assert!(stored.hold_reason.is_none());
    assert!(stored.resume_stage.is_none());

    let hold_entry = h
        .store
        .entries(request.id)
        .into_iter()
        .find(|e| e.event_type == HistoryEventType::Hold)
        .unwrap();
    assert_eq!(hold_entry.note, "Waiting for parts");
}

#[tokio::test]
async fn stale_observed_stage_is_a_conflict() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    h.service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();

    let err = h
        .service
        .perform(
            request.id,
            c.dispatcher,
            RequestAction::AddComment { text: "checking".into() },
            Some(Stage::New),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceDeskError::ConcurrentModification(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn failed_commit_leaves_request_untouched() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    h.store.fail_commits(true);

    let err = h
        .service
        .perform(request.id, c.owner, RequestAction::Cancel { reason: "dup".into() }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceDeskError::Persistence(_)));
    assert_eq!(h.store.get(request.id).unwrap(), request);
    assert!(h.store.entries(request.id).is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn auto_assign_picks_available_member() {
    let h = Harness::new();
    let owner = h.user(&[]);
    let dispatcher = h.user(&[Role::Dispatcher]);
    let mut team = servicedesk_domain::Team::new(Uuid::now_v7(), "Network");
    team.auto_assign = true;
    let team_id = h.teams.add(team);
    let technician = h.user(&[Role::Technician]);
    h.join(team_id, technician, MemberRole::Technician);

    let request = h.create(owner, Level::Low, Level::Low).await;
    h.service
        .perform(request.id, dispatcher, RequestAction::AssignTeam { team_id }, None)
        .await
        .unwrap();

    let stored = h.store.get(request.id).unwrap();
    assert_eq!(stored.stage, Stage::TeamAssigned);
    assert_eq!(stored.technician_id, Some(technician));
    assert!(stored.assigned_at.is_some());
    assert!(h.teams.member(team_id, technician).unwrap().last_assigned_at.is_some());

    let automatic: Vec<bool> = h.store.entries(request.id).iter().map(|e| e.is_automatic).collect();
    assert_eq!(automatic, vec![false, true, true]);
}

#[tokio::test]
async fn stage_never_regresses_on_the_forward_path() {
    let h = Harness::new();
    let c = cast(&h);
    let request = h.create(c.owner, Level::Low, Level::Low).await;
    let service = &h.service;
    service
        .perform(request.id, c.dispatcher, RequestAction::AssignTeam { team_id: c.team }, None)
        .await
        .unwrap();
    let wo = service
        .perform(request.id, c.leader, RequestAction::CreateWorkOrder { draft: work_order("Fix") }, None)
        .await
        .unwrap()
        .work_order_id
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::StartWork { work_order_id: wo }, None)
        .await
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::PauseWork { work_order_id: wo }, None)
        .await
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::ResumeWork { work_order_id: wo }, None)
        .await
        .unwrap();
    service
        .perform(request.id, c.technician, RequestAction::CompleteWork { work_order_id: wo }, None)
        .await
        .unwrap();
    service.perform(request.id, c.technician, RequestAction::SendForApproval, None).await.unwrap();
    service.perform(request.id, c.cto, RequestAction::Approve, None).await.unwrap();

    let ranks: Vec<u8> = h
        .store
        .entries(request.id)
        .iter()
        .filter_map(|e| e.stage_move())
        .map(|(_, to)| to.progress_rank().unwrap())
        .collect();
    assert!(ranks.windows(2).all(|w| w[0] < w[1]), "ranks {ranks:?}");
}
