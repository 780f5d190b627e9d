//! Integration tests for the request model as other crates see it:
//! serialized forms, history drafts and policy validation.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use servicedesk_domain::{
    ApprovalStatus, EscalationRule, HistoryDraft, HistoryEventType, PriorityLevel, RequestDraft,
    ServiceDeskError, ServiceRequest, SlaApplicability, SlaLine, SlaPolicy, Stage, WorkOrder,
    WorkOrderDraft, WorkStatus,
};
use uuid::Uuid;

#[test]
fn request_json_uses_stable_codes() {
    let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let mut request = ServiceRequest::from_draft(
        Uuid::now_v7(),
        "REQ-20260302-0001".into(),
        Uuid::now_v7(),
        RequestDraft { title: "Broken chair".into(), ..RequestDraft::default() },
        created,
    );
    request.stage = Stage::WorkOrderCreated;
    let mut work_order = WorkOrder::new(
        Uuid::now_v7(),
        request.id,
        WorkOrderDraft {
            name: "Replace chair".into(),
            checklist: vec!["Fetch spare".into(), "Dispose old".into()],
            ..WorkOrderDraft::default()
        },
        created,
    );
    work_order.open_log(created);
    work_order.close_open_log(created + Duration::minutes(20));
    request.work_orders.push(work_order);

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["stage"], json!("work_order_created"));
    assert_eq!(value["work_orders"][0]["status"], json!("pending"));

    let back: ServiceRequest = serde_json::from_value(value).unwrap();
    assert_eq!(back, request);
    assert_eq!(back.work_orders[0].actual_duration(), Duration::minutes(20));
    assert!(!back.all_work_orders_completed());
}

#[test]
fn history_draft_becomes_a_stamped_entry() {
    let request_id = Uuid::now_v7();
    let actor = Uuid::now_v7();
    let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap();

    let entry = HistoryDraft::new(request_id, HistoryEventType::Approval)
        .actor(Some(actor))
        .stages(Stage::PendingApproval, Stage::Completed)
        .approval(ApprovalStatus::Approved)
        .note("Looks good")
        .into_entry(Uuid::now_v7(), at);

    assert_eq!(entry.request_id, request_id);
    assert_eq!(entry.timestamp, at);
    assert_eq!(entry.actor_id, Some(actor));
    assert_eq!(entry.stage_move(), Some((Stage::PendingApproval, Stage::Completed)));
    assert!(!entry.is_automatic);

    let comment = HistoryDraft::new(request_id, HistoryEventType::WorkOrder)
        .work_order(Uuid::now_v7(), WorkStatus::InProgress)
        .automatic(true)
        .into_entry(Uuid::now_v7(), at);
    assert_eq!(comment.stage_move(), None);
    assert!(comment.is_automatic);
}

#[test]
fn stored_policy_document_is_validated_after_load() {
    let mut policy = SlaPolicy::new(Uuid::now_v7(), "Campus");
    policy.applicability = SlaApplicability::Location([Uuid::now_v7()].into_iter().collect());
    policy.lines.push(SlaLine::new(PriorityLevel::P1, 0.5, 4.0));
    policy.escalation_rules.push(EscalationRule {
        level: 2,
        trigger_after_percent: 90.0,
        notify_user_ids: Vec::new(),
        reassign_to: None,
    });
    policy.escalation_rules.push(EscalationRule {
        level: 1,
        trigger_after_percent: 50.0,
        notify_user_ids: Vec::new(),
        reassign_to: None,
    });

    let document = serde_json::to_string(&policy).unwrap();
    let loaded: SlaPolicy = serde_json::from_str(&document).unwrap();
    loaded.validate().unwrap();
    let levels: Vec<u32> = loaded.rules_by_level().iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![1, 2]);

    let mut tampered = serde_json::to_value(&policy).unwrap();
    tampered["escalation_rules"][0]["level"] = json!(1);
    let tampered: SlaPolicy = serde_json::from_value(tampered).unwrap();
    assert!(matches!(tampered.validate(), Err(ServiceDeskError::InvalidInput(_))));
}

#[test]
fn errors_serialize_with_type_and_message() {
    let err = ServiceDeskError::ConcurrentModification("expected version 3, found 4".into());
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(
        value,
        json!({ "type": "ConcurrentModification", "message": "expected version 3, found 4" })
    );
    assert!(err.is_retryable());
    assert!(!ServiceDeskError::PermissionDenied("no".into()).is_retryable());
}
