//! Localized plain-text summaries for history entries

use servicedesk_domain::{ApprovalStatus, HistoryEntry, HistoryEventType, Locale, WorkStatus};

use crate::workflow::catalog::StageCatalog;

struct Labels {
    stage: &'static str,
    previous_duration: &'static str,
    hours: &'static str,
    team: &'static str,
    technician: &'static str,
    unassigned: &'static str,
    work_order: &'static str,
    approval: &'static str,
    note: &'static str,
    by: &'static str,
    system: &'static str,
    automatic: &'static str,
}

const EN: Labels = Labels {
    stage: "Stage",
    previous_duration: "Time in previous stage",
    hours: "h",
    team: "Team",
    technician: "Technician",
    unassigned: "unassigned",
    work_order: "Work order",
    approval: "Decision",
    note: "Note",
    by: "By",
    system: "system",
    automatic: "(automatic)",
};

const TR: Labels = Labels {
    stage: "Aşama",
    previous_duration: "Önceki aşamada geçen süre",
    hours: "saat",
    team: "Ekip",
    technician: "Teknisyen",
    unassigned: "atanmamış",
    work_order: "İş emri",
    approval: "Karar",
    note: "Not",
    by: "Yapan",
    system: "sistem",
    automatic: "(otomatik)",
};

const fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::En => &EN,
        Locale::Tr => &TR,
    }
}

fn event_title(event: HistoryEventType, locale: Locale) -> &'static str {
    match (locale, event) {
        (Locale::En, HistoryEventType::StageChange) => "Stage changed",
        (Locale::En, HistoryEventType::Assignment) => "Assignment changed",
        (Locale::En, HistoryEventType::WorkOrder) => "Work order updated",
        (Locale::En, HistoryEventType::Comment) => "Comment",
        (Locale::En, HistoryEventType::Approval) => "Approval decision",
        (Locale::En, HistoryEventType::Cancellation) => "Cancellation",
        (Locale::En, HistoryEventType::Hold) => "Put on hold",
        (Locale::En, HistoryEventType::FieldChange) => "Fields changed",
        (Locale::En, HistoryEventType::Escalation) => "Escalated",
        (Locale::Tr, HistoryEventType::StageChange) => "Aşama değişti",
        (Locale::Tr, HistoryEventType::Assignment) => "Atama değişti",
        (Locale::Tr, HistoryEventType::WorkOrder) => "İş emri güncellendi",
        (Locale::Tr, HistoryEventType::Comment) => "Yorum",
        (Locale::Tr, HistoryEventType::Approval) => "Onay kararı",
        (Locale::Tr, HistoryEventType::Cancellation) => "İptal",
        (Locale::Tr, HistoryEventType::Hold) => "Beklemeye alındı",
        (Locale::Tr, HistoryEventType::FieldChange) => "Alanlar değişti",
        (Locale::Tr, HistoryEventType::Escalation) => "Eskalasyon",
    }
}

fn approval_text(status: ApprovalStatus, locale: Locale) -> &'static str {
    match (locale, status) {
        (Locale::En, ApprovalStatus::Approved) => "approved",
        (Locale::En, ApprovalStatus::Rejected) => "rejected",
        (Locale::En, ApprovalStatus::Cancelled) => "cancelled",
        (Locale::Tr, ApprovalStatus::Approved) => "onaylandı",
        (Locale::Tr, ApprovalStatus::Rejected) => "reddedildi",
        (Locale::Tr, ApprovalStatus::Cancelled) => "iptal edildi",
    }
}

fn work_status_text(status: WorkStatus, locale: Locale) -> &'static str {
    match (locale, status) {
        (Locale::En, WorkStatus::Pending) => "pending",
        (Locale::En, WorkStatus::InProgress) => "in progress",
        (Locale::En, WorkStatus::Paused) => "paused",
        (Locale::En, WorkStatus::Completed) => "completed",
        (Locale::En, WorkStatus::Cancelled) => "cancelled",
        (Locale::Tr, WorkStatus::Pending) => "bekliyor",
        (Locale::Tr, WorkStatus::InProgress) => "devam ediyor",
        (Locale::Tr, WorkStatus::Paused) => "duraklatıldı",
        (Locale::Tr, WorkStatus::Completed) => "tamamlandı",
        (Locale::Tr, WorkStatus::Cancelled) => "iptal edildi",
    }
}

fn or_unassigned<T: std::fmt::Display>(value: Option<T>, labels: &Labels) -> String {
    value.map_or_else(|| labels.unassigned.to_string(), |v| v.to_string())
}

/// One line per populated aspect of the entry, title first.
pub fn describe(
    entry: &HistoryEntry,
    stage_duration_hours: Option<f64>,
    locale: Locale,
    catalog: &StageCatalog,
) -> String {
    let labels = labels(locale);
    let mut title = event_title(entry.event_type, locale).to_string();
    if entry.is_automatic {
        title.push(' ');
        title.push_str(labels.automatic);
    }
    let mut lines = vec![title];

    if let Some((old, new)) = entry.stage_move() {
        lines.push(format!(
            "{}: {} -> {}",
            labels.stage,
            catalog.display_name(old, locale),
            catalog.display_name(new, locale)
        ));
        if let Some(hours) = stage_duration_hours.filter(|h| *h > 0.0) {
            lines.push(format!("{}: {hours:.1} {}", labels.previous_duration, labels.hours));
        }
    }

    if entry.old_team != entry.new_team {
        lines.push(format!(
            "{}: {} -> {}",
            labels.team,
            or_unassigned(entry.old_team, labels),
            or_unassigned(entry.new_team, labels)
        ));
    }

    if entry.old_technician != entry.new_technician {
        lines.push(format!(
            "{}: {} -> {}",
            labels.technician,
            or_unassigned(entry.old_technician, labels),
            or_unassigned(entry.new_technician, labels)
        ));
    }

    if let (Some(id), Some(status)) = (entry.work_order_id, entry.work_order_status) {
        lines.push(format!("{} {id}: {}", labels.work_order, work_status_text(status, locale)));
    }

    if let Some(status) = entry.approval_status {
        lines.push(format!("{}: {}", labels.approval, approval_text(status, locale)));
    }

    if !entry.note.is_empty() {
        lines.push(format!("{}: {}", labels.note, entry.note));
    }

    lines.push(format!("{}: {}", labels.by, actor_label(entry, labels)));

    lines.join("\n")
}

fn actor_label(entry: &HistoryEntry, labels: &Labels) -> String {
    entry.actor_id.map_or_else(|| labels.system.to_string(), |id| id.to_string())
}
