//! Stage catalog: ordered stages, flags, display names and the transition
//! table.

use servicedesk_domain::{Locale, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInfo {
    pub stage: Stage,
    pub sequence: u32,
    pub is_terminal: bool,
    pub is_done: bool,
}

/// Pure lookup table over [`Stage`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StageCatalog;

impl StageCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, stage: Stage) -> StageInfo {
        StageInfo {
            stage,
            sequence: stage.sequence(),
            is_terminal: stage.is_terminal(),
            is_done: stage.is_done(),
        }
    }

    /// All stages ordered by sequence.
    pub fn ordered(&self) -> Vec<StageInfo> {
        let mut stages: Vec<StageInfo> = Stage::ALL.iter().map(|s| self.info(*s)).collect();
        stages.sort_by_key(|info| info.sequence);
        stages
    }

    /// Stages directly reachable from `from`.
    pub fn successors(&self, from: Stage) -> &'static [Stage] {
        use Stage::{
            Cancelled, Completed, InProgress, New, OnHold, PendingApproval, Rejected,
            TeamAssigned, WorkOrderCreated,
        };

        match from {
            New => &[TeamAssigned, WorkOrderCreated, OnHold, PendingApproval, Cancelled],
            TeamAssigned => &[WorkOrderCreated, InProgress, OnHold, PendingApproval, Cancelled],
            WorkOrderCreated => &[InProgress, OnHold],
            InProgress => &[PendingApproval, OnHold],
            // Resuming returns to the stage recorded when the hold began.
            OnHold => &[InProgress, New, TeamAssigned, WorkOrderCreated],
            // New and TeamAssigned only when a cancellation is rejected.
            PendingApproval => &[Completed, Rejected, Cancelled, New, TeamAssigned],
            Completed | Rejected | Cancelled => &[],
        }
    }

    pub fn is_reachable(&self, from: Stage, to: Stage) -> bool {
        self.successors(from).contains(&to)
    }

    pub fn display_name(&self, stage: Stage, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match stage {
                Stage::New => "New",
                Stage::TeamAssigned => "Team Assigned",
                Stage::WorkOrderCreated => "Work Order Created",
                Stage::InProgress => "In Progress",
                Stage::OnHold => "On Hold",
                Stage::PendingApproval => "Pending Approval",
                Stage::Completed => "Completed",
                Stage::Rejected => "Rejected",
                Stage::Cancelled => "Cancelled",
            },
            Locale::Tr => match stage {
                Stage::New => "Yeni",
                Stage::TeamAssigned => "Ekip Atandı",
                Stage::WorkOrderCreated => "İş Emri Oluşturuldu",
                Stage::InProgress => "Devam Ediyor",
                Stage::OnHold => "Beklemede",
                Stage::PendingApproval => "Onay Bekliyor",
                Stage::Completed => "Tamamlandı",
                Stage::Rejected => "Reddedildi",
                Stage::Cancelled => "İptal Edildi",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_follows_sequence() {
        let catalog = StageCatalog::new();
        let ordered: Vec<Stage> = catalog.ordered().iter().map(|info| info.stage).collect();
        assert_eq!(ordered.first(), Some(&Stage::New));
        assert_eq!(ordered.last(), Some(&Stage::Cancelled));
        assert_eq!(ordered.len(), Stage::ALL.len());
    }

    #[test]
    fn closed_stages_have_no_successors() {
        let catalog = StageCatalog::new();
        for stage in [Stage::Completed, Stage::Rejected, Stage::Cancelled] {
            assert!(catalog.successors(stage).is_empty(), "{stage} should be final");
        }
    }

    #[test]
    fn only_pending_approval_moves_backwards() {
        let catalog = StageCatalog::new();
        for from in Stage::ALL {
            for to in catalog.successors(*from) {
                if from.regresses_to(*to) {
                    assert_eq!(*from, Stage::PendingApproval, "{from} -> {to} regresses");
                }
            }
        }
    }

    #[test]
    fn transition_table_edges() {
        use Stage::{
            Cancelled, Completed, InProgress, New, OnHold, PendingApproval, Rejected,
            TeamAssigned, WorkOrderCreated,
        };
        let catalog = StageCatalog::new();
        let expected: [(Stage, &[Stage]); 6] = [
            (New, &[TeamAssigned, WorkOrderCreated, OnHold, PendingApproval, Cancelled]),
            (TeamAssigned, &[WorkOrderCreated, InProgress, OnHold, PendingApproval, Cancelled]),
            (WorkOrderCreated, &[InProgress, OnHold]),
            (InProgress, &[PendingApproval, OnHold]),
            (OnHold, &[InProgress, New, TeamAssigned, WorkOrderCreated]),
            (PendingApproval, &[Completed, Rejected, Cancelled, New, TeamAssigned]),
        ];
        for (from, targets) in expected {
            for to in Stage::ALL {
                assert_eq!(
                    catalog.is_reachable(from, *to),
                    targets.contains(to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn no_stage_reaches_itself() {
        let catalog = StageCatalog::new();
        for stage in Stage::ALL {
            assert!(!catalog.is_reachable(*stage, *stage));
        }
    }

    #[test]
    fn display_names_are_localized() {
        let catalog = StageCatalog::new();
        assert_eq!(catalog.display_name(Stage::OnHold, Locale::En), "On Hold");
        assert_eq!(catalog.display_name(Stage::OnHold, Locale::Tr), "Beklemede");
    }
}
