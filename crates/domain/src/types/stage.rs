//! Request lifecycle stages

use serde::{Deserialize, Serialize};

use crate::impl_domain_code_conversions;

/// A named state in the request lifecycle.
///
/// Stages are identified by variant, never by display name. Display names are
/// resolved per [`Locale`] in the core stage catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    New,
    TeamAssigned,
    WorkOrderCreated,
    InProgress,
    OnHold,
    PendingApproval,
    Completed,
    Rejected,
    Cancelled,
}

impl_domain_code_conversions!(Stage {
    New => "new",
    TeamAssigned => "team_assigned",
    WorkOrderCreated => "work_order_created",
    InProgress => "in_progress",
    OnHold => "on_hold",
    PendingApproval => "pending_approval",
    Completed => "completed",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

impl Stage {
    pub const fn sequence(self) -> u32 {
        match self {
            Self::New => 10,
            Self::TeamAssigned => 20,
            Self::WorkOrderCreated => 30,
            Self::InProgress => 40,
            Self::OnHold => 50,
            Self::PendingApproval => 60,
            Self::Completed => 70,
            Self::Rejected => 80,
            Self::Cancelled => 90,
        }
    }

    /// Terminal-for-editing: no field edits except the approval actions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PendingApproval | Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Closed; the SLA clock has stopped.
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Position on the forward path. `OnHold` is lateral and has no rank.
    pub const fn progress_rank(self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::TeamAssigned => Some(1),
            Self::WorkOrderCreated => Some(2),
            Self::InProgress => Some(3),
            Self::PendingApproval => Some(4),
            Self::Completed | Self::Rejected | Self::Cancelled => Some(5),
            Self::OnHold => None,
        }
    }

    /// True when moving `self -> to` goes backwards on the forward path.
    pub fn regresses_to(self, to: Self) -> bool {
        match (self.progress_rank(), to.progress_rank()) {
            (Some(from), Some(to)) => to < from,
            _ => false,
        }
    }
}

/// Presentation locale for stage names and history descriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Tr,
}

impl_domain_code_conversions!(Locale {
    En => "en",
    Tr => "tr",
});
