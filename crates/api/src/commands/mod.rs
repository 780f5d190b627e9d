//! Application commands
//!
//! Thin async entry points over the lifecycle service and repositories.
//! Each one logs its duration and outcome through `execute_command`.

pub mod directory;
pub mod escalation;
pub mod health;
pub mod requests;
pub mod sla;
pub mod teams;

pub use directory::{get_user, save_user};
pub use escalation::run_escalation_sweep;
pub use health::get_app_health;
pub use requests::{create_request, get_permissions, get_request, get_timeline, perform_action};
pub use sla::{get_sla_policy, list_sla_policies, save_sla_policy};
pub use teams::{
    list_team_members, remove_team_member, save_team, save_team_member, set_default_team,
    set_team_parent,
};
