//! Team hierarchy paths
//!
//! Each team stores its ancestor path (`/root/.../self/`) so subtree queries
//! are a prefix match and cycle checks never walk the tree.

use servicedesk_domain::constants::MAX_TEAM_HIERARCHY_DEPTH;
use servicedesk_domain::{Result, ServiceDeskError, Team, TeamId};

/// Path of `team_id` placed under `parent`.
pub fn child_path(parent: Option<&Team>, team_id: TeamId) -> String {
    match parent {
        Some(parent) => format!("{}{team_id}/", parent.hierarchy_path),
        None => format!("/{team_id}/"),
    }
}

pub fn depth_of(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// True if `path` lies inside the subtree rooted at `team_id`.
pub fn is_in_subtree(path: &str, team_id: TeamId) -> bool {
    path.contains(&format!("/{team_id}/"))
}

/// Rejects parents that would create a cycle or exceed the depth cap.
///
/// `subtree_height` is the number of levels below `team_id` (0 for a leaf).
///
/// # Errors
/// Returns `ServiceDeskError::InvalidInput` describing the violation.
pub fn validate_parent(team_id: TeamId, parent: &Team, subtree_height: usize) -> Result<()> {
    if parent.id == team_id || is_in_subtree(&parent.hierarchy_path, team_id) {
        return Err(ServiceDeskError::InvalidInput(format!(
            "team {team_id} cannot be placed under {}: the hierarchy would contain a cycle",
            parent.id
        )));
    }
    let depth = depth_of(&parent.hierarchy_path) + 1 + subtree_height;
    if depth > MAX_TEAM_HIERARCHY_DEPTH {
        return Err(ServiceDeskError::InvalidInput(format!(
            "team hierarchy would be {depth} levels deep (maximum {MAX_TEAM_HIERARCHY_DEPTH})"
        )));
    }
    Ok(())
}

/// Replace the `old_prefix` of a descendant path with `new_prefix`.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    path.strip_prefix(old_prefix)
        .map_or_else(|| path.to_string(), |rest| format!("{new_prefix}{rest}"))
}
