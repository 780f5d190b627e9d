//! Technician selection strategies

use servicedesk_domain::{AssignmentMethod, ServiceRequest, TeamMember, UserId};

/// A team member with the workload figure the strategies need.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub member: &'a TeamMember,
    pub active_requests: usize,
}

/// Pick a technician among available candidates, or `None` if nobody is
/// available.
pub fn pick_technician(
    method: AssignmentMethod,
    candidates: &[Candidate<'_>],
    request: &ServiceRequest,
) -> Option<UserId> {
    let available: Vec<&Candidate<'_>> =
        candidates.iter().filter(|c| c.member.is_available()).collect();
    let first_available = || available.first().map(|c| c.member.user_id);

    match method {
        // Never-assigned members sort first because `None < Some(_)`.
        AssignmentMethod::RoundRobin => available
            .iter()
            .min_by_key(|c| c.member.last_assigned_at)
            .map(|c| c.member.user_id),
        AssignmentMethod::LeastLoaded => available
            .iter()
            .min_by_key(|c| c.active_requests)
            .map(|c| c.member.user_id),
        AssignmentMethod::SkillBased => request
            .equipment_category_id
            .and_then(|category| {
                available
                    .iter()
                    .find(|c| c.member.skill_category_ids.contains(&category))
                    .map(|c| c.member.user_id)
            })
            .or_else(first_available),
        AssignmentMethod::LocationBased => request
            .location
            .campus_id
            .and_then(|campus| {
                available
                    .iter()
                    .find(|c| c.member.coverage_campus_ids.contains(&campus))
                    .map(|c| c.member.user_id)
            })
            .or_else(first_available),
    }
}
