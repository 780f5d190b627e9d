//! Impact x urgency priority matrix

use servicedesk_domain::{Level, PriorityLevel};

/// Rows are impact, columns are urgency, both ordered Low..Critical.
const MATRIX: [[PriorityLevel; 4]; 4] = {
    use PriorityLevel::{P1, P2, P3, P4};
    [
        [P4, P3, P2, P1],
        [P3, P2, P1, P1],
        [P2, P1, P1, P1],
        [P1, P1, P1, P1],
    ]
};

const fn index(level: Level) -> usize {
    match level {
        Level::Low => 0,
        Level::Medium => 1,
        Level::High => 2,
        Level::Critical => 3,
    }
}

/// P3 when either axis is unset.
pub fn priority_for(impact: Option<Level>, urgency: Option<Level>) -> PriorityLevel {
    match (impact, urgency) {
        (Some(impact), Some(urgency)) => MATRIX[index(impact)][index(urgency)],
        _ => PriorityLevel::P3,
    }
}
