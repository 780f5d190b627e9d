//! SLA calculator
//!
//! Deadlines are `created_at + line target`. Status is derived against the
//! resolution deadline and is re-evaluated on every mutation and by the
//! escalation sweep.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use servicedesk_domain::constants::DEFAULT_AT_RISK_WINDOW_MINUTES;
use servicedesk_domain::{
    PriorityLevel, Result, ServiceDeskError, ServiceRequest, SlaApplicability, SlaPolicy,
    SlaStatus, Stage,
};
use tracing::warn;

use super::priority::priority_for;

/// Result of one recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlaSnapshot {
    pub priority: PriorityLevel,
    pub response_deadline: Option<DateTime<Utc>>,
    pub resolution_deadline: Option<DateTime<Utc>>,
    pub sla_status: SlaStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct SlaCalculator {
    at_risk_window: Duration,
}

impl Default for SlaCalculator {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_AT_RISK_WINDOW_MINUTES)
    }
}

impl SlaCalculator {
    pub fn new(at_risk_window: Duration) -> Self {
        Self { at_risk_window }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes.max(0)))
    }

    /// Derive priority, deadlines and status without touching the request.
    pub fn compute(
        &self,
        request: &ServiceRequest,
        policy: Option<&SlaPolicy>,
        now: DateTime<Utc>,
    ) -> SlaSnapshot {
        let priority = priority_for(request.impact, request.urgency);

        let (response_deadline, resolution_deadline) = policy
            .and_then(|policy| {
                let line = policy.line_for(priority)?;
                let after_hours =
                    policy.apply_after_hours && Self::is_after_hours(policy, request.created_at);
                let (response, resolution) = if after_hours {
                    (
                        line.after_hours_response_hours.unwrap_or(line.response_hours),
                        line.after_hours_resolution_hours.unwrap_or(line.resolution_hours),
                    )
                } else {
                    (line.response_hours, line.resolution_hours)
                };
                Some((
                    deadline_after(request, response),
                    deadline_after(request, resolution),
                ))
            })
            .unwrap_or((None, None));

        SlaSnapshot {
            priority,
            response_deadline,
            resolution_deadline,
            sla_status: self.status(request.stage, resolution_deadline, now),
        }
    }

    /// Compute and write the derived fields back onto the request.
    pub fn recompute(
        &self,
        request: &mut ServiceRequest,
        policy: Option<&SlaPolicy>,
        now: DateTime<Utc>,
    ) -> SlaSnapshot {
        let snapshot = self.compute(request, policy, now);
        request.priority = snapshot.priority;
        request.response_deadline = snapshot.response_deadline;
        request.resolution_deadline = snapshot.resolution_deadline;
        request.sla_status = snapshot.sla_status;
        snapshot
    }

    /// Breach status for a stage and resolution deadline.
    pub fn status(
        &self,
        stage: Stage,
        resolution_deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SlaStatus {
        match resolution_deadline {
            _ if stage.is_done() => SlaStatus::OnTrack,
            None => SlaStatus::OnTrack,
            Some(deadline) if now > deadline => SlaStatus::Breached,
            Some(deadline) if now > deadline - self.at_risk_window => SlaStatus::AtRisk,
            Some(_) => SlaStatus::OnTrack,
        }
    }

    /// Share of the resolution window already used, in percent.
    // Windows are capped by `MAX_SLA_TARGET_HOURS`, well inside f64's exact range.
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_percent(request: &ServiceRequest, now: DateTime<Utc>) -> Option<f64> {
        let deadline = request.resolution_deadline?;
        let window = (deadline - request.created_at).num_milliseconds();
        if window <= 0 {
            return None;
        }
        let elapsed = (now - request.created_at).num_milliseconds().max(0);
        Some(elapsed as f64 / window as f64 * 100.0)
    }

    /// First active policy whose applicability matches the request, else the
    /// first active catch-all policy.
    ///
    /// # Errors
    /// Returns `ServiceDeskError::MissingSlaPolicy` when nothing applies.
    pub fn resolve_policy<'a>(
        &self,
        policies: &'a [SlaPolicy],
        request: &ServiceRequest,
    ) -> Result<&'a SlaPolicy> {
        let active = || policies.iter().filter(|policy| policy.active);

        active()
            .find(|policy| match &policy.applicability {
                SlaApplicability::All => false,
                SlaApplicability::Category(ids) => {
                    request.equipment_category_id.is_some_and(|id| ids.contains(&id))
                }
                SlaApplicability::Location(ids) => {
                    request.location.campus_id.is_some_and(|id| ids.contains(&id))
                }
                SlaApplicability::Company(ids) => {
                    request.company_id.is_some_and(|id| ids.contains(&id))
                }
            })
            .or_else(|| active().find(|policy| policy.applicability == SlaApplicability::All))
            .ok_or_else(|| {
                ServiceDeskError::MissingSlaPolicy(format!(
                    "no active SLA policy applies to request {}",
                    request.number
                ))
            })
    }

    /// Outside the policy's business window, in the policy's timezone.
    pub fn is_after_hours(policy: &SlaPolicy, at: DateTime<Utc>) -> bool {
        let tz: Tz = policy.timezone.parse().unwrap_or_else(|_| {
            warn!(policy = %policy.name, timezone = %policy.timezone, "unknown SLA timezone, using UTC");
            Tz::UTC
        });
        let local = at.with_timezone(&tz);

        if !policy.include_weekends && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return true;
        }

        let hour = f64::from(local.hour()) + f64::from(local.minute()) / 60.0;
        hour < policy.business_hours.start_hour || hour >= policy.business_hours.end_hour
    }
}

/// `created_at + target_hours`, or no deadline when the sum is not representable.
fn deadline_after(request: &ServiceRequest, target_hours: f64) -> Option<DateTime<Utc>> {
    let deadline = hours(target_hours).and_then(|offset| request.created_at.checked_add_signed(offset));
    if deadline.is_none() {
        warn!(
            request = %request.number,
            target_hours,
            "SLA target out of range, deadline left unset"
        );
    }
    deadline
}

/// Whole milliseconds for `value` hours; `None` when not finite or out of range.
// The cast only runs after the range check.
#[allow(clippy::cast_possible_truncation)]
fn hours(value: f64) -> Option<Duration> {
    const MAX_MILLIS: f64 = 9.0e18;
    let millis = (value * 3_600_000.0).round();
    if !millis.is_finite() || millis.abs() > MAX_MILLIS {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use servicedesk_domain::{Level, RequestDraft, SlaLine};
    use uuid::Uuid;

    use super::*;

    fn t0() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap()
    }

    fn request(impact: Option<Level>, urgency: Option<Level>) -> ServiceRequest {
        let draft = RequestDraft { impact, urgency, ..RequestDraft::default() };
        ServiceRequest::from_draft(Uuid::now_v7(), "REQ-T".into(), Uuid::now_v7(), draft, t0())
    }

    fn policy() -> SlaPolicy {
        let mut policy = SlaPolicy::new(Uuid::now_v7(), "Standard");
        policy.lines.push(SlaLine::new(PriorityLevel::P2, 2.0, 8.0));
        policy.lines.push(SlaLine::new(PriorityLevel::P1, 1.0, 4.0));
        policy
    }

    #[test]
    fn no_policy_means_null_deadlines_and_on_track() {
        let request = request(Some(Level::Medium), Some(Level::High));
        let snapshot = SlaCalculator::default().compute(&request, None, t0());
        assert_eq!(snapshot.priority, PriorityLevel::P1);
        assert_eq!(snapshot.response_deadline, None);
        assert_eq!(snapshot.resolution_deadline, None);
        assert_eq!(snapshot.sla_status, SlaStatus::OnTrack);
    }

    #[test]
    fn missing_line_means_null_deadlines() {
        let request = request(Some(Level::Low), Some(Level::Low));
        let snapshot = SlaCalculator::default().compute(&request, Some(&policy()), t0());
        assert_eq!(snapshot.priority, PriorityLevel::P4);
        assert!(snapshot.resolution_deadline.is_none());
    }

    #[test]
    fn deadlines_and_status_progression() {
        let calc = SlaCalculator::default();
        let mut request = request(Some(Level::Medium), Some(Level::Medium));
        let policy = policy();

        let snapshot = calc.recompute(&mut request, Some(&policy), t0());
        assert_eq!(snapshot.priority, PriorityLevel::P2);
        assert_eq!(request.response_deadline, Some(t0() + Duration::hours(2)));
        assert_eq!(request.resolution_deadline, Some(t0() + Duration::hours(8)));
        assert_eq!(request.sla_status, SlaStatus::OnTrack);

        let at = |minutes| t0() + Duration::minutes(minutes);
        assert_eq!(calc.compute(&request, Some(&policy), at(6 * 60 + 59)).sla_status, SlaStatus::OnTrack);
        assert_eq!(calc.compute(&request, Some(&policy), at(7 * 60 + 5)).sla_status, SlaStatus::AtRisk);
        assert_eq!(calc.compute(&request, Some(&policy), at(8 * 60 + 1)).sla_status, SlaStatus::Breached);
    }

    #[test]
    fn unrepresentable_target_leaves_deadline_unset() {
        let calc = SlaCalculator::default();
        let mut policy = SlaPolicy::new(Uuid::now_v7(), "Unchecked");
        // Not validated here.
        policy.lines.push(SlaLine::new(PriorityLevel::P2, 1.0, 1.0e12));
        let request = request(Some(Level::Medium), Some(Level::Medium));

        let snapshot = calc.compute(&request, Some(&policy), t0());
        assert_eq!(snapshot.response_deadline, Some(t0() + Duration::hours(1)));
        assert_eq!(snapshot.resolution_deadline, None);
        assert_eq!(snapshot.sla_status, SlaStatus::OnTrack);

        assert!(hours(f64::NAN).is_none());
        assert!(hours(f64::INFINITY).is_none());
        assert_eq!(hours(1.5), Some(Duration::minutes(90)));
    }

    #[test]
    fn done_requests_are_on_track() {
        let calc = SlaCalculator::default();
        let deadline = Some(t0());
        let late = t0() + Duration::days(2);
        assert_eq!(calc.status(Stage::Completed, deadline, late), SlaStatus::OnTrack);
        assert_eq!(calc.status(Stage::Cancelled, deadline, late), SlaStatus::OnTrack);
        assert_eq!(calc.status(Stage::PendingApproval, deadline, late), SlaStatus::Breached);
    }

    #[test]
    fn elapsed_percent_tracks_window() {
        let calc = SlaCalculator::default();
        let mut request = request(Some(Level::Medium), Some(Level::Medium));
        calc.recompute(&mut request, Some(&policy()), t0());
        let pct = SlaCalculator::elapsed_percent(&request, t0() + Duration::hours(4)).unwrap();
        assert!((pct - 50.0).abs() < 1e-9);
        assert_eq!(SlaCalculator::elapsed_percent(&request, t0() - Duration::hours(1)), Some(0.0));
    }

    #[test]
    fn resolve_prefers_specific_then_catch_all() {
        let calc = SlaCalculator::default();
        let campus = Uuid::now_v7();
        let mut request = request(None, None);

        let catch_all = policy();
        let mut by_campus = SlaPolicy::new(Uuid::now_v7(), "Campus");
        by_campus.applicability = SlaApplicability::Location(BTreeSet::from([campus]));
        let policies = vec![catch_all.clone(), by_campus.clone()];

        assert_eq!(calc.resolve_policy(&policies, &request).unwrap().id, catch_all.id);
        request.location.campus_id = Some(campus);
        assert_eq!(calc.resolve_policy(&policies, &request).unwrap().id, by_campus.id);
    }

    #[test]
    fn resolve_without_candidates_is_missing_policy() {
        let calc = SlaCalculator::default();
        let mut inactive = policy();
        inactive.active = false;
        let err = calc.resolve_policy(&[inactive], &request(None, None)).unwrap_err();
        assert!(matches!(err, ServiceDeskError::MissingSlaPolicy(_)));
    }

    #[test]
    fn after_hours_targets_only_when_enabled() {
        let calc = SlaCalculator::default();
        let mut policy = policy();
        policy.lines[0].after_hours_resolution_hours = Some(12.0);

        let evening = Utc.with_ymd_and_hms(2024, 5, 15, 20, 0, 0).unwrap();
        let mut request = request(Some(Level::Medium), Some(Level::Medium));
        request.created_at = evening;

        let snapshot = calc.compute(&request, Some(&policy), evening);
        assert_eq!(snapshot.resolution_deadline, Some(evening + Duration::hours(8)));

        policy.apply_after_hours = true;
        let snapshot = calc.compute(&request, Some(&policy), evening);
        assert_eq!(snapshot.resolution_deadline, Some(evening + Duration::hours(12)));
    }

    #[test]
    fn business_window_respects_timezone_and_weekends() {
        let mut policy = policy();
        policy.timezone = "Europe/Istanbul".into();
        // 06:00 UTC is 09:00 in Istanbul
        let morning = Utc.with_ymd_and_hms(2024, 5, 15, 6, 0, 0).unwrap();
        assert!(!SlaCalculator::is_after_hours(&policy, morning));

        let saturday = Utc.with_ymd_and_hms(2024, 5, 18, 9, 0, 0).unwrap();
        assert!(SlaCalculator::is_after_hours(&policy, saturday));
        policy.include_weekends = true;
        assert!(!SlaCalculator::is_after_hours(&policy, saturday));
    }
}
