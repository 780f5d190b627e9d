//! SLA policies, lines and escalation rules

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::request::PriorityLevel;
use super::{CampusId, CategoryId, CompanyId, SlaPolicyId, UserId};
use crate::constants::MAX_SLA_TARGET_HOURS;
use crate::errors::{Result, ServiceDeskError};

/// Which requests a policy covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum SlaApplicability {
    All,
    Category(BTreeSet<CategoryId>),
    Location(BTreeSet<CampusId>),
    Company(BTreeSet<CompanyId>),
}

/// Working window in local hours, e.g. 8.0 to 18.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: f64,
    pub end_hour: f64,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self { start_hour: 8.0, end_hour: 18.0 }
    }
}

/// Response and resolution targets for one priority, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaLine {
    pub priority: PriorityLevel,
    pub response_hours: f64,
    pub resolution_hours: f64,
    pub after_hours_response_hours: Option<f64>,
    pub after_hours_resolution_hours: Option<f64>,
}

impl SlaLine {
    pub fn new(priority: PriorityLevel, response_hours: f64, resolution_hours: f64) -> Self {
        Self {
            priority,
            response_hours,
            resolution_hours,
            after_hours_response_hours: None,
            after_hours_resolution_hours: None,
        }
    }

    fn validate(&self) -> Result<()> {
        let in_range = |value: f64| value.is_finite() && value > 0.0 && value <= MAX_SLA_TARGET_HOURS;
        let out_of_range = |what: &str| {
            ServiceDeskError::InvalidInput(format!(
                "SLA line {}: {what} must be positive and at most {MAX_SLA_TARGET_HOURS} hours",
                self.priority
            ))
        };
        if !in_range(self.response_hours) || !in_range(self.resolution_hours) {
            return Err(out_of_range("response and resolution times"));
        }
        if self.response_hours > self.resolution_hours {
            return Err(ServiceDeskError::InvalidInput(format!(
                "SLA line {}: response time cannot exceed resolution time",
                self.priority
            )));
        }
        match (self.after_hours_response_hours, self.after_hours_resolution_hours) {
            (Some(response), _) if !in_range(response) => {
                Err(out_of_range("after-hours response time"))
            }
            (_, Some(resolution)) if !in_range(resolution) => {
                Err(out_of_range("after-hours resolution time"))
            }
            (Some(response), Some(resolution)) if response > resolution => {
                Err(ServiceDeskError::InvalidInput(format!(
                    "SLA line {}: after-hours response time cannot exceed resolution time",
                    self.priority
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Threshold-triggered escalation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub level: u32,
    /// Percentage of the elapsed resolution window, in (0, 100].
    pub trigger_after_percent: f64,
    pub notify_user_ids: Vec<UserId>,
    pub reassign_to: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub id: SlaPolicyId,
    pub name: String,
    pub active: bool,
    pub applicability: SlaApplicability,
    pub business_hours: BusinessHours,
    pub include_weekends: bool,
    /// IANA timezone name used for the business window.
    pub timezone: String,
    /// Use after-hours line targets for requests created outside the window.
    pub apply_after_hours: bool,
    pub escalation_enabled: bool,
    pub lines: Vec<SlaLine>,
    pub escalation_rules: Vec<EscalationRule>,
}

impl SlaPolicy {
    pub fn new(id: SlaPolicyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            applicability: SlaApplicability::All,
            business_hours: BusinessHours::default(),
            include_weekends: false,
            timezone: "UTC".to_string(),
            apply_after_hours: false,
            escalation_enabled: true,
            lines: Vec::new(),
            escalation_rules: Vec::new(),
        }
    }

    pub fn line_for(&self, priority: PriorityLevel) -> Option<&SlaLine> {
        self.lines.iter().find(|line| line.priority == priority)
    }

    /// Escalation rules sorted by level.
    pub fn rules_by_level(&self) -> Vec<&EscalationRule> {
        let mut rules: Vec<&EscalationRule> = self.escalation_rules.iter().collect();
        rules.sort_by_key(|rule| rule.level);
        rules
    }

    /// Checks every write-time invariant of the policy.
    ///
    /// # Errors
    /// Returns `ServiceDeskError::InvalidInput` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ServiceDeskError::InvalidInput("SLA policy name is required".into()));
        }
        let hours = self.business_hours;
        if !(0.0..=24.0).contains(&hours.start_hour)
            || !(0.0..=24.0).contains(&hours.end_hour)
            || hours.start_hour >= hours.end_hour
        {
            return Err(ServiceDeskError::InvalidInput(format!(
                "SLA policy {}: business hours must satisfy 0 <= start < end <= 24",
                self.name
            )));
        }

        let mut priorities = HashSet::new();
        for line in &self.lines {
            line.validate()?;
            if !priorities.insert(line.priority) {
                return Err(ServiceDeskError::InvalidInput(format!(
                    "SLA policy {}: duplicate line for priority {}",
                    self.name, line.priority
                )));
            }
        }

        let mut levels = HashSet::new();
        for rule in &self.escalation_rules {
            if rule.level == 0 {
                return Err(ServiceDeskError::InvalidInput(format!(
                    "SLA policy {}: escalation level must be at least 1",
                    self.name
                )));
            }
            if !(rule.trigger_after_percent > 0.0 && rule.trigger_after_percent <= 100.0) {
                return Err(ServiceDeskError::InvalidInput(format!(
                    "SLA policy {}: escalation level {} trigger must be in (0, 100]",
                    self.name, rule.level
                )));
            }
            if !levels.insert(rule.level) {
                return Err(ServiceDeskError::InvalidInput(format!(
                    "SLA policy {}: duplicate escalation level {}",
                    self.name, rule.level
                )));
            }
        }
        Ok(())
    }
}
