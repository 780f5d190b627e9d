//! Health check types for `AppContext` components
//!
//! `AppContext::health_check` checks the database, the escalation scheduler
//! and the notification channel and folds the results into one status.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Share of healthy components required for the whole app to be healthy.
pub const HEALTHY_THRESHOLD: f64 = 0.8;

/// Overall health status of the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall health indicator
    pub is_healthy: bool,

    /// Health score from 0.0 (completely unhealthy) to 1.0 (fully healthy)
    pub score: f64,

    /// Optional message describing overall health state
    pub message: Option<String>,

    /// Individual component health checks
    pub components: Vec<ComponentHealth>,

    /// Unix timestamp when health check was performed
    pub timestamp: i64,
}

impl HealthStatus {
    /// Healthy with score 1.0 and no components.
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            score: 1.0,
            message: None,
            components: Vec::new(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Score = healthy / total; healthy at or above [`HEALTHY_THRESHOLD`].
    ///
    /// Should be called after all components have been added.
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_score(&mut self) {
        if self.components.is_empty() {
            return;
        }

        let healthy_count = self.components.iter().filter(|c| c.is_healthy).count();

        self.score = healthy_count as f64 / self.components.len() as f64;
        self.is_healthy = self.score >= HEALTHY_THRESHOLD;
        self.message = self
            .components
            .iter()
            .find(|c| !c.is_healthy)
            .map(|c| format!("{} is unhealthy", c.name));
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Health status of an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g., "database", "escalation_scheduler")
    pub name: String,

    pub is_healthy: bool,

    /// Optional message describing health state or error
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    /// A healthy component with an informational note.
    pub fn healthy_with(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: Some(message.into()) }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_new() {
        let status = HealthStatus::new();
        assert!(status.is_healthy);
        assert_eq!(status.score, 1.0);
        assert!(status.message.is_none());
        assert!(status.components.is_empty());
    }

    #[test]
    fn test_calculate_score_half_healthy() {
        let mut status = HealthStatus::new()
            .add_component(ComponentHealth::healthy("database"))
            .add_component(ComponentHealth::unhealthy("escalation_scheduler", "stopped"));

        status.calculate_score();

        assert_eq!(status.score, 0.5);
        assert!(!status.is_healthy);
        assert_eq!(status.message.as_deref(), Some("escalation_scheduler is unhealthy"));
    }

    #[test]
    fn test_calculate_score_threshold() {
        let mut status = HealthStatus::new()
            .add_component(ComponentHealth::healthy("a"))
            .add_component(ComponentHealth::healthy("b"))
            .add_component(ComponentHealth::healthy("c"))
            .add_component(ComponentHealth::healthy("d"))
            .add_component(ComponentHealth::unhealthy("e", "error"));

        status.calculate_score();

        assert_eq!(status.score, 0.8);
        assert!(status.is_healthy);
    }

    #[test]
    fn test_empty_components_keep_default_score() {
        let mut status = HealthStatus::new();
        status.calculate_score();
        assert_eq!(status.score, 1.0);
        assert!(status.is_healthy);
    }
}
