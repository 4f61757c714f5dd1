//! Pluggable health checks behind `GET /api/health`.
//!
//! Each `HealthCheck` reports a traffic-light status. Checks run
//! concurrently on every request and the worst status wins.

use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

/// What a single check found.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: HealthStatus,
    pub message: String,
}

impl CheckOutcome {
    pub fn green(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Green,
            message: message.into(),
        }
    }

    pub fn yellow(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Yellow,
            message: message.into(),
        }
    }

    pub fn red(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Red,
            message: message.into(),
        }
    }
}

/// A subsystem the health endpoint should vouch for.
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn validate(&self) -> BoxFuture<'_, CheckOutcome>;
}

/// One entry of the health report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckReport {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub status: HealthStatus,
    pub message: String,
}

/// Run every check and return the reports in registration order plus the
/// worst status seen. No checks means green.
pub async fn run_checks(checks: &[Arc<dyn HealthCheck>]) -> (HealthStatus, Vec<CheckReport>) {
    let outcomes = join_all(checks.iter().map(|check| check.validate())).await;

    let reports: Vec<CheckReport> = checks
        .iter()
        .zip(outcomes)
        .map(|(check, outcome)| {
            if outcome.status != HealthStatus::Green {
                tracing::warn!(
                    check = check.name(),
                    status = ?outcome.status,
                    message = %outcome.message,
                    "Health check not green"
                );
            }
            CheckReport {
                name: check.name().to_string(),
                description: check.description().to_string(),
                status: outcome.status,
                message: outcome.message,
            }
        })
        .collect();

    let overall = reports
        .iter()
        .map(|r| r.status)
        .max()
        .unwrap_or(HealthStatus::Green);
    (overall, reports)
}
