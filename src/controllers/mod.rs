//! Controllers mounted by the server binary.
//!
//! A controller only declares routes; the business logic lives in its
//! endpoint type so it can be called without HTTP.

pub mod health;
pub mod service;

pub use health::{CheckOutcome, CheckReport, HealthCheck, HealthStatus};
pub use service::{ServiceController, ServiceEndpoints};
