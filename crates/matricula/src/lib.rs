//! Enrollment slot allocation for the school administration console.
//!
//! The crate talks to the school's REST backend through
//! [`workflows::enrollment::EnrollmentGateway`] and layers the slot directory, eligibility
//! resolver, committer, query service and the interactive flow controller on top of it.

pub mod config;
pub mod error;
pub mod session;
pub mod telemetry;
mod timestamp;
pub mod workflows;
