//! Scoring and group-assignment engine for day-care assessment forms.

pub mod assessments;
pub mod config;
pub mod error;
pub mod telemetry;
