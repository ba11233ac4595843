//! Domain types for tracking dubbing jobs.
//!
//! This crate has no I/O. It holds the job status model received from the
//! dubbing service, the client-visible [`workflow::WorkflowState`] machine,
//! and the catalog/validation helpers used before a job is submitted.

pub mod catalog;
pub mod error;
pub mod job_status;
pub mod types;
pub mod validation;
pub mod workflow;
