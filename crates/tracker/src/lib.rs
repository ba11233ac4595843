//! Job-status polling engine.
//!
//! [`poller::StatusPoller::track`] spawns one polling session per job. The
//! session queries a [`source::StatusSource`] on a fixed interval, backs off
//! linearly on errors, gives up after too many consecutive failures or an
//! absolute duration ceiling, and issues a compensating refund whenever a
//! job ends abnormally. [`bridge::track_workflow`] feeds the session's
//! callbacks into a [`dubflow_core::workflow::WorkflowState`].

pub mod backoff;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod poller;
pub mod source;
