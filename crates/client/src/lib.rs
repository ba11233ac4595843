//! HTTP client for the dubbing service.
//!
//! [`api::DubbingApi`] wraps every endpoint the client talks to: upload
//! preparation and transfer, pipeline start, status, refunds, balance, job
//! history and magic-link authentication. The bearer token is kept in a
//! shared [`session::SessionStore`].

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
