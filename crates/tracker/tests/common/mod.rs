//! Shared fixtures for tracker integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dubflow_core::job_status::{JobOutcome, JobStatus};
use dubflow_tracker::poller::TrackFailure;
use dubflow_tracker::source::{SourceError, StatusSource};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Scripted status source
// ---------------------------------------------------------------------------

/// What the scripted source does for one query.
#[derive(Clone)]
pub enum Step {
    Status(JobOutcome),
    Fail(&'static str),
    /// Never resolve.
    Hang,
}

pub fn running() -> Step {
    Step::Status(JobOutcome::Running)
}

pub fn failed(message: &str) -> Step {
    Step::Status(JobOutcome::Failed(message.to_string()))
}

pub fn completed(kind: &str, url: &str) -> Step {
    Step::Status(JobOutcome::Completed(HashMap::from([(
        kind.to_string(),
        url.to_string(),
    )])))
}

/// How the scripted source answers refund requests.
#[derive(Clone, Copy)]
pub enum RefundBehavior {
    Accept,
    Reject,
    Hang,
}

type QueryHook = Box<dyn Fn(usize) + Send + Sync>;

/// A [`StatusSource`] that plays back a fixed script, then repeats
/// `fallback` forever. Records when each query and refund happened.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    refund_behavior: RefundBehavior,
    on_query: Option<QueryHook>,
    queries: Mutex<Vec<Instant>>,
    refunds: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            refund_behavior: RefundBehavior::Accept,
            on_query: None,
            queries: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
        }
    }

    pub fn with_refund(mut self, behavior: RefundBehavior) -> Self {
        self.refund_behavior = behavior;
        self
    }

    /// Run `hook(n)` when the n-th query (1-based) arrives.
    pub fn with_query_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_query = Some(Box::new(hook));
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Gaps between consecutive queries.
    pub fn query_gaps(&self) -> Vec<Duration> {
        let queries = self.queries.lock().unwrap();
        queries.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus, SourceError> {
        let n = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(Instant::now());
            queries.len()
        };
        if let Some(hook) = &self.on_query {
            hook(n);
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Status(outcome) => Ok(JobStatus::new(job_id, outcome)),
            Step::Fail(message) => Err(message.into()),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn request_refund(&self, job_id: &str) -> Result<(), SourceError> {
        self.refunds.lock().unwrap().push(job_id.to_string());
        match self.refund_behavior {
            RefundBehavior::Accept => Ok(()),
            RefundBehavior::Reject => Err("refund endpoint unavailable".into()),
            RefundBehavior::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Callback recorder
// ---------------------------------------------------------------------------

/// One observed callback invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Update(JobOutcome),
    Complete(JobStatus),
    Error(TrackFailure),
}

/// Collects callback invocations in order, with the time they happened.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(Instant, Event)>>>,
}

impl Recorder {
    pub fn on_update(&self) -> impl FnMut(&JobStatus) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |status: &JobStatus| {
            events
                .lock()
                .unwrap()
                .push((Instant::now(), Event::Update(status.outcome.clone())));
        }
    }

    pub fn on_complete(&self) -> impl FnOnce(JobStatus) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |status: JobStatus| {
            events
                .lock()
                .unwrap()
                .push((Instant::now(), Event::Complete(status)));
        }
    }

    pub fn on_error(&self) -> impl FnOnce(TrackFailure) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |failure: TrackFailure| {
            events
                .lock()
                .unwrap()
                .push((Instant::now(), Event::Error(failure)));
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed_events(&self) -> Vec<(Instant, Event)> {
        self.events.lock().unwrap().clone()
    }

    pub fn updates(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Update(_)))
            .count()
    }

    /// Number of `on_complete` plus `on_error` invocations.
    pub fn terminal_callbacks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Complete(_) | Event::Error(_)))
            .count()
    }
}
