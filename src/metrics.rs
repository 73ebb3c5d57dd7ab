//! Request and domain counters
//!
//! Counters are recorded through the [`Metrics`] trait carried in the
//! application state instead of process-wide variables, so each test can
//! build its own recorder and assert on it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

pub const REQUESTS: &str = "requests";
pub const ERRORS: &str = "errors";
pub const IN_FLIGHT: &str = "in_flight";

/// Counter/gauge sink
pub trait Metrics: Send + Sync {
    fn increment(&self, name: &'static str);

    fn adjust_gauge(&self, name: &'static str, delta: i64);

    fn snapshot(&self) -> MetricsSnapshot;
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, i64>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> i64 {
        self.gauges.get(name).copied().unwrap_or(0)
    }
}

/// In-memory recorder, exposed at `/metrics`
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut MetricsSnapshot) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl Metrics for RecordingMetrics {
    fn increment(&self, name: &'static str) {
        self.with(|m| *m.counters.entry(name.to_string()).or_insert(0) += 1);
    }

    fn adjust_gauge(&self, name: &'static str, delta: i64) {
        self.with(|m| *m.gauges.entry(name.to_string()).or_insert(0) += delta);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.with(|m| m.clone())
    }
}

/// Counts every request, every error response and the requests in flight
pub async fn track_requests(
    State(metrics): State<Arc<dyn Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    metrics.adjust_gauge(IN_FLIGHT, 1);
    let response = next.run(request).await;
    metrics.adjust_gauge(IN_FLIGHT, -1);

    metrics.increment(REQUESTS);
    if response.status().is_client_error() || response.status().is_server_error() {
        metrics.increment(ERRORS);
    }

    response
}
