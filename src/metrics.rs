/// Request counters for the /health and /metrics endpoints

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Point-in-time view of the counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Wake-time requests answered with options
    pub requests_successful: u64,
    /// Wake-time requests answered with a 400
    pub requests_rejected: u64,
    /// Timestamp of last wake-time request (Unix epoch seconds)
    pub last_request_time: u64,
    /// Whether the last wake-time request succeeded
    pub last_request_ok: bool,
}

/// Shared counters updated from connection tasks
#[derive(Debug)]
pub struct ServiceMetrics {
    requests_successful: AtomicU64,
    requests_rejected: AtomicU64,
    last_request_time: AtomicU64,
    last_request_ok: AtomicBool,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self {
            requests_successful: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            last_request_time: AtomicU64::new(0),
            last_request_ok: AtomicBool::new(true),
        }
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that produced wake-time options
    pub fn record_success(&self) {
        self.requests_successful.fetch_add(1, Ordering::Relaxed);
        self.touch(true);
    }

    /// Record a request rejected with a 400
    pub fn record_rejection(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        self.touch(false);
    }

    pub fn status(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_successful: self.requests_successful.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            last_request_time: self.last_request_time.load(Ordering::Relaxed),
            last_request_ok: self.last_request_ok.load(Ordering::Relaxed),
        }
    }

    fn touch(&self, ok: bool) {
        self.last_request_time.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            Ordering::Relaxed,
        );
        self.last_request_ok.store(ok, Ordering::Relaxed);
    }
}

/// Render counters in the Prometheus text exposition format
pub fn render_prometheus(status: &MetricsSnapshot) -> String {
    format!(
        "# HELP sleepcycle_requests_total Total number of wake-time requests\n\
         # TYPE sleepcycle_requests_total counter\n\
         sleepcycle_requests_total{{result=\"success\"}} {}\n\
         sleepcycle_requests_total{{result=\"rejected\"}} {}\n\
         # HELP sleepcycle_last_request_timestamp Unix timestamp of last wake-time request\n\
         # TYPE sleepcycle_last_request_timestamp gauge\n\
         sleepcycle_last_request_timestamp {}\n\
         # HELP sleepcycle_last_request_ok Whether the last request succeeded (1) or was rejected (0)\n\
         # TYPE sleepcycle_last_request_ok gauge\n\
         sleepcycle_last_request_ok {}\n",
        status.requests_successful,
        status.requests_rejected,
        status.last_request_time,
        if status.last_request_ok { 1 } else { 0 }
    )
}
