use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Request counters shared by every handler.
///
/// Counters are atomics so concurrent requests never lose updates.
/// Processing time is accumulated in whole microseconds.
pub struct ProcessingStats {
    started_at: Instant,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_processing_micros: AtomicU64,
    last_request_time: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time view of [`ProcessingStats`] with derived rates.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Sum of successful request durations, in seconds.
    pub total_processing_time: f64,
    pub last_request_time: Option<DateTime<Utc>>,
    /// Percentage of requests that succeeded.
    pub success_rate: f64,
    /// Mean seconds per successful request.
    pub avg_latency: f64,
    /// Requests per second over the service uptime.
    pub requests_per_second: f64,
    pub uptime_secs: f64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_processing_micros: AtomicU64::new(0),
            last_request_time: Mutex::new(None),
        }
    }

    /// Count a new request and return its start instant.
    pub fn record_start(&self) -> Instant {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let mut last = self
            .last_request_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(now);
        Instant::now()
    }

    pub fn record_success(&self, duration_secs: f64) {
        let micros = (duration_secs.max(0.0) * 1_000_000.0).round() as u64;
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_processing_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_time = self.total_processing_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let last_request_time = *self
            .last_request_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let uptime_secs = self.started_at.elapsed().as_secs_f64();

        // Denominators floor at 1, so an idle service reports zeros.
        StatsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            total_processing_time: total_time,
            last_request_time,
            success_rate: successful as f64 / total.max(1) as f64 * 100.0,
            avg_latency: total_time / successful.max(1) as f64,
            requests_per_second: total as f64 / uptime_secs.max(1.0),
            uptime_secs,
        }
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}
