//! Observability and Metrics
//!
//! Per-family counters for request handling and confirm delivery.
//!
//! Uses relaxed atomic counters; values are for monitoring only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector owned by a registered family
#[derive(Debug)]
pub struct Metrics {
    /// Inbound messages handed to the dispatcher
    pub requests_received: AtomicU64,
    /// Inbound bytes handed to the dispatcher
    pub bytes_received: AtomicU64,
    /// Requests dropped without a confirm (decode, validation, dispatch errors)
    pub requests_rejected: AtomicU64,
    /// Confirms handed to the transport successfully
    pub confirms_sent: AtomicU64,
    /// Outbound confirm bytes
    pub bytes_sent: AtomicU64,
    /// Unicast or allocation failures while answering
    pub send_failures: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            confirms_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an inbound request
    pub fn request_received(&self, byte_count: u64) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a request dropped without a confirm
    pub fn request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered confirm
    pub fn confirm_sent(&self, byte_count: u64) {
        self.confirms_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a failed confirm
    pub fn send_failed(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            confirms_sent: self.confirms_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self, family: &str) {
        let snapshot = self.snapshot();
        info!(
            family,
            requests_received = snapshot.requests_received,
            bytes_received = snapshot.bytes_received,
            requests_rejected = snapshot.requests_rejected,
            confirms_sent = snapshot.confirms_sent,
            bytes_sent = snapshot.bytes_sent,
            send_failures = snapshot.send_failures,
            uptime_seconds = snapshot.uptime_seconds,
            "Family metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub bytes_received: u64,
    pub requests_rejected: u64,
    pub confirms_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
