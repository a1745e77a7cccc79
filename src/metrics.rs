//! Metrics for the proxy core
//!
//! Two layers: process-wide atomic counters for external scraping, and a
//! request-scoped [`PerformanceMetrics`] record that is serialized into the
//! `X-Performance-Metrics` response header and discarded with the request.

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Response header carrying the request's performance record
pub const PERFORMANCE_METRICS_HEADER: &str = "x-performance-metrics";

/// Thread-safe crate-wide counters
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    origin_fetches: AtomicU64,
    coalesced_waits: AtomicU64,
    cache_writes_skipped: AtomicU64,
    cache_read_errors: AtomicU64,
    origin_errors: AtomicU64,
}

/// Snapshot of counters at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub origin_fetches: u64,
    pub coalesced_waits: u64,
    pub cache_writes_skipped: u64,
    pub cache_read_errors: u64,
    pub origin_errors: u64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_fetch(&self) {
        self.origin_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss that waited on another request's in-flight fetch
    pub fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// A cache write that was suppressed or failed; non-fatal by contract
    pub fn record_cache_write_skipped(&self) {
        self.cache_writes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_read_error(&self) {
        self.cache_read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_error(&self) {
        self.origin_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            origin_fetches: self.origin_fetches.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            cache_writes_skipped: self.cache_writes_skipped.load(Ordering::Relaxed),
            cache_read_errors: self.cache_read_errors.load(Ordering::Relaxed),
            origin_errors: self.origin_errors.load(Ordering::Relaxed),
        }
    }
}

/// Request-scoped timing and cache-outcome record.
///
/// Created when a request enters the coordinator and attached to the
/// response as a JSON header; never persisted across requests.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    /// Request start, milliseconds since the Unix epoch
    pub start: u64,
    /// Request completion, milliseconds since the Unix epoch
    pub complete: u64,
    /// Whether the response was served from the cache
    pub cache_hit: bool,
    /// Set when a cache write was suppressed or failed; distinguishable from
    /// a request-fatal error, which never produces this header at all
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cache_skipped: bool,
}

impl PerformanceMetrics {
    /// Start the clock for a request
    pub fn begin() -> Self {
        PerformanceMetrics {
            start: epoch_millis(),
            complete: 0,
            cache_hit: false,
            cache_skipped: false,
        }
    }

    /// Stamp the completion time
    pub fn finish(&mut self) {
        self.complete = epoch_millis();
    }

    /// Serialize this record into the response headers.
    ///
    /// Serialization of a flat struct of scalars cannot fail; a header-value
    /// failure is silently skipped since the annotation is advisory.
    pub fn annotate(&self, headers: &mut HeaderMap) {
        if let Ok(json) = serde_json::to_string(self) {
            if let Ok(value) = HeaderValue::from_str(&json) {
                headers.insert(
                    HeaderName::from_static(PERFORMANCE_METRICS_HEADER),
                    value,
                );
            }
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
