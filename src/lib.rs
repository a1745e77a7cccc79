//! Edge Mirror
//!
//! A range-aware edge caching reverse proxy core that fronts heterogeneous
//! content platforms (CI plugin repositories, package registries, raw file
//! hosts) behind a single URL space.
//!
//! # Overview
//!
//! Incoming paths of the form `/{platform}/{rest...}` are rewritten into the
//! backend's canonical layout, fetched once as a full resource, and stored as
//! whole status-200 cache entries. Byte range requests never reach the store:
//! the proxy slices the cached full body locally and answers 206 itself,
//! which keeps one cache entry valid for every range variant of a resource.
//!
//! # Architecture
//!
//! - [`platform`]: closed registry of platforms and their rewrite rules
//! - [`transform`]: pure path normalization (passthrough prefixes, default
//!   rewrite target, query preservation)
//! - [`cache_key`]: range- and method-independent cache key derivation
//! - [`strategy`]: cacheability decisions, range-sensitive media handling,
//!   and response composition (200/206/416)
//! - [`coordinator`]: orchestration plus single-flight coalescing of
//!   concurrent misses
//! - [`store`] / [`origin`]: injected capabilities for storage and upstream
//!   fetches, with production implementations
//! - [`metrics`]: process counters and the per-request
//!   `X-Performance-Metrics` annotation
//!
//! # Quick start
//!
//! ```rust,no_run
//! use edge_mirror::{FetchCoordinator, HttpOriginClient, MemoryCacheStore, ProxyConfig, ProxyRequest};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProxyConfig::default();
//! let origin = Arc::new(HttpOriginClient::new(config.clone())?);
//! let store = Arc::new(MemoryCacheStore::from_config(&config));
//! let proxy = FetchCoordinator::new(config, origin, store)?;
//!
//! let response = proxy.handle(&ProxyRequest::get("/jenkins/update-center.json")).await?;
//! println!("status: {}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod cache_key;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;
pub mod origin;
pub mod platform;
pub mod store;
pub mod strategy;
pub mod transform;

// Re-export commonly used types
pub use cache_key::{key_for, CacheKey};
pub use config::ProxyConfig;
pub use coordinator::FetchCoordinator;
pub use error::{ProxyError, Result};
pub use metrics::{MetricsSnapshot, PerformanceMetrics, ProxyMetrics, PERFORMANCE_METRICS_HEADER};
pub use models::{ByteRange, CacheEntry, OriginResponse, ProxyRequest, ProxyResponse, ResolvedRange};
pub use origin::{HttpOriginClient, OriginClient};
pub use platform::{Platform, PlatformRule};
pub use store::{CacheStore, MemoryCacheStore, StoreStats, UnavailableStore};
pub use strategy::{is_range_sensitive, RangeCacheStrategy};
pub use transform::{transform, NormalizedPath};
