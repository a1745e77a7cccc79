//! Request orchestration and concurrent miss coalescing
//!
//! The coordinator owns the full request path: normalize, derive the cache
//! key, consult the store, fetch from the origin on a miss, and compose the
//! response through the range strategy. Concurrent misses for one key are
//! coalesced into a single detached origin fetch that every waiter shares.

use crate::cache_key::{key_for, CacheKey};
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::metrics::{PerformanceMetrics, ProxyMetrics};
use crate::models::{CacheEntry, ProxyRequest, ProxyResponse};
use crate::origin::OriginClient;
use crate::platform::{self, Platform};
use crate::store::CacheStore;
use crate::strategy::RangeCacheStrategy;
use crate::transform::{transform, NormalizedPath};
use bytes::Bytes;
use http::Method;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Shared result of one origin flight.
///
/// Cloned to every waiter; each waiter composes its own response from it so
/// a ranged and a full request can share one fetch.
#[derive(Debug, Clone)]
enum FlightOutcome {
    /// A full 200 entry, plus whether the cache write was skipped
    Entry(Arc<CacheEntry>, bool),
    /// A non-cacheable origin response, passed through unmodified
    Passthrough(Arc<ProxyResponse>),
    /// The fetch itself failed
    Failed(ProxyError),
}

type InFlightMap = Mutex<HashMap<CacheKey, broadcast::Sender<FlightOutcome>>>;

/// Coordinates the cache, the origin, and the range strategy for requests
pub struct FetchCoordinator {
    config: Arc<ProxyConfig>,
    origin: Arc<dyn OriginClient>,
    store: Arc<dyn CacheStore>,
    strategy: RangeCacheStrategy,
    metrics: Arc<ProxyMetrics>,
    in_flight: Arc<InFlightMap>,
}

impl FetchCoordinator {
    /// Create a coordinator over injected origin and store capabilities.
    ///
    /// Validates the configuration and the platform rule registry up front.
    pub fn new(
        config: ProxyConfig,
        origin: Arc<dyn OriginClient>,
        store: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        config.validate()?;
        platform::validate_rules()?;

        let strategy = RangeCacheStrategy::new(config.cache_max_age);
        Ok(FetchCoordinator {
            config: Arc::new(config),
            origin,
            store,
            strategy,
            metrics: Arc::new(ProxyMetrics::new()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Crate-wide counters
    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }

    /// Handle one inbound request end to end.
    ///
    /// Returns `Err` only for user-visible failures (unmappable paths,
    /// origin failures); cache-layer trouble degrades to passthrough and is
    /// reported through metrics and the response annotation instead.
    pub async fn handle(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        self.metrics.record_request();
        let mut perf = PerformanceMetrics::begin();

        let platform = platform_of(&request.path)?;
        let normalized = transform(&request.path, platform)?;
        let key = key_for(platform, &normalized)?;
        let range = request.byte_range();

        debug!(
            "handling request: method={}, path={}, key={}, range={:?}",
            request.method, request.path, key, range
        );

        // A store read failure is a miss that also disables the write-back.
        let mut store_usable = true;
        let cached = match self.store.get(&key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("cache read failed, treating as miss: key={}, error={}", key, e);
                self.metrics.record_cache_read_error();
                store_usable = false;
                None
            }
        };

        let response = match cached {
            Some(entry) => {
                self.metrics.record_cache_hit();
                perf.cache_hit = true;
                self.strategy.respond_from_entry(&entry, range)?
            }
            None => {
                self.metrics.record_cache_miss();
                let outcome = self.fetch_coalesced(platform, normalized, key, store_usable).await;
                match outcome {
                    FlightOutcome::Entry(entry, skipped) => {
                        perf.cache_skipped = skipped;
                        self.strategy.respond_from_entry(&entry, range)?
                    }
                    FlightOutcome::Passthrough(response) => {
                        perf.cache_skipped = true;
                        (*response).clone()
                    }
                    FlightOutcome::Failed(e) => {
                        self.metrics.record_origin_error();
                        return Err(e);
                    }
                }
            }
        };

        Ok(finalize(response, &request.method, perf))
    }

    /// Resolve a miss through the in-flight map.
    ///
    /// The first requester for a key starts a detached flight and inserts
    /// its broadcast sender; followers subscribe and wait. The map entry is
    /// removed before the outcome is broadcast, on every exit path, so a
    /// failed flight can never wedge the key.
    async fn fetch_coalesced(
        &self,
        platform: Platform,
        path: NormalizedPath,
        key: CacheKey,
        store_usable: bool,
    ) -> FlightOutcome {
        if !self.config.coalesce_fetches {
            return run_flight(
                Arc::clone(&self.origin),
                Arc::clone(&self.store),
                self.strategy.clone(),
                Arc::clone(&self.metrics),
                Arc::clone(&self.config),
                platform,
                path,
                key,
                store_usable,
            )
            .await;
        }

        let mut rx = {
            let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tx) = map.get(&key) {
                debug!("joining in-flight fetch: key={}", key);
                self.metrics.record_coalesced_wait();
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                map.insert(key.clone(), tx.clone());

                let origin = Arc::clone(&self.origin);
                let store = Arc::clone(&self.store);
                let strategy = self.strategy.clone();
                let metrics = Arc::clone(&self.metrics);
                let config = Arc::clone(&self.config);
                let in_flight = Arc::clone(&self.in_flight);

                // Detached so an aborted caller cannot cancel the flight the
                // other waiters depend on.
                tokio::spawn(async move {
                    let outcome = run_flight(
                        origin,
                        store,
                        strategy,
                        metrics,
                        config,
                        platform,
                        path,
                        key.clone(),
                        store_usable,
                    )
                    .await;

                    {
                        let mut map = in_flight.lock().unwrap_or_else(|e| e.into_inner());
                        map.remove(&key);
                    }
                    // No receivers left means every waiter was aborted
                    let _ = tx.send(outcome);
                });

                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(e) => FlightOutcome::Failed(ProxyError::Internal(format!(
                "in-flight fetch channel closed: {}",
                e
            ))),
        }
    }
}

/// Perform one origin fetch and, when eligible, the cache write-back.
///
/// Always issued full and unranged even when the triggering client asked for
/// a range: partial requests must not prevent population of a reusable full
/// entry.
#[allow(clippy::too_many_arguments)]
async fn run_flight(
    origin: Arc<dyn OriginClient>,
    store: Arc<dyn CacheStore>,
    strategy: RangeCacheStrategy,
    metrics: Arc<ProxyMetrics>,
    config: Arc<ProxyConfig>,
    platform: Platform,
    path: NormalizedPath,
    key: CacheKey,
    store_usable: bool,
) -> FlightOutcome {
    metrics.record_origin_fetch();

    let fetched = tokio::time::timeout(config.origin_timeout(), origin.fetch(platform, &path)).await;
    let response = match fetched {
        Err(_) => {
            warn!("origin fetch timed out: key={}", key);
            return FlightOutcome::Failed(ProxyError::Timeout(config.origin_timeout_secs));
        }
        Ok(Err(e)) => {
            warn!("origin fetch failed: key={}, error={}", key, e);
            return FlightOutcome::Failed(e);
        }
        Ok(Ok(response)) => response,
    };

    if !strategy.is_cacheable(&response) {
        info!(
            "origin response not cacheable, passing through: key={}, status={}",
            key, response.status
        );
        metrics.record_cache_write_skipped();
        return FlightOutcome::Passthrough(Arc::new(strategy.passthrough(response)));
    }

    let entry = match strategy.build_entry(&response) {
        Ok(entry) => entry,
        Err(e) => {
            // is_cacheable passed, so this is unreachable in practice; keep
            // the invariant enforcement non-fatal regardless
            warn!("cache entry rejected: key={}, error={}", key, e);
            metrics.record_cache_write_skipped();
            return FlightOutcome::Passthrough(Arc::new(strategy.passthrough(response)));
        }
    };

    let mut skipped = false;
    if store_usable {
        if let Err(e) = store.put(&key, entry.clone()).await {
            warn!("cache write failed, serving without caching: key={}, error={}", key, e);
            metrics.record_cache_write_skipped();
            skipped = true;
        } else {
            debug!("stored full entry: key={}, bytes={}", key, entry.body.len());
        }
    } else {
        metrics.record_cache_write_skipped();
        skipped = true;
    }

    FlightOutcome::Entry(Arc::new(entry), skipped)
}

/// Extract the platform selector from the leading path segment
fn platform_of(path: &str) -> Result<Platform> {
    let segment = path
        .trim_start_matches('/')
        .split(['/', '?'])
        .next()
        .unwrap_or("");
    segment.parse()
}

/// Blank HEAD bodies and attach the performance annotation
fn finalize(
    mut response: ProxyResponse,
    method: &Method,
    mut perf: PerformanceMetrics,
) -> ProxyResponse {
    if method == Method::HEAD {
        response.body = Bytes::new();
    }
    perf.finish();
    perf.annotate(&mut response.headers);
    response
}
