//! Configuration management for the edge-mirror proxy

use crate::error::{ProxyError, Result};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for the proxy core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Cache lifetime advertised to clients and enforced by the in-memory
    /// store, in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,

    /// Origin fetch timeout in seconds (default: 30)
    #[serde(default = "default_origin_timeout")]
    pub origin_timeout_secs: u64,

    /// Whether to coalesce concurrent cache misses for the same key into a
    /// single origin fetch (default: true). Correctness does not depend on
    /// this; disabling it only allows duplicate idempotent fetches.
    #[serde(default = "default_true")]
    pub coalesce_fetches: bool,

    /// Base URL of the origin backend per platform prefix,
    /// e.g. `jenkins: "https://updates.jenkins.io"`
    #[serde(default = "default_upstreams")]
    pub upstreams: HashMap<String, String>,

    /// Maximum size in bytes for the built-in memory store, 0 = unbounded
    /// (default: 0); applied by `MemoryCacheStore::from_config`
    #[serde(default)]
    pub memory_store_max_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            cache_max_age: default_cache_max_age(),
            origin_timeout_secs: default_origin_timeout(),
            coalesce_fetches: true,
            upstreams: default_upstreams(),
            memory_store_max_bytes: 0,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    ///
    /// # Returns
    /// * `Ok(ProxyConfig)` if the file parses and validates
    /// * `Err(ProxyError::Config)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            ProxyError::Config(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ProxyConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ProxyError::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation rules
    /// - `cache_max_age` and `origin_timeout_secs` must be non-zero
    /// - every known platform must have an upstream
    /// - upstream values must be absolute http(s) URLs without a trailing slash
    pub fn validate(&self) -> Result<()> {
        if self.cache_max_age == 0 {
            return Err(ProxyError::Config(
                "cache_max_age must be greater than zero".to_string(),
            ));
        }

        if self.origin_timeout_secs == 0 {
            return Err(ProxyError::Config(
                "origin_timeout_secs must be greater than zero".to_string(),
            ));
        }

        for platform in Platform::ALL {
            let upstream = self.upstreams.get(platform.prefix()).ok_or_else(|| {
                ProxyError::Config(format!(
                    "missing upstream for platform '{}'",
                    platform.prefix()
                ))
            })?;

            if !upstream.starts_with("http://") && !upstream.starts_with("https://") {
                return Err(ProxyError::Config(format!(
                    "upstream for '{}' must be an absolute http(s) URL, got '{}'",
                    platform.prefix(),
                    upstream
                )));
            }
            if upstream.ends_with('/') {
                return Err(ProxyError::Config(format!(
                    "upstream for '{}' must not end with '/', got '{}'",
                    platform.prefix(),
                    upstream
                )));
            }
        }

        Ok(())
    }

    /// Origin fetch timeout as a `Duration`
    pub fn origin_timeout(&self) -> Duration {
        Duration::from_secs(self.origin_timeout_secs)
    }

    /// Cache entry lifetime as a `Duration`
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_max_age)
    }

    /// Upstream base URL for a platform; validated configs always have one
    pub fn upstream_for(&self, platform: Platform) -> Result<&str> {
        self.upstreams
            .get(platform.prefix())
            .map(String::as_str)
            .ok_or_else(|| {
                ProxyError::Config(format!("missing upstream for platform '{}'", platform))
            })
    }
}

// Default value functions for serde

fn default_cache_max_age() -> u64 {
    3600 // 1 hour
}

fn default_origin_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_upstreams() -> HashMap<String, String> {
    HashMap::from([
        (
            "jenkins".to_string(),
            "https://updates.jenkins.io".to_string(),
        ),
        ("node".to_string(), "https://nodejs.org".to_string()),
        ("python".to_string(), "https://pypi.org".to_string()),
    ])
}
