//! Range-aware caching strategy
//!
//! Decides what may enter the cache and composes every response served from
//! a cached entry. The store only ever holds full status-200 bodies; range
//! requests are answered by slicing those bodies locally, so a 206 is never
//! persisted and the entry's length is always known at slice time.

use crate::error::{ProxyError, Result};
use crate::models::{ByteRange, CacheEntry, OriginResponse, ProxyResponse};
use bytes::Bytes;
use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    ETAG, LAST_MODIFIED,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Content types whose byte offsets must survive verbatim.
///
/// Compressed transfer encodings change byte offsets, so any type a client
/// may range over is pinned to an identity encoding. The table is explicit
/// rather than inferred from a host runtime so the policy is portable and
/// testable offline.
const RANGE_SENSITIVE_TYPES: &[&str] = &[
    "application/octet-stream",
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/x-tar",
    "application/x-7z-compressed",
    "application/x-bzip2",
    "application/x-xz",
    "application/java-archive",
    "application/x-iso9660-image",
    "application/vnd.android.package-archive",
];

/// Classify a media type as range-sensitive.
///
/// All audio and video types are range-sensitive, plus the binary archive
/// types listed in [`RANGE_SENSITIVE_TYPES`]. Parameters and case are
/// ignored.
pub fn is_range_sensitive(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("audio/")
        || essence.starts_with("video/")
        || RANGE_SENSITIVE_TYPES.contains(&essence.as_str())
}

/// Composes cache entries and responses for one configured max-age
#[derive(Debug, Clone)]
pub struct RangeCacheStrategy {
    max_age: u64,
}

impl RangeCacheStrategy {
    pub fn new(max_age: u64) -> Self {
        RangeCacheStrategy { max_age }
    }

    /// Whether an origin response is eligible for the cache.
    ///
    /// Only full 200 responses qualify; partial, redirect, and error
    /// responses pass through unmodified and are never persisted.
    pub fn is_cacheable(&self, response: &OriginResponse) -> bool {
        response.status == StatusCode::OK
    }

    /// Build the cache entry for a full origin response.
    ///
    /// This is the enforcement point for the no-partial-entries invariant:
    /// a non-200 response is rejected with `CacheWriteSkipped` before it can
    /// reach any store. Range-sensitive entries are pinned to an identity
    /// content encoding.
    pub fn build_entry(&self, response: &OriginResponse) -> Result<CacheEntry> {
        if response.status != StatusCode::OK {
            warn!(
                "refusing to build cache entry from non-200 response: status={}",
                response.status
            );
            return Err(ProxyError::CacheWriteSkipped(format!(
                "only status-200 responses are cacheable, got {}",
                response.status
            )));
        }

        let content_type = response
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut headers = HeaderMap::new();
        for name in [ETAG, LAST_MODIFIED] {
            if let Some(value) = response.headers.get(&name) {
                headers.insert(name, value.clone());
            }
        }

        // The origin is asked for identity encoding, but a misbehaving one
        // could still claim compression; never carry that claim into an
        // entry whose offsets must stay valid.
        if content_type.as_deref().is_some_and(is_range_sensitive) {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("identity"));
        } else if let Some(encoding) = response.headers.get(CONTENT_ENCODING) {
            headers.insert(CONTENT_ENCODING, encoding.clone());
        }

        Ok(CacheEntry {
            body: response.body.clone(),
            content_type,
            headers,
            stored_at: SystemTime::now(),
        })
    }

    /// Compose the response for a request served from a full cached entry.
    ///
    /// Without a range this is the entry verbatim as a 200. With a range the
    /// full body is sliced locally into a 206; a start at or beyond the
    /// resource length becomes a 416 with `Content-Range: bytes */total`.
    pub fn respond_from_entry(
        &self,
        entry: &CacheEntry,
        range: Option<ByteRange>,
    ) -> Result<ProxyResponse> {
        let resource_len = entry.resource_len();

        let range = match range {
            None => return Ok(self.full_response(entry)),
            Some(range) => range,
        };

        let resolved = match range.resolve(resource_len) {
            Ok(resolved) => resolved,
            Err(ProxyError::RangeUnsatisfiable { .. }) => {
                debug!(
                    "unsatisfiable range: start={}, resource_len={}",
                    range.start, resource_len
                );
                return Ok(self.unsatisfiable_response(resource_len));
            }
            Err(e) => return Err(e),
        };

        let slice = entry
            .body
            .slice(resolved.start as usize..=(resolved.end as usize));

        let mut headers = self.base_headers(entry);
        headers.insert(CONTENT_LENGTH, content_length_value(resolved.size())?);
        headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&resolved.content_range(resource_len))
                .map_err(|e| ProxyError::Internal(format!("invalid Content-Range: {}", e)))?,
        );

        debug!(
            "sliced cached entry: range={}-{}, total={}",
            resolved.start, resolved.end, resource_len
        );

        Ok(ProxyResponse {
            status: StatusCode::PARTIAL_CONTENT,
            headers,
            body: slice,
        })
    }

    /// Pass a non-cacheable origin response through unmodified
    pub fn passthrough(&self, response: OriginResponse) -> ProxyResponse {
        ProxyResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }

    fn full_response(&self, entry: &CacheEntry) -> ProxyResponse {
        let mut headers = self.base_headers(entry);
        if let Ok(value) = content_length_value(entry.resource_len()) {
            headers.insert(CONTENT_LENGTH, value);
        }
        ProxyResponse {
            status: StatusCode::OK,
            headers,
            body: entry.body.clone(),
        }
    }

    fn unsatisfiable_response(&self, resource_len: u64) -> ProxyResponse {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", resource_len)) {
            headers.insert(CONTENT_RANGE, value);
        }
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        ProxyResponse {
            status: StatusCode::RANGE_NOT_SATISFIABLE,
            headers,
            body: Bytes::new(),
        }
    }

    /// Entity and caching headers shared by the 200 and 206 forms
    fn base_headers(&self, entry: &CacheEntry) -> HeaderMap {
        let mut headers = entry.headers.clone();
        if let Some(content_type) = &entry.content_type {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", self.max_age)) {
            headers.insert(CACHE_CONTROL, value);
        }
        headers
    }
}

fn content_length_value(len: u64) -> Result<HeaderValue> {
    HeaderValue::from_str(&len.to_string())
        .map_err(|e| ProxyError::Internal(format!("invalid Content-Length: {}", e)))
}
