//! Core data models for the edge-mirror proxy

use crate::error::{ProxyError, Result};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::time::SystemTime;

/// A byte range parsed from an HTTP `Range` request header.
///
/// The end position is optional: `bytes=500-` asks for everything from byte
/// 500 to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Starting byte position (inclusive)
    pub start: u64,
    /// Ending byte position (inclusive), or `None` for an open-ended range
    pub end: Option<u64>,
}

impl ByteRange {
    /// Create a new ByteRange
    ///
    /// # Returns
    /// * `Ok(ByteRange)` if the range is valid
    /// * `Err(ProxyError)` if a bounded end is smaller than start
    pub fn new(start: u64, end: Option<u64>) -> Result<Self> {
        if let Some(end) = end {
            if start > end {
                return Err(ProxyError::Parse(format!(
                    "range start ({}) must be <= end ({})",
                    start, end
                )));
            }
        }
        Ok(ByteRange { start, end })
    }

    /// Parse a ByteRange from an HTTP Range header value
    ///
    /// Accepts `bytes=start-end` and the open-ended `bytes=start-`. Suffix
    /// ranges (`bytes=-N`) and multi-range headers are rejected; callers that
    /// cannot satisfy them fall back to the full representation.
    pub fn from_header(header: &str) -> Result<Self> {
        let header = header.trim();

        let range_part = header.strip_prefix("bytes=").ok_or_else(|| {
            ProxyError::Parse(format!(
                "Range header must start with 'bytes=', got: {}",
                header
            ))
        })?;

        if range_part.contains(',') {
            return Err(ProxyError::Parse(format!(
                "multi-range requests are not supported: {}",
                range_part
            )));
        }

        let (start_str, end_str) = range_part.split_once('-').ok_or_else(|| {
            ProxyError::Parse(format!(
                "invalid range format, expected 'start-end', got: {}",
                range_part
            ))
        })?;

        let start = start_str
            .trim()
            .parse::<u64>()
            .map_err(|e| ProxyError::Parse(format!("invalid range start: {}", e)))?;

        let end_str = end_str.trim();
        let end = if end_str.is_empty() {
            None
        } else {
            Some(
                end_str
                    .parse::<u64>()
                    .map_err(|e| ProxyError::Parse(format!("invalid range end: {}", e)))?,
            )
        };

        ByteRange::new(start, end)
    }

    /// Convert this ByteRange back to a Range header value
    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }

    /// Resolve this range against a resource of known length.
    ///
    /// An open end is clamped to the last byte; a bounded end past the last
    /// byte is likewise clamped, per RFC 9110. A start at or beyond the
    /// resource length is unsatisfiable.
    pub fn resolve(&self, resource_len: u64) -> Result<ResolvedRange> {
        if resource_len == 0 || self.start >= resource_len {
            return Err(ProxyError::RangeUnsatisfiable {
                start: self.start,
                resource_len,
            });
        }
        let end = self
            .end
            .map_or(resource_len - 1, |e| e.min(resource_len - 1));
        Ok(ResolvedRange {
            start: self.start,
            end,
        })
    }
}

/// A range resolved against a concrete resource length; both bounds inclusive
/// and within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
}

impl ResolvedRange {
    /// Number of bytes covered by this range; never zero, both bounds are
    /// inclusive
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Format the `Content-Range` header value for this range
    pub fn content_range(&self, resource_len: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, resource_len)
    }
}

/// A full-content response stored in the cache.
///
/// Only status-200 responses ever become entries; the strategy refuses to
/// build one from anything else.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Full response body
    pub body: Bytes,
    /// Content type reported by the origin, reapplied to every response
    /// composed from this entry
    pub content_type: Option<String>,
    /// Validator and encoding headers carried through to every response built
    /// from this entry
    pub headers: HeaderMap,
    /// When the entry was stored
    pub stored_at: SystemTime,
}

impl CacheEntry {
    /// Total length of the stored full body
    pub fn resource_len(&self) -> u64 {
        self.body.len() as u64
    }
}

/// A response from the origin, before any caching decision
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// An inbound request as seen by the coordinator
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Full request path including the platform prefix, plus any query string
    pub path: String,
    pub headers: HeaderMap,
}

impl ProxyRequest {
    /// Build a GET request for a path
    pub fn get(path: impl Into<String>) -> Self {
        ProxyRequest {
            method: Method::GET,
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Extract the client's Range header, if present and parseable.
    ///
    /// Unparseable range headers are ignored, which downgrades the request to
    /// a full-content one rather than failing it.
    pub fn byte_range(&self) -> Option<ByteRange> {
        let value = self.headers.get(http::header::RANGE)?;
        let raw = value.to_str().ok()?;
        match ByteRange::from_header(raw) {
            Ok(range) => Some(range),
            Err(e) => {
                tracing::debug!("ignoring unparseable Range header '{}': {}", raw, e);
                None
            }
        }
    }
}

/// The response handed back to the host for a single request
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_bounded() {
        let range = ByteRange::from_header("bytes=0-1023").unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, Some(1023));
        assert_eq!(range.to_header(), "bytes=0-1023");
    }

    #[test]
    fn test_byte_range_open_ended() {
        let range = ByteRange::from_header("bytes=500-").unwrap();
        assert_eq!(range.start, 500);
        assert_eq!(range.end, None);
        assert_eq!(range.to_header(), "bytes=500-");
    }

    #[test]
    fn test_byte_range_invalid() {
        assert!(ByteRange::from_header("bytes=100-50").is_err());
        assert!(ByteRange::from_header("items=0-10").is_err());
        assert!(ByteRange::from_header("bytes=-500").is_err());
        assert!(ByteRange::from_header("bytes=0-10,20-30").is_err());
    }

    #[test]
    fn test_byte_range_whitespace() {
        let range = ByteRange::from_header("  bytes=10-20  ").unwrap();
        assert_eq!(range.start, 10);
        assert_eq!(range.end, Some(20));
    }

    #[test]
    fn test_resolve_within_bounds() {
        let range = ByteRange::new(10, Some(19)).unwrap();
        let resolved = range.resolve(100).unwrap();
        assert_eq!(resolved.start, 10);
        assert_eq!(resolved.end, 19);
        assert_eq!(resolved.size(), 10);
        assert_eq!(resolved.content_range(100), "bytes 10-19/100");
    }

    #[test]
    fn test_resolve_clamps_end() {
        let range = ByteRange::new(90, Some(500)).unwrap();
        let resolved = range.resolve(100).unwrap();
        assert_eq!(resolved.end, 99);

        let open = ByteRange::new(90, None).unwrap();
        let resolved = open.resolve(100).unwrap();
        assert_eq!(resolved.end, 99);
        assert_eq!(resolved.size(), 10);
    }

    #[test]
    fn test_resolve_unsatisfiable() {
        let range = ByteRange::new(100, None).unwrap();
        let err = range.resolve(100).unwrap_err();
        assert!(matches!(err, ProxyError::RangeUnsatisfiable { .. }));

        let range = ByteRange::new(0, Some(10)).unwrap();
        assert!(range.resolve(0).is_err());
    }

    #[test]
    fn test_request_byte_range_ignores_garbage() {
        let mut request = ProxyRequest::get("/jenkins/x.hpi");
        request.headers.insert(
            http::header::RANGE,
            http::HeaderValue::from_static("bytes=0-10,20-30"),
        );
        assert!(request.byte_range().is_none());

        request.headers.insert(
            http::header::RANGE,
            http::HeaderValue::from_static("bytes=5-9"),
        );
        let range = request.byte_range().unwrap();
        assert_eq!(range.start, 5);
        assert_eq!(range.end, Some(9));
    }
}
