// Property: a single full cache entry answers every range variant of a
// resource with byte-exact slices and correct 206 framing, and the cache key
// never depends on the Range header or the request method.

use bytes::Bytes;
use edge_mirror::cache_key::key_for;
use edge_mirror::models::{ByteRange, OriginResponse, ProxyRequest};
use edge_mirror::platform::Platform;
use edge_mirror::strategy::RangeCacheStrategy;
use edge_mirror::transform::transform;
use http::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use proptest::prelude::*;

fn full_entry(body: Vec<u8>) -> edge_mirror::models::CacheEntry {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    let response = OriginResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from(body),
    };
    RangeCacheStrategy::new(3600).build_entry(&response).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// For 0 <= s <= e < L, the served body is exactly bytes s..=e with
    /// matching Content-Length and Content-Range
    #[test]
    fn prop_range_slice_correctness(
        body in prop::collection::vec(any::<u8>(), 1..2048),
        s in 0usize..2048,
        e in 0usize..2048,
    ) {
        let len = body.len();
        let s = s % len;
        let e = s + (e % (len - s).max(1));
        prop_assume!(e < len);

        let entry = full_entry(body.clone());
        let range = ByteRange::new(s as u64, Some(e as u64)).unwrap();
        let response = RangeCacheStrategy::new(3600)
            .respond_from_entry(&entry, Some(range))
            .unwrap();

        prop_assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
        prop_assert_eq!(&response.body[..], &body[s..=e]);

        let expected_len = (e - s + 1).to_string();
        prop_assert_eq!(
            response.headers.get(CONTENT_LENGTH).unwrap().to_str().unwrap(),
            expected_len.as_str()
        );

        let expected_range = format!("bytes {}-{}/{}", s, e, len);
        prop_assert_eq!(
            response.headers.get(CONTENT_RANGE).unwrap().to_str().unwrap(),
            expected_range.as_str()
        );
    }

    /// A start at or beyond the resource length is a 416 with `bytes */L`
    #[test]
    fn prop_unsatisfiable_start(
        body in prop::collection::vec(any::<u8>(), 1..512),
        past in 0u64..1024,
    ) {
        let len = body.len() as u64;
        let entry = full_entry(body);
        let range = ByteRange::new(len + past, None).unwrap();

        let response = RangeCacheStrategy::new(3600)
            .respond_from_entry(&entry, Some(range))
            .unwrap();

        prop_assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
        let expected = format!("bytes */{}", len);
        prop_assert_eq!(
            response.headers.get(CONTENT_RANGE).unwrap().to_str().unwrap(),
            expected.as_str()
        );
        prop_assert!(response.body.is_empty());
    }

    /// An open-ended range reaches the last byte
    #[test]
    fn prop_open_range_reaches_end(
        body in prop::collection::vec(any::<u8>(), 1..512),
        s in 0usize..512,
    ) {
        let len = body.len();
        let s = s % len;

        let entry = full_entry(body.clone());
        let range = ByteRange::new(s as u64, None).unwrap();
        let response = RangeCacheStrategy::new(3600)
            .respond_from_entry(&entry, Some(range))
            .unwrap();

        prop_assert_eq!(&response.body[..], &body[s..]);
        let expected = format!("bytes {}-{}/{}", s, len - 1, len);
        prop_assert_eq!(
            response.headers.get(CONTENT_RANGE).unwrap().to_str().unwrap(),
            expected.as_str()
        );
    }

    /// Requests differing only by Range header (or GET vs HEAD) share a key
    #[test]
    fn prop_key_stable_under_range_and_method(
        name in "[a-z0-9][a-z0-9.-]{0,20}",
        start in 0u64..10_000,
        span in 0u64..10_000,
    ) {
        let path = format!("/jenkins/plugins/{}", name);
        let normalized = transform(&path, Platform::Jenkins).unwrap();
        let base_key = key_for(Platform::Jenkins, &normalized).unwrap();

        // Requests carrying arbitrary ranges and either method normalize to
        // the same path and therefore the same key
        let mut ranged = ProxyRequest::get(&path);
        ranged.headers.insert(
            RANGE,
            HeaderValue::from_str(&format!("bytes={}-{}", start, start + span)).unwrap(),
        );
        let mut head = ProxyRequest::get(&path);
        head.method = Method::HEAD;

        for request in [&ranged, &head] {
            let normalized = transform(&request.path, Platform::Jenkins).unwrap();
            let key = key_for(Platform::Jenkins, &normalized).unwrap();
            prop_assert_eq!(&key, &base_key);
        }
    }
}
