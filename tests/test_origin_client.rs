// HttpOriginClient behavior against a mock origin server.

use edge_mirror::origin::{HttpOriginClient, OriginClient};
use edge_mirror::platform::Platform;
use edge_mirror::transform::transform;
use edge_mirror::ProxyConfig;
use http::StatusCode;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    for platform in Platform::ALL {
        config
            .upstreams
            .insert(platform.prefix().to_string(), server.uri());
    }
    config
}

#[tokio::test]
async fn test_fetch_uses_canonical_path_and_identity_encoding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/current/update-center.json"))
        .and(header("accept-encoding", "identity"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_bytes(&b"{\"plugins\":{}}"[..]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpOriginClient::new(config_for(&server)).unwrap();
    let normalized = transform("/jenkins/update-center.json", Platform::Jenkins).unwrap();

    let response = client.fetch(Platform::Jenkins, &normalized).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"{\"plugins\":{}}");
    assert_eq!(
        response.headers.get("content-type").unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_fetch_preserves_query_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/current/update-center.json"))
        .and(query_param("version", "2.452"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"ok"[..]))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpOriginClient::new(config_for(&server)).unwrap();
    let normalized =
        transform("/jenkins/update-center.json?version=2.452", Platform::Jenkins).unwrap();

    let response = client.fetch(Platform::Jenkins, &normalized).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"ok");
}

#[tokio::test]
async fn test_non_200_status_is_returned_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/current/missing.hpi"))
        .respond_with(ResponseTemplate::new(404).set_body_bytes(&b"not found"[..]))
        .mount(&server)
        .await;

    let client = HttpOriginClient::new(config_for(&server)).unwrap();
    let normalized = transform("/jenkins/missing.hpi", Platform::Jenkins).unwrap();

    // Transport succeeded, so the status passes through for the strategy to judge
    let response = client.fetch(Platform::Jenkins, &normalized).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(&response.body[..], b"not found");
}

#[tokio::test]
async fn test_unreachable_origin_is_an_origin_error() {
    // Bind then drop a server to get a port with nothing listening
    let server = MockServer::start().await;
    let config = config_for(&server);
    drop(server);

    let client = HttpOriginClient::new(config).unwrap();
    let normalized = transform("/jenkins/update-center.json", Platform::Jenkins).unwrap();

    let err = client.fetch(Platform::Jenkins, &normalized).await.unwrap_err();
    assert!(err.is_user_visible());
    assert!(matches!(err.to_http_status(), 502 | 504));
}
