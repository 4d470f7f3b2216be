use axum::http::{HeaderMap, HeaderValue, Method, Uri, header};
use registry_gate::{
    AuthError, AuthorizationRequest, Authorizer, FetchError, FrontDoorAuthorizer,
    config::AuthorizerConfig,
};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn config(front_door: &str) -> AuthorizerConfig {
    AuthorizerConfig {
        front_door_host: front_door.to_string(),
        shared_fetch_secret: "s3cret".to_string(),
        valid_token: "foo-token".to_string(),
        allowed_package: "@foo/bar".to_string(),
        timeout_ms: 1_000,
    }
}

fn read_request(uri: &str, body: &[u8]) -> AuthorizationRequest {
    let uri: Uri = uri.parse().expect("uri");
    AuthorizationRequest::from_http_parts(&Method::GET, &uri, HeaderMap::new(), body)
        .expect("request")
}

fn publish_request(uri: &str, token: Option<&str>, body: &[u8]) -> AuthorizationRequest {
    let uri: Uri = uri.parse().expect("uri");
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
    }
    AuthorizationRequest::from_http_parts(&Method::PUT, &uri, headers, body).expect("request")
}

async fn mount_package(server: &MockServer, route: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("sharedFetchSecret", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": name,
            "name": name,
            "dist-tags": { "latest": "1.0.0" },
            "versions": { "1.0.0": { "name": name, "version": "1.0.0" } }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn read_allowed_when_front_door_reports_allowed_package() {
    let front_door = MockServer::start().await;
    mount_package(&front_door, "/@foo%2fbar", "@foo/bar").await;

    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");
    let allowed = authz
        .authorize(&read_request("/@foo%2fbar?write=true", b""))
        .await
        .expect("decision");
    assert!(allowed);

    let received = front_door.received_requests().await.expect("recorded");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/@foo%2fbar");
    assert_eq!(received[0].url.query(), Some("sharedFetchSecret=s3cret"));
}

#[tokio::test]
async fn forged_body_name_does_not_affect_read() {
    let front_door = MockServer::start().await;
    mount_package(&front_door, "/left-pad", "left-pad").await;

    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");
    let allowed = authz
        .authorize(&read_request("/left-pad", br#"{"name":"@foo/bar"}"#))
        .await
        .expect("decision");
    assert!(!allowed);
}

#[tokio::test]
async fn read_of_missing_package_is_denied() {
    let front_door = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not_found"})))
        .mount(&front_door)
        .await;

    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");
    let allowed = authz
        .authorize(&read_request("/ghost", b""))
        .await
        .expect("decision");
    assert!(!allowed);
}

#[tokio::test]
async fn read_fails_closed_on_server_error() {
    let front_door = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&front_door)
        .await;

    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");
    let err = authz
        .authorize(&read_request("/@foo%2fbar", b""))
        .await
        .expect_err("upstream error");
    assert!(matches!(
        err,
        AuthError::UpstreamUnavailable(FetchError::Status(503))
    ));
}

#[tokio::test]
async fn read_fails_closed_on_bad_payload() {
    let front_door = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&front_door)
        .await;

    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");
    let err = authz
        .authorize(&read_request("/@foo%2fbar", b""))
        .await
        .expect_err("bad payload");
    assert!(matches!(
        err,
        AuthError::UpstreamUnavailable(FetchError::Payload(_))
    ));
}

#[tokio::test]
async fn read_fails_closed_on_timeout() {
    let front_door = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "@foo/bar"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&front_door)
        .await;

    let mut cfg = config(&front_door.uri());
    cfg.timeout_ms = 250;
    let authz = FrontDoorAuthorizer::new(cfg).expect("authorizer");
    let err = authz
        .authorize(&read_request("/@foo%2fbar", b""))
        .await
        .expect_err("timeout");
    assert!(matches!(
        err,
        AuthError::UpstreamUnavailable(FetchError::Timeout)
    ));
}

#[tokio::test]
async fn read_fails_closed_when_front_door_is_down() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let uri = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);

    let authz = FrontDoorAuthorizer::new(config(&uri)).expect("authorizer");
    let err = authz
        .authorize(&read_request("/@foo%2fbar", b""))
        .await
        .expect_err("transport error");
    assert!(matches!(err, AuthError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn publish_never_calls_front_door() {
    let front_door = MockServer::start().await;
    mount_package(&front_door, "/@foo%2fbar", "@foo/bar").await;

    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");
    let allowed = authz
        .authorize(&publish_request(
            "/@foo%2fbar",
            Some("foo-token"),
            br#"{"name":"@foo/bar","versions":{}}"#,
        ))
        .await
        .expect("decision");
    assert!(allowed);

    let denied = authz
        .authorize(&publish_request(
            "/@foo%2fbar",
            Some("foo-token"),
            br#"{"name":"@evil/pkg"}"#,
        ))
        .await
        .expect("decision");
    assert!(!denied);

    let received = front_door.received_requests().await.expect("recorded");
    assert!(received.is_empty());
}

#[tokio::test]
async fn publish_without_authorization_header_is_malformed() {
    let front_door = MockServer::start().await;
    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");

    let err = authz
        .authorize(&publish_request("/@foo%2fbar", None, br#"{"name":"@foo/bar"}"#))
        .await
        .expect_err("malformed header");
    assert!(matches!(err, AuthError::MalformedHeader));
}

#[tokio::test]
async fn publish_with_non_bearer_scheme_is_malformed() {
    let front_door = MockServer::start().await;
    let authz = FrontDoorAuthorizer::new(config(&front_door.uri())).expect("authorizer");

    let uri: Uri = "/@foo%2fbar".parse().expect("uri");
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Basic Zm9vOmJhcg=="),
    );
    let req = AuthorizationRequest::from_http_parts(
        &Method::PUT,
        &uri,
        headers,
        br#"{"name":"@foo/bar"}"#,
    )
    .expect("request");
    let err = authz.authorize(&req).await.expect_err("malformed header");
    assert!(matches!(err, AuthError::MalformedHeader));
}

#[tokio::test]
async fn constructor_rejects_invalid_front_door() {
    let err = FrontDoorAuthorizer::new(config("")).expect_err("missing host");
    assert!(matches!(err, AuthError::Config(_)));
    let err = FrontDoorAuthorizer::new(config("not a url")).expect_err("bad host");
    assert!(matches!(err, AuthError::Config(_)));
}
