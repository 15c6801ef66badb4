//! Integration tests for the transport client and download side-path,
//! using a mocked upstream server.

use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seedream_mcp_common::api::ApiClient;
use seedream_mcp_common::config::Config;
use seedream_mcp_common::download::download_image;
use seedream_mcp_common::error::ErrorCode;

fn test_config(base_url: String) -> Config {
    Config {
        api_key: Some("test-key-12345".to_string()),
        base_url,
        timeout_secs: 5,
        ..Config::default()
    }
}

#[tokio::test]
async fn call_api_sends_bearer_auth_and_parses_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/images/generations"))
        .and(header("Authorization", "Bearer test-key-12345"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"url": "https://cdn.example.com/img.jpg"}],
            "usage": {"total_tokens": 128}
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(server.uri()));
    let response = client
        .call_api(
            "api/v3/images/generations",
            Method::POST,
            None,
            Some(&json!({"prompt": "a cat"})),
        )
        .await
        .unwrap();

    assert_eq!(
        response["data"][0]["url"],
        "https://cdn.example.com/img.jpg"
    );
    assert_eq!(response["usage"]["total_tokens"], 128);
}

#[tokio::test]
async fn call_api_maps_401_to_credential_suggestion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "invalid api key",
            "error_code": "AUTH_FAILED"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(server.uri()));
    let err = client
        .call_api("api/v3/images/generations", Method::POST, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "invalid api key");
    assert_eq!(
        err.code,
        Some(ErrorCode::Upstream(Some("AUTH_FAILED".to_string())))
    );
    assert!(err.suggestion.as_deref().unwrap().contains("API key"));
}

#[tokio::test]
async fn call_api_maps_5xx_to_retry_suggestion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(server.uri()));
    let err = client
        .call_api("api/v3/images/generations", Method::POST, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(503));
    assert!(err.suggestion.as_deref().unwrap().contains("retry later"));
}

#[tokio::test]
async fn call_api_classifies_connection_failure_as_network_error() {
    // RFC 5737 TEST-NET address; nothing listens there.
    let config = Config {
        api_key: Some("test-key".to_string()),
        base_url: "http://192.0.2.1:9".to_string(),
        timeout_secs: 1,
        ..Config::default()
    };
    let client = ApiClient::new(&config);

    let err = client
        .call_api("api/v3/images/generations", Method::POST, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.code, Some(ErrorCode::Network));
    assert!(err.status.is_none());
}

#[tokio::test]
async fn fetch_bytes_returns_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8jpegdata".to_vec()))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(server.uri()));
    let bytes = client
        .fetch_bytes(&format!("{}/image.jpg", server.uri()))
        .await
        .unwrap();
    assert_eq!(&bytes[..2], b"\xff\xd8");
}

#[tokio::test]
async fn fetch_bytes_raises_on_non_2xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(server.uri()));
    let err = client
        .fetch_bytes(&format!("{}/missing.jpg", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn download_image_writes_file_and_returns_absolute_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/generated.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"imagebytes".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    // Point at a nested directory that does not exist yet.
    let target = dir.path().join("nested").join("images");

    let client = ApiClient::new(&test_config(server.uri()));
    let path = download_image(
        &client,
        &format!("{}/generated.jpg", server.uri()),
        target.to_str().unwrap(),
    )
    .await
    .unwrap();

    assert!(path.is_absolute());
    assert!(path.starts_with(std::path::absolute(&target).unwrap()));
    assert_eq!(std::fs::read(&path).unwrap(), b"imagebytes");
    assert!(
        path.file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("seedream_image_")
    );
}

#[tokio::test]
async fn download_image_propagates_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = ApiClient::new(&test_config(server.uri()));
    let err = download_image(
        &client,
        &format!("{}/gone.jpg", server.uri()),
        dir.path().to_str().unwrap(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status, Some(500));
    // The directory exists but no file was written.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
