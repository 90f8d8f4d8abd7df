use lazuli_scanner::{RemoteCaptureClient, RemoteOptions, ScanError};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn options(server: &MockServer) -> RemoteOptions {
    RemoteOptions {
        endpoint: format!("{}/v1/", server.uri()),
        site_base: "https://www.adidas.jp".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_capture_request_carries_api_parameters() {
    let server = MockServer::start().await;
    let feed = json!({
        "recommendations": [
            {"articleNumber": "IE3437", "name": "Gazelle", "link": "/IE3437.html",
             "pricing": {"currentPrice": 13200}},
            {"articleNumber": "B75806", "name": "Samba", "link": "https://www.adidas.jp/B75806.html"}
        ],
        "json_breadcrumbs": [{"text": "Men", "link": "/men", "type": "category"}]
    });
    let capture = json!({
        "html": "<html></html>",
        "xhr": [{"url": "https://www.adidas.jp/recs/api/products?x=1", "body": feed.to_string(), "status_code": 200}]
    });

    Mock::given(method("GET"))
        .and(path("/v1/"))
        .and(query_param("apikey", "secret"))
        .and(query_param("url", "https://www.adidas.jp/men/"))
        .and(query_param("js_render", "true"))
        .and(query_param("json_response", "true"))
        .and(query_param("premium_proxy", "true"))
        .and(query_param("proxy_country", "us"))
        .respond_with(ResponseTemplate::new(200).set_body_string(capture.to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteCaptureClient::new("secret", options(&server)).unwrap();
    let records = client.fetch_records("https://www.adidas.jp/men/").await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "https://www.adidas.jp/IE3437.html");
    assert_eq!(records[0].price, "13200.00");
    assert_eq!(records[0].breadcrumbs, vec!["Men"]);
    assert_eq!(records[1].url, "https://www.adidas.jp/B75806.html");
}

#[tokio::test]
async fn test_non_ok_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(402).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let client = RemoteCaptureClient::new("secret", options(&server)).unwrap();
    let result = client.fetch_raw("https://www.adidas.jp/men/").await;

    match result {
        Err(ScanError::Transport(reason)) => assert!(reason.contains("402")),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_capture_without_feed_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"html": "<html></html>", "xhr": []}"#))
        .mount(&server)
        .await;

    let client = RemoteCaptureClient::new("secret", options(&server)).unwrap();
    let result = client.fetch_records("https://www.adidas.jp/men/").await;

    assert!(matches!(result, Err(ScanError::Transport(_))));
}
