// Tests for listing-page link discovery

mod common;

use common::{FakeRenderer, listing, url};
use lazuli_scanner::{HttpRenderer, LinkDiscoverer, Renderer, ScanError, SessionProfile};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn discoverer(max_scrolls: usize) -> LinkDiscoverer {
    LinkDiscoverer::new("a.product-card")
        .with_max_scrolls(max_scrolls)
        .with_scroll_pause(Duration::from_millis(0))
}

// ============================================================================
// Deduplication and ordering
// ============================================================================

#[tokio::test]
async fn test_duplicates_across_scrolls_are_removed() {
    let renderer = FakeRenderer::new(HashMap::from([(
        url("/men/"),
        listing(&[&["/p/1/"], &["/p/2/", "/p/1/"]]),
    )]));
    let mut session = renderer.open_session().await.unwrap();

    let result = discoverer(2).discover(&mut session, &url("/men/")).await.unwrap();

    assert_eq!(result.urls(), [url("/p/1/"), url("/p/2/")]);
}

#[tokio::test]
async fn test_first_seen_order_is_kept() {
    let renderer = FakeRenderer::new(HashMap::from([(
        url("/men/"),
        listing(&[&["/p/9/", "/p/3/"], &["/p/3/", "/p/5/", "/p/9/"], &["/p/1/"]]),
    )]));
    let mut session = renderer.open_session().await.unwrap();

    let result = discoverer(5).discover(&mut session, &url("/men/")).await.unwrap();

    assert_eq!(
        result.urls(),
        [url("/p/9/"), url("/p/3/"), url("/p/5/"), url("/p/1/")]
    );
}

#[tokio::test]
async fn test_scroll_budget_limits_loaded_batches() {
    let renderer = FakeRenderer::new(HashMap::from([(
        url("/men/"),
        listing(&[&["/p/1/"], &["/p/2/"], &["/p/3/"], &["/p/4/"]]),
    )]));
    let mut session = renderer.open_session().await.unwrap();

    let result = discoverer(1).discover(&mut session, &url("/men/")).await.unwrap();

    assert_eq!(result.len(), 2);
}

#[tokio::test]
async fn test_zero_anchors_is_not_an_error() {
    let renderer = FakeRenderer::new(HashMap::from([(url("/men/"), listing(&[]))]));
    let mut session = renderer.open_session().await.unwrap();

    let result = discoverer(2).discover(&mut session, &url("/men/")).await.unwrap();

    assert!(result.is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_listing_is_discovery_error() {
    let renderer = FakeRenderer::new(HashMap::new());
    let mut session = renderer.open_session().await.unwrap();

    let result = discoverer(2).discover(&mut session, &url("/men/")).await;

    assert!(matches!(result, Err(ScanError::Discovery { .. })));
}

#[tokio::test]
async fn test_invalid_listing_url_is_discovery_error() {
    let renderer = FakeRenderer::new(HashMap::new());
    let mut session = renderer.open_session().await.unwrap();

    let result = discoverer(2).discover(&mut session, "not a url").await;

    assert!(matches!(result, Err(ScanError::Discovery { .. })));
}

// ============================================================================
// Against the HTTP renderer
// ============================================================================

#[tokio::test]
async fn test_discovery_over_http_with_load_more() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/men/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <a class="product-card" href="/p/2/">Two</a>
                <a class="product-card" href="/p/1/#colors">One again</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/men/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <a class="product-card" href="/p/1/">One</a>
                <a class="nav" href="/about/">About</a>
                <a class="load-more" href="/men/?page=2">More</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let renderer = HttpRenderer::new(SessionProfile::default()).with_load_more("a.load-more");
    let mut session = renderer.open_session().await.unwrap();
    let listing_url = format!("{}/men/", server.uri());

    let result = discoverer(2).discover(&mut session, &listing_url).await.unwrap();

    assert_eq!(
        result.urls(),
        [
            format!("{}/p/1/", server.uri()),
            format!("{}/p/2/", server.uri())
        ]
    );
}
