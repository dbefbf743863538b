use super::*;
use crate::config::{ClientConfig, RetryConfig};
use crate::error::Error;
use crate::types::TorrentHash;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn gateway_for(server: &MockServer) -> QbitGateway {
    let config = ClientConfig {
        name: "seedbox".to_string(),
        base_url: server.uri(),
        username: Some("admin".to_string()),
        password: Some("adminadmin".to_string()),
        timeout: Duration::from_secs(5),
    };
    QbitGateway::new(&config, test_retry()).expect("gateway should build")
}

fn torrent_json(hash: &str, completion_on: i64, added_on: i64) -> serde_json::Value {
    json!({
        "hash": hash,
        "name": format!("torrent-{hash}"),
        "category": "brush",
        "size": 4_294_967_296u64,
        "uploaded": 1_073_741_824u64,
        "upspeed": 2048,
        "completion_on": completion_on,
        "added_on": added_on,
        "tracker": "https://tracker.example.com/announce"
    })
}

#[tokio::test]
async fn test_completed_torrents_parses_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .and(query_param("filter", "completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            torrent_json("aaa", 1_700_000_000, 1_699_000_000),
            {
                "hash": "bbb",
                "name": "no-completion",
                "category": "",
                "size": 1024,
                "uploaded": 0,
                "upspeed": 0,
                "completion_on": 0,
                "added_on": 1_700_000_500,
                "tracker": ""
            }
        ])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let torrents = gateway.completed_torrents().await.expect("should list");

    assert_eq!(torrents.len(), 2);
    assert_eq!(torrents[0].hash, TorrentHash::new("aaa"));
    assert_eq!(torrents[0].category.as_deref(), Some("brush"));
    assert_eq!(torrents[0].size, 4_294_967_296);
    assert_eq!(torrents[0].upload_rate, 2048);
    assert_eq!(
        torrents[0].completed_at.map(|d| d.timestamp()),
        Some(1_700_000_000)
    );
    assert_eq!(torrents[0].site().as_deref(), Some("example.com"));

    // Never-completed torrent falls back to the add time; empty category
    // and tracker become None
    assert!(torrents[1].category.is_none());
    assert!(torrents[1].tracker.is_none());
    assert_eq!(
        torrents[1].completed_at.map(|d| d.timestamp()),
        Some(1_700_000_500)
    );
}

#[tokio::test]
async fn test_completed_torrents_unreachable_on_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let err = gateway.completed_torrents().await.unwrap_err();
    assert!(matches!(err, Error::UnreachableClient { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_category_size_sums_category_torrents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .and(query_param("category", "brush"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"hash": "a", "name": "a", "size": 1000},
            {"hash": "b", "name": "b", "size": 2500}
        ])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let total = gateway.category_size(Some("brush")).await.expect("should sum");
    assert_eq!(total, 3500);
}

#[tokio::test]
async fn test_upload_rate_reads_transfer_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/transfer/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"up_info_speed": 614_400})),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    assert_eq!(gateway.upload_rate().await, 614_400);
}

#[tokio::test]
async fn test_upload_rate_fails_soft_to_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/transfer/info"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    assert_eq!(gateway.upload_rate().await, 0);
}

#[tokio::test]
async fn test_stop_torrents_joins_hashes() {
    let server = MockServer::start().await;
    // Form encoding turns the | separator into %7C
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/stop"))
        .and(body_string_contains("hashes=aaa%7Cbbb"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    gateway
        .stop_torrents(&[TorrentHash::new("aaa"), TorrentHash::new("bbb")])
        .await
        .expect("stop should succeed");
}

#[tokio::test]
async fn test_stop_torrents_empty_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    gateway.stop_torrents(&[]).await.expect("noop should succeed");
}

#[tokio::test]
async fn test_delete_torrents_sends_delete_files_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/delete"))
        .and(body_string_contains("hashes=ccc"))
        .and(body_string_contains("deleteFiles=true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    gateway
        .delete_torrents(&[TorrentHash::new("ccc")], true)
        .await
        .expect("delete should succeed");
}

#[tokio::test]
async fn test_feed_articles_unknown_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/rss/items"))
        .and(query_param("withData", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"other": {}})))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let err = gateway.feed_articles("daily").await.unwrap_err();
    assert!(matches!(err, Error::FeedNotFound(name) if name == "daily"));
}

#[tokio::test]
async fn test_feed_articles_refreshes_then_reads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/rss/items"))
        .and(query_param("withData", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"daily": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/rss/refreshItem"))
        .and(body_string_contains("itemPath=daily"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/rss/items"))
        .and(query_param("withData", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "daily": {
                "articles": [
                    {
                        "title": "Release.A [3 GB]",
                        "torrentURL": "https://example.com/a.torrent",
                        "date": "06 Aug 2026 10:00:00 +0000"
                    },
                    {
                        "title": "Release.B [4 GB]",
                        "torrentURL": "https://example.com/b.torrent",
                        "date": "not a date"
                    },
                    {
                        "title": "No.Url.Release"
                    }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let articles = gateway.feed_articles("daily").await.expect("should read feed");

    // The URL-less article is dropped, the bad date becomes None
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Release.A [3 GB]");
    assert_eq!(articles[0].url, "https://example.com/a.torrent");
    assert!(articles[0].published.is_some());
    assert_eq!(articles[1].title, "Release.B [4 GB]");
    assert!(articles[1].published.is_none());
}

#[tokio::test]
async fn test_add_torrent_reports_client_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .and(body_string_contains("category=brush"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let accepted = gateway
        .add_torrent("https://example.com/a.torrent", Some("brush"))
        .await
        .expect("submit should succeed");
    assert!(accepted);
}

#[tokio::test]
async fn test_add_torrent_declined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let accepted = gateway
        .add_torrent("https://example.com/a.torrent", None)
        .await
        .expect("submit call itself should succeed");
    assert!(!accepted);
}

#[tokio::test]
async fn test_relogin_once_on_forbidden() {
    let server = MockServer::start().await;
    // First call is rejected with 403, the retry after login succeeds
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .and(body_string_contains("username=admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let torrents = gateway.completed_torrents().await.expect("should recover");
    assert!(torrents.is_empty());
}

#[tokio::test]
async fn test_bad_credentials_surface_as_auth_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let err = gateway.completed_torrents().await.unwrap_err();
    assert!(matches!(err, Error::AuthRejected { .. }), "got {err:?}");
}
