use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use vk2tg::{
    config::VkConfig,
    error::VkError,
    retry::RetryPolicy,
    sources::{vk::VkClient, Attachment, FeedSource},
};

const RETRY: Duration = Duration::from_millis(20);

fn client(server: &MockServer, max_attempts: Option<u32>) -> VkClient {
    let cfg = VkConfig {
        token: "vk-secret".into(),
        group_id: "-42".into(),
        api_url: format!("{}/method", server.uri()),
        ..Default::default()
    };
    VkClient::new(&cfg, RetryPolicy::new(RETRY, max_attempts))
}

fn wall() -> serde_json::Value {
    json!({
        "response": {
            "count": 3,
            "items": [
                {"id": 100, "text": "read the rules", "is_pinned": 1},
                {"id": 57, "text": "fresh foxes", "attachments": [
                    {"type": "photo", "photo": {"sizes": [
                        {"url": "https://sun9.userapi.com/s.jpg", "width": 130, "height": 87},
                        {"url": "https://sun9.userapi.com/w.jpg", "width": 1280, "height": 853}
                    ]}}
                ]},
                {"id": 56, "text": "older"}
            ]
        }
    })
}

#[tokio::test]
async fn sends_expected_query_and_drops_pinned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/wall.get"))
        .and(query_param("owner_id", "-42"))
        .and(query_param("count", "10"))
        .and(query_param("filter", "all"))
        .and(query_param("access_token", "vk-secret"))
        .and(query_param("v", "5.131"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wall()))
        .expect(1)
        .mount(&server)
        .await;

    let posts = client(&server, None).fetch_recent_posts().await.unwrap();

    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![57, 56]);
    assert!(matches!(
        &posts[0].attachments[..],
        [Attachment::Photo { photo }] if photo.best_url() == Some("https://sun9.userapi.com/w.jpg")
    ));
}

#[tokio::test]
async fn transient_error_waits_and_repeats_the_same_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/wall.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"error_code": 10, "error_msg": "Internal server error"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/wall.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wall()))
        .mount(&server)
        .await;

    let started = Instant::now();
    let posts = client(&server, None).fetch_recent_posts().await.unwrap();

    assert!(started.elapsed() >= RETRY);
    assert_eq!(posts.len(), 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, requests[1].url);
}

#[tokio::test]
async fn other_error_codes_fail_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/wall.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"error_code": 15, "error_msg": "Access denied: wall is disabled"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, None).fetch_recent_posts().await.unwrap_err();

    match err {
        VkError::Api { code, message } => {
            assert_eq!(code, 15);
            assert!(message.contains("wall is disabled"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_bodies_are_retried_until_attempts_run_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/wall.get"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, Some(3)).fetch_recent_posts().await.unwrap_err();

    assert!(matches!(err, VkError::Parse(_)));
}

#[tokio::test]
async fn response_without_items_is_an_empty_wall() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/wall.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"count": 0}})))
        .mount(&server)
        .await;

    let posts = client(&server, None).fetch_recent_posts().await.unwrap();

    assert!(posts.is_empty());
}

#[tokio::test]
async fn connection_failures_are_retried_as_transport_errors() {
    // grab a free port, then close it so nothing listens there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let cfg = VkConfig {
        token: "vk-secret".into(),
        group_id: "-42".into(),
        api_url: format!("http://127.0.0.1:{port}/method"),
        ..Default::default()
    };
    let client = VkClient::new(&cfg, RetryPolicy::new(RETRY, Some(2)));

    let started = Instant::now();
    let err = client.fetch_recent_posts().await.unwrap_err();

    assert!(matches!(err, VkError::Transport(_)), "unexpected: {err:?}");
    assert!(err.is_transient());
    assert!(started.elapsed() >= RETRY);
}
