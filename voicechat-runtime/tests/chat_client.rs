use std::time::Duration;
use voicechat_core::types::{ChatMessage, ThreadId};
use voicechat_runtime::{ChatClient, ChatHistoryLoader, HistoryOutcome};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn history_with_json_body_is_loaded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/history/thread_1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let outcome = ChatHistoryLoader::new(server.uri())
        .load(&ThreadId::new("thread_1"))
        .await;
    assert_eq!(
        outcome,
        HistoryOutcome::Loaded(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")])
    );
    assert!(!outcome.should_reset());
}

#[tokio::test]
async fn markup_history_is_expired_even_with_ok_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/history/thread_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<!doctype html><html><body>Not here</body></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let outcome = ChatHistoryLoader::new(server.uri())
        .load(&ThreadId::new("thread_1"))
        .await;
    assert!(matches!(outcome, HistoryOutcome::Expired { .. }));
    assert!(outcome.messages().is_empty());
    assert!(outcome.should_reset());
}

#[tokio::test]
async fn error_status_is_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/history/thread_1"))
        .respond_with(ResponseTemplate::new(502).set_body_raw(
            r#"{"error":"Bad Gateway","details":"x"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let outcome = ChatHistoryLoader::new(server.uri())
        .load(&ThreadId::new("thread_1"))
        .await;
    assert_eq!(
        outcome,
        HistoryOutcome::Expired {
            reason: "status 502".into()
        }
    );
}

#[tokio::test]
async fn undecodable_json_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/history/thread_1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"msgs\":", "application/json"))
        .mount(&server)
        .await;

    let outcome = ChatHistoryLoader::new(server.uri())
        .load(&ThreadId::new("thread_1"))
        .await;
    assert!(matches!(outcome, HistoryOutcome::Unavailable(_)));
    assert!(outcome.should_reset());
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let outcome = ChatHistoryLoader::new(uri)
        .load(&ThreadId::new("thread_1"))
        .await;
    assert!(matches!(outcome, HistoryOutcome::Unavailable(_)));
}

#[tokio::test]
async fn chat_posts_message_and_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({"message": "hello", "threadId": "thread_1"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"threadId":"thread_1","message":"hi there"}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let resp = ChatClient::new(server.uri())
        .send("hello", Some(&ThreadId::new("thread_1")))
        .await
        .unwrap();
    assert_eq!(resp.thread_id, ThreadId::new("thread_1"));
    assert_eq!(resp.message, "hi there");
}

#[tokio::test]
async fn chat_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_raw(
            r#"{"error":"Internal Server Error","details":"assistant run failed: X"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let err = ChatClient::new(server.uri())
        .send("hello", None)
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("500"), "{msg}");
    assert!(msg.contains("assistant run failed: X"), "{msg}");
}

#[tokio::test]
async fn chat_slower_than_client_timeout_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"threadId":"t","message":"late"}"#, "application/json")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let slow = ChatClient::new(server.uri())
        .with_timeout(Duration::from_millis(100))
        .send("hi", None)
        .await;
    assert!(slow.is_err());

    let patient = ChatClient::new(server.uri())
        .with_timeout(Duration::from_secs(5))
        .send("hi", None)
        .await
        .unwrap();
    assert_eq!(patient.message, "late");
}
