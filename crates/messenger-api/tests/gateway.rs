//! HTTP surface: identity handling, health endpoints, and an end-to-end
//! WebSocket exchange over a real socket.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tower::ServiceExt;

use messenger_api::{AppState, build_router};
use messenger_core::config::AppConfig;
use messenger_core::models::{ChatMember, ChatMessage};
use messenger_core::result::AppResult;
use messenger_core::traits::{MembershipGate, MessageRepository};
use messenger_core::types::{ChatId, MessageId, UserId};
use messenger_realtime::{MemoryOfflineStore, RealtimeEngine};

#[derive(Default)]
struct Directory {
    members: Mutex<HashMap<ChatId, HashSet<UserId>>>,
}

#[async_trait]
impl MembershipGate for Directory {
    async fn is_member(&self, user_id: UserId, chat_id: ChatId) -> AppResult<bool> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&chat_id)
            .is_some_and(|m| m.contains(&user_id)))
    }

    async fn members_of(&self, chat_id: ChatId) -> AppResult<Vec<ChatMember>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&chat_id)
            .map(|m| m.iter().map(|u| ChatMember::new(chat_id, *u)).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl MessageRepository for Directory {
    async fn persist(&self, _message: &ChatMessage) -> AppResult<MessageId> {
        Ok(MessageId::new())
    }
}

fn app_state(directory: Arc<Directory>) -> AppState {
    let config = AppConfig::default();
    let engine = RealtimeEngine::new(
        config.realtime.clone(),
        directory.clone(),
        directory,
        Arc::new(MemoryOfflineStore::new()),
    );
    AppState::new(Arc::new(config), engine)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_health_endpoints() {
    let router = build_router(app_state(Arc::new(Directory::default())));

    let response = router
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");

    let response = router
        .oneshot(Request::get("/api/health/detailed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["ws_connections"], 0);
    assert_eq!(body["data"]["metrics"]["connections_total"], 0);
}

#[tokio::test]
async fn test_upgrade_without_identity_is_unauthorized() {
    let router = build_router(app_state(Arc::new(Directory::default())));

    for header in [None, Some("not-a-uuid"), Some("00000000-0000-0000-0000-000000000000")] {
        let mut request = Request::get("/ws");
        if let Some(value) = header {
            request = request.header("x-user-id", value);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {header:?}");
        assert_eq!(body_json(response).await["error"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_send_message_round_trip_over_websocket() {
    let directory = Arc::new(Directory::default());
    let chat = ChatId::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    directory
        .members
        .lock()
        .unwrap()
        .insert(chat, HashSet::from([alice, bob]));

    let state = app_state(directory);
    let engine = state.realtime.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    let connect = |user: UserId| {
        let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
        request
            .headers_mut()
            .insert("x-user-id", user.to_string().parse().unwrap());
        tokio_tungstenite::connect_async(request)
    };
    let (mut a, _) = connect(alice).await.expect("alice connects");
    let (mut b, _) = connect(bob).await.expect("bob connects");

    for _ in 0..500 {
        if engine.hub.connection_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(engine.hub.connection_count(), 2);

    let frame = serde_json::json!({
        "type": "send_message",
        "chat_id": chat,
        "payload": { "content": "hello over the wire" },
    });
    a.send(Message::text(frame.to_string())).await.unwrap();

    let next_event = |msg: Message| -> serde_json::Value {
        serde_json::from_str(msg.to_text().unwrap()).unwrap()
    };
    let to_b = tokio::time::timeout(Duration::from_secs(5), b.next())
        .await
        .expect("bob received nothing")
        .unwrap()
        .unwrap();
    let event = next_event(to_b);
    assert_eq!(event["type"], "message.sent");
    assert_eq!(event["payload"]["message"]["content"], "hello over the wire");
    assert_eq!(event["payload"]["message"]["sender_id"], alice.to_string());

    a.send(Message::text("{broken")).await.unwrap();
    let mut code = serde_json::Value::Null;
    while let Some(Ok(msg)) = a.next().await {
        if msg.is_text() {
            let event = next_event(msg);
            if event["type"] == "error" {
                code = event["payload"]["code"].clone();
                break;
            }
        }
    }
    assert_eq!(code, "invalid_message_format");
}
