// WS接入层 - "connect:<address>" / "disconnect" 文本协议
// WS entry point - the "connect:<address>" / "disconnect" text protocol
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::ws::fanout::envelope;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
    state.fanout.attach(conn_id, sender).await;
    debug!("🔌 WebSocket connected: {}", conn_id);

    let (mut write, mut read) = socket.split();

    // 写半边由专属任务排空队列 / A dedicated task drains the queue into the write half
    let writer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if write.send(Message::Text(message)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = read.next().await {
        match message {
            Message::Text(text) => handle_text(&state, conn_id, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.fanout.detach(&conn_id).await;
    writer.abort();
    debug!("🔌 WebSocket disconnected: {}", conn_id);
}

async fn handle_text(state: &Arc<AppState>, conn_id: Uuid, text: &str) {
    let (action, account) = match text.split_once(':') {
        Some((action, account)) => (action, account),
        None => (text, ""),
    };

    match action {
        "connect" => handle_connect(state, conn_id, account).await,
        "disconnect" => handle_disconnect(state, conn_id).await,
        _ => {
            state
                .fanout
                .send_to(
                    &conn_id,
                    envelope("error", json!({ "message": "Unknown message type" })),
                )
                .await;
        }
    }
}

/// 订阅钱包地址和名下每个机器人账户，回推当前快照
/// Subscribe the wallet address and each of its bot accounts, push back the current snapshot
async fn handle_connect(state: &Arc<AppState>, conn_id: Uuid, account: &str) {
    let bots = match state.bots.user_bots_data(account) {
        Ok(bots) => bots,
        Err(e) => {
            error!("❌ Error fetching user bots data: {}", e);
            state
                .fanout
                .send_to(
                    &conn_id,
                    envelope(
                        "error",
                        json!({ "message": "Failed to fetch user bots data" }),
                    ),
                )
                .await;
            return;
        }
    };

    let mut keys = vec![account.to_string()];
    keys.extend(bots.iter().map(|bot| bot.mango_account.clone()));
    state.fanout.subscribe(conn_id, &keys).await;

    state
        .fanout
        .send_to(
            &conn_id,
            envelope("connectionSuccess", json!({ "bots": bots })),
        )
        .await;
}

async fn handle_disconnect(state: &Arc<AppState>, conn_id: Uuid) {
    let released = state.fanout.release_interests(&conn_id).await;
    let message = if released.is_empty() {
        envelope(
            "error",
            json!({ "message": "No accounts registered for this connection" }),
        )
    } else {
        envelope("disconnectionSuccess", json!({ "accounts": released }))
    };
    state.fanout.send_to(&conn_id, message).await;
}
