//! 实时订阅
//!
//! - GET /ws
//!
//! 连接建立后先推送一次完整状态，之后转发广播中心的全部事件。
//! 客户端消息只用于探测断开。

use crate::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use scada_realtime::RealtimeEvent;
use tracing::{debug, info, warn};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let hub = state.processor.hub().clone();
    let mut subscription = hub.subscribe();
    let subscriber_id = subscription.id().to_string();
    let (mut sender, mut receiver) = socket.split();
    info!(target: "scada.realtime", subscriber_id = %subscriber_id, "ws_connected");

    let initial = RealtimeEvent::Update {
        state: state.processor.render_state(),
    };
    match serde_json::to_string(&initial) {
        Ok(text) => {
            if sender.send(Message::Text(text)).await.is_err() {
                hub.unsubscribe(&subscriber_id);
                return;
            }
        }
        Err(err) => warn!(target: "scada.realtime", error = %err, "initial_state_encode_failed"),
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = subscription.recv().await {
            if sender.send(Message::Text(text.to_string())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(text) => {
                    debug!(target: "scada.realtime", len = text.len(), "ws_client_message_ignored");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    hub.unsubscribe(&subscriber_id);
    info!(target: "scada.realtime", subscriber_id = %subscriber_id, "ws_disconnected");
}
