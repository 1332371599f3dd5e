use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::quiz::{ClientMessage, QuizServer};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Pumps one player's WebSocket: outbound messages flow through an
/// unbounded channel drained by a sender task, inbound frames are parsed
/// and dispatched to the quiz server. Closing or erroring tears the player
/// down exactly like an explicit leave.
pub async fn handle_connection(websocket: WebSocket, room_id: String, server: Arc<QuizServer>) {
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    tracing::info!(conn_id = conn_id, room_id = %room_id, "WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Drain the room's outbox into the socket
    let sender_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::text(payload)).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                handle_frame(&server, conn_id, &room_id, &tx, message).await;
            }
            Err(e) => {
                tracing::warn!(conn_id = conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    server.disconnect(conn_id).await;
    sender_task.abort();
    tracing::info!(conn_id = conn_id, room_id = %room_id, "WebSocket connection closed");
}

async fn handle_frame(
    server: &Arc<QuizServer>,
    conn_id: u64,
    room_id: &str,
    outbox: &mpsc::UnboundedSender<String>,
    message: Message,
) {
    // Non-text frames (ping/pong/close) are handled by warp
    let Ok(text) = message.to_str() else {
        return;
    };
    tracing::debug!(conn_id = conn_id, message = %text, "Received client message");

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => {
            server
                .handle_message(conn_id, room_id, outbox, client_message)
                .await;
        }
        Err(e) => {
            // Malformed input is logged and dropped; the connection stays open
            tracing::warn!(
                conn_id = conn_id,
                error = %e,
                raw_message = %text,
                "Failed to parse client message"
            );
        }
    }
}
