use axum::{
    extract::{Extension, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::dto::notification_dto::Notification;
use crate::services::auth_user::AuthUser;

/* Live notification feed */
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    AuthUser(account): AuthUser,
    Extension(tx): Extension<broadcast::Sender<Notification>>,
) -> impl IntoResponse {
    info!("Opening notification feed for {}", account.username);
    ws.on_upgrade(move |socket| handle_socket(socket, account.id, tx))
}

async fn handle_socket(socket: WebSocket, account_id: i64, tx: broadcast::Sender<Notification>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = tx.subscribe();

    // Forward this account's notifications to the client
    let send_task = tokio::spawn(async move {
        loop {
            let notification = match rx.recv().await {
                Ok(n) => n,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Notification feed for {} lagged by {}", account_id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if notification.recipient_id != account_id {
                continue;
            }

            let json = match serde_json::to_string(&notification) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize notification: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // The feed is one way; drain until the client goes away
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    send_task.abort();
}
