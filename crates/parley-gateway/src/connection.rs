use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info};

use parley_types::models::UserId;

use crate::hub::Hub;
use crate::registry::Outbound;

/// Run an upgraded socket for an already authenticated user until either
/// side hangs up, the heartbeat gives up on it, or a newer connection for the
/// same user replaces it.
pub async fn handle_connection(socket: WebSocket, hub: Hub, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut outbound_rx) = hub.registry().register(user_id.clone()).await;
    info!("{} connected to gateway ({})", user_id, conn_id);

    // Writer: everything addressed to this user goes through the registry.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let (message, closing) = match frame {
                Outbound::Text(text) => (Message::Text(text.into()), false),
                Outbound::Ping => (Message::Ping(Vec::<u8>::new().into()), false),
                Outbound::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })),
                    true,
                ),
            };
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let reader_hub = hub.clone();
    let reader_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    debug!("{} socket error: {}", reader_user, e);
                    break;
                }
            };

            match message {
                Message::Text(text) => {
                    // Rejections are logged by the hub and never echoed back.
                    let _ = reader_hub.route(&reader_user, text.as_str()).await;
                }
                Message::Pong(_) => {
                    reader_hub.registry().mark_alive(&reader_user, conn_id).await;
                }
                Message::Binary(data) => {
                    debug!("{} sent a {} byte binary frame, ignoring", reader_user, data.len());
                }
                Message::Close(_) => break,
                // Pings are answered by the socket itself.
                Message::Ping(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(&user_id, conn_id).await;
    info!("{} disconnected from gateway ({})", user_id, conn_id);
}
