use std::fmt::Display;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, StreamExt};

use super::AppState;
use super::messages::{ListingError, encode_service_list};
use crate::services::registry::{RegistryStore, SharedRegistry};

// `/services`：连接建立后发送一次完整服务列表，随即结束
pub async fn services_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry))
}

async fn handle_socket(socket: WebSocket, registry: SharedRegistry) {
    let (sender, _receiver) = socket.split();
    match run_listing_session(&registry, sender).await {
        Ok(count) => tracing::info!(services = count, "Sent services list"),
        Err(e) => tracing::error!(error = %e, "Error sending services list"),
    }
}

/// 取快照、序列化为 JSON 数组并发送，然后发送关闭帧
///
/// 发送失败直接返回错误，不重试。
pub async fn run_listing_session<W>(
    registry: &RegistryStore,
    mut outgoing: W,
) -> Result<usize, ListingError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let records = registry.snapshot().await;
    let payload = encode_service_list(&records)?;

    outgoing
        .send(Message::Text(payload.into()))
        .await
        .map_err(|e| ListingError::Send(e.to_string()))?;

    if let Err(e) = outgoing.send(Message::Close(None)).await {
        tracing::debug!(error = %e, "Peer went away before close frame");
    }

    Ok(records.len())
}
