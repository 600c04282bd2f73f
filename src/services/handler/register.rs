use std::fmt::Display;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::Instrument;
use uuid::Uuid;

use super::AppState;
use super::messages::{decode_registration, registration_failure, registration_success};
use crate::services::registry::{RegistryStore, SharedRegistry};

/// 单个注册连接的处理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub accepted: usize,
    pub rejected: usize,
}

// `/register`：升级为 WebSocket 后持续接收注册消息
pub async fn register_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state.registry))
}

async fn handle_socket(socket: WebSocket, registry: SharedRegistry) {
    let connection_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("registration", connection_id = %connection_id);

    let (sender, receiver) = socket.split();
    run_registration_session(&registry, receiver, sender)
        .instrument(span)
        .await;
}

/// 注册会话主循环
///
/// 每条消息独立解析：解析失败只回复错误提示并继续等待下一条，不关闭连接；
/// 解析成功则 upsert 注册表并回复成功提示。只有读取失败、对端关闭或回复
/// 发送失败才会结束会话。
pub async fn run_registration_session<R, W, E>(
    registry: &RegistryStore,
    mut incoming: R,
    mut outgoing: W,
) -> SessionSummary
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut summary = SessionSummary::default();
    tracing::debug!("Registration connection opened");

    while let Some(frame) = incoming.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Error reading registration message");
                break;
            }
        };

        let reply = match frame {
            Message::Text(text) => {
                handle_payload(registry, text.as_str().as_bytes(), &mut summary).await
            }
            Message::Binary(bytes) => handle_payload(registry, &bytes, &mut summary).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = outgoing.send(Message::Text(reply.into())).await {
            tracing::warn!(error = %e, "Failed to send registration acknowledgment");
            break;
        }
    }

    tracing::info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        "Registration connection closed"
    );
    summary
}

async fn handle_payload(
    registry: &RegistryStore,
    payload: &[u8],
    summary: &mut SessionSummary,
) -> String {
    match decode_registration(payload) {
        Ok(registration) => {
            let record = registry.upsert(registration).await;
            summary.accepted += 1;
            tracing::info!(
                service_name = %record.name,
                address = %record.address(),
                kind = %record.kind,
                "Service registered"
            );
            registration_success(&record.name)
        }
        Err(e) => {
            summary.rejected += 1;
            tracing::warn!(error = %e, "Error decoding registration data");
            registration_failure(&e)
        }
    }
}
