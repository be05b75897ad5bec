//! The voice platform's LLM websocket.
//!
//! One connection per call. Inbound frames are decoded into
//! [`InboundEvent`]s; every `response_required`/`reminder_required` request
//! raises the connection's [`Watermark`] and starts a turn task whose events
//! are funneled through a single writer task. The writer drops speech for
//! superseded response ids, so a barge-in silences the old turn immediately
//! even while its task is still winding down.

use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, Path,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use waiter_agent::{Agent, Watermark};
use waiter_types::{InboundEvent, OutboundEvent, TurnRequest};

use crate::AppState;

/// Upgrades `GET /llm-websocket/{call_id}`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(call_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, call_id, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, call_id: String, addr: SocketAddr) {
    info!(%call_id, %addr, "voice platform connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundEvent>(256);
    let watermark = Watermark::new();
    let agent = Arc::new(Agent::new(call_id.clone(), Arc::clone(&state.agent)));

    // Written before any request is read, so no watermark can suppress them.
    for event in [
        OutboundEvent::handshake(state.call_config),
        OutboundEvent::Response(agent.begin_message()),
    ] {
        let Some(text) = encode(&call_id, &event) else {
            continue;
        };
        if sender.send(AxumMessage::Text(text.into())).await.is_err() {
            info!(%call_id, "voice platform left before the greeting");
            return;
        }
    }

    let writer_watermark = watermark.clone();
    let writer_call_id = call_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(origin) = event.origin() {
                if writer_watermark.is_superseded(origin) {
                    debug!(call_id = %writer_call_id, response_id = origin, "dropping superseded response");
                    continue;
                }
            }
            let Some(text) = encode(&writer_call_id, &event) else {
                continue;
            };
            if sender.send(AxumMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut turns = JoinSet::new();

    while let Some(Ok(msg)) = receiver.next().await {
        while turns.try_join_next().is_some() {}

        let text = match msg {
            AxumMessage::Text(text) => text,
            AxumMessage::Close(_) => break,
            _ => continue,
        };

        let event = match serde_json::from_str::<InboundEvent>(text.as_str()) {
            Ok(event) => event,
            Err(error) => {
                warn!(%call_id, %error, "ignoring unparseable frame");
                continue;
            }
        };

        match event {
            InboundEvent::PingPong { timestamp } => {
                if tx.send(OutboundEvent::PingPong { timestamp }).await.is_err() {
                    break;
                }
            }
            InboundEvent::CallDetails { .. } => {
                debug!(%call_id, "received call details");
            }
            InboundEvent::UpdateOnly { .. } => {}
            event @ (InboundEvent::ResponseRequired { .. } | InboundEvent::ReminderRequired { .. }) => {
                if let Some(request) = event.into_turn_request() {
                    start_turn(&mut turns, &agent, request, &watermark, &tx);
                }
            }
        }
    }

    info!(%call_id, "voice platform disconnected");

    turns.abort_all();
    agent.flush().await;
    send_task.abort();
}

fn encode(call_id: &str, event: &OutboundEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(error) => {
            warn!(%call_id, %error, "failed to encode outbound frame");
            None
        }
    }
}

/// Accepts `request` as the newest turn and spawns it.
///
/// Requests older than the current watermark are dropped.
fn start_turn(
    turns: &mut JoinSet<()>,
    agent: &Arc<Agent>,
    request: TurnRequest,
    watermark: &Watermark,
    tx: &mpsc::Sender<OutboundEvent>,
) {
    let response_id = request.response_id;
    if watermark.advance(response_id) != response_id {
        debug!(call_id = %agent.call_id(), response_id, "ignoring stale request");
        return;
    }
    debug!(call_id = %agent.call_id(), response_id, kind = ?request.kind, "starting turn");

    let events = Arc::clone(agent).run(request, watermark.clone());
    let tx = tx.clone();
    turns.spawn(async move {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            if tx.send(OutboundEvent::Response(event)).await.is_err() {
                break;
            }
        }
    });
}
