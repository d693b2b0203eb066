use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::{SinkExt, StreamExt};
use futures_core::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::SSE_KEEP_ALIVE;
use crate::main_lib::AppState;

const SNAPSHOT_EVENT: &str = "snapshot";

fn snapshot_event(message: &str) -> Result<SseEvent, Infallible> {
    Ok(SseEvent::default().event(SNAPSHOT_EVENT).data(message))
}

/// Server-sent snapshot stream. The latest snapshot is sent first.
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = BroadcastStream::new(state.broadcaster.subscribe());
    let initial = tokio_stream::iter(state.broadcaster.latest())
        .map(|message| snapshot_event(&message));
    let updates = tokio_stream::StreamExt::filter_map(receiver, |message| match message {
        Ok(message) => Some(snapshot_event(&message)),
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    Sse::new(initial.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE)
            .text("keep-alive"),
    )
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.broadcaster.subscribe();
    tracing::info!(
        "WebSocket client connected ({} total)",
        state.broadcaster.client_count()
    );

    if let Some(latest) = state.broadcaster.latest() {
        if sender.send(Message::Text(latest.as_ref().into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(message) => {
                    if sender.send(Message::Text(message.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("WebSocket client lagged, skipped {} snapshots", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == "ping" => {
                    if sender.send(Message::Text(r#"{"type":"pong"}"#.into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
        }
    }
    tracing::info!("WebSocket client disconnected");
}
