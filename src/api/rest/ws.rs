use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SelectAll;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::event::Topic;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    /// Requester or provider id; subscribes to that party's topic.
    pub party_id: Option<Uuid>,
    /// Subscribe to the open-request pool as well.
    #[serde(default)]
    pub open: bool,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, query: WsQuery) {
    let mut streams = SelectAll::new();
    if let Some(party_id) = query.party_id {
        streams.push(BroadcastStream::new(
            state.broadcaster.subscribe(Topic::Party(party_id)),
        ));
    }
    if query.open {
        streams.push(BroadcastStream::new(
            state.broadcaster.subscribe(Topic::OpenRequests),
        ));
    }

    if streams.is_empty() {
        info!("websocket client subscribed to no topics, closing");
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    info!(party_id = ?query.party_id, open = query.open, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(result) = streams.next().await {
            let event = match result {
                Ok(event) => event,
                // Lagged subscriber: events were dropped, the client
                // re-polls state over REST.
                Err(err) => {
                    warn!(error = %err, "websocket subscriber lagged");
                    continue;
                }
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
