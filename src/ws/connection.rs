//! WebSocket connection state machine.
//!
//! Each viewer gets a reader loop (this task) and a writer task. The writer
//! drains a bounded queue whose only sender lives in the
//! [`ConnectionRegistry`], so every outbound frame, whether a relayed event or
//! a reply to this viewer, goes through the registry. When the registry drops
//! the entry the writer finishes, closes the socket, and the reader stops.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::{ClientCommand, parse_command};
use super::registry::{ConnectionId, ConnectionRegistry};
use crate::domain::{BidOutcome, StateChangeEvent};
use crate::error::AuctionError;
use crate::service::AuctionService;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one viewer connection until either side closes it.
///
/// On entry the viewer is registered and sent the current snapshot, so it
/// never waits for the next tick to see the auction.
pub async fn run_connection(
    socket: WebSocket,
    service: AuctionService,
    registry: Arc<ConnectionRegistry>,
    queue_capacity: usize,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let id = registry.register(tx).await;
    let mut writer = tokio::spawn(write_loop(id, ws_tx, rx));
    let mut writer_done = false;

    let greeting = match service.snapshot().await {
        Ok(state) => StateChangeEvent::from_snapshot(&state),
        Err(err) => StateChangeEvent::error(err.to_string()),
    };
    reply(&registry, id, &greeting).await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if handle_text(text.as_str(), id, &service, &registry).await.is_break() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!(connection = %id, "binary frame; closing connection");
                        reply(&registry, id, &StateChangeEvent::error(
                            "malformed message: binary frames are not supported",
                        )).await;
                        break;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        let err = AuctionError::ConnectionIo(err.to_string());
                        tracing::debug!(connection = %id, error = %err, "read failed");
                        break;
                    }
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    registry.unregister(id).await;
    if !writer_done && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::debug!(connection = %id, "writer did not drain in time");
    }
    tracing::debug!(connection = %id, "ws connection closed");
}

async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(err) = sink.send(message).await {
            let err = AuctionError::ConnectionIo(err.to_string());
            tracing::debug!(connection = %id, error = %err, "write failed");
            return;
        }
    }
    if let Err(err) = sink.close().await {
        tracing::trace!(connection = %id, error = %err, "close handshake failed");
    }
}

/// Executes one inbound frame. `Break` closes the connection.
async fn handle_text(
    text: &str,
    id: ConnectionId,
    service: &AuctionService,
    registry: &ConnectionRegistry,
) -> ControlFlow<()> {
    let command = match parse_command(text) {
        Ok(command) => command,
        Err(err) => {
            reply(registry, id, &StateChangeEvent::error(err.to_string())).await;
            if err.closes_connection() {
                tracing::warn!(connection = %id, error = %err, "protocol violation; closing connection");
                return ControlFlow::Break(());
            }
            tracing::debug!(connection = %id, error = %err, "invalid command");
            return ControlFlow::Continue(());
        }
    };

    match command {
        ClientCommand::Bid(bid) => match service.submit_bid(bid).await {
            // The viewer sees its own bid through the relayed update.
            Ok(BidOutcome::Accepted) => {}
            Ok(BidOutcome::Rejected(reason)) => {
                reply(registry, id, &StateChangeEvent::error(reason.message())).await;
            }
            Err(err) => {
                tracing::debug!(connection = %id, error = %err, "bid failed");
                reply(registry, id, &StateChangeEvent::error(err.to_string())).await;
            }
        },
        ClientCommand::Start(req) => {
            if let Err(err) = service
                .start_auction(&req.item_name, req.opening_price)
                .await
            {
                tracing::debug!(connection = %id, error = %err, "start failed");
                reply(registry, id, &StateChangeEvent::error(err.to_string())).await;
            }
        }
    }
    ControlFlow::Continue(())
}

async fn reply(registry: &ConnectionRegistry, id: ConnectionId, event: &StateChangeEvent) {
    if let Err(err) = registry.send_to(id, event).await {
        tracing::error!(connection = %id, error = %err, "could not encode reply");
    }
}
