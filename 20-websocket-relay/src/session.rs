use std::{fmt::Display, sync::Arc};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::select;
use tracing::{debug, info, trace, warn};

use crate::registry::{
    ChannelClosed, ConnectionRegistry, Identity, Outbound, OutboundReceiver, outbound_channel,
};

/// Drives one WebSocket connection from handshake to close.
///
/// The registry receives the only sender for this session's outbound queue.
/// Once that sender is gone, because the identity reconnected elsewhere or the
/// server is shutting down, the writer task closes the socket.
pub async fn run_session(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    identity: Identity,
) {
    let (sink, mut stream) = socket.split();
    let (outbound_tx, outbound_rx) = outbound_channel();

    let connection_id = registry.connect(identity.clone(), outbound_tx).await;
    let mut writer = tokio::spawn(forward_outbound(sink, outbound_rx));

    loop {
        select! {
            inbound = stream.next() => {
                if !handle_inbound(inbound, &identity) {
                    break;
                }
            }
            _ = &mut writer => {
                debug!(%identity, connection_id, "outbound side finished");
                break;
            }
        }
    }

    writer.abort();
    registry.release(&identity, connection_id).await;
}

/// Inbound traffic only keeps the connection alive; nothing is relayed.
fn handle_inbound(inbound: Option<Result<Message, axum::Error>>, identity: &str) -> bool {
    match inbound {
        Some(Ok(Message::Close(frame))) => {
            info!(identity, ?frame, "client closed connection");
            false
        }
        Some(Ok(message)) => {
            trace!(identity, ?message, "heartbeat");
            true
        }
        Some(Err(error)) => {
            warn!(identity, %error, "websocket receive error");
            false
        }
        None => false,
    }
}

/// Writes queued texts to the socket, answering each push with the result.
///
/// The first failed write ends the writer. Texts still queued behind it are
/// dropped unanswered, which their senders also read as a failure.
async fn forward_outbound<S>(mut sink: S, mut outbound: OutboundReceiver)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(Outbound { text, written }) = outbound.recv().await {
        if let Err(error) = sink.send(Message::Text(text)).await {
            debug!(%error, "failed to write to websocket");
            let _ = written.send(Err(ChannelClosed));
            return;
        }
        let _ = written.send(Ok(()));
    }

    if let Err(error) = sink.send(Message::Close(None)).await {
        debug!(%error, "failed to send close frame");
    }
}
