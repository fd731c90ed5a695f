//! Subscriber-facing WebSocket push. Snapshot documents fan out through a
//! broadcast channel; a slow subscriber lags and skips ahead instead of
//! blocking the dispatcher.

use log::{info, error, debug};
use futures::prelude::*;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};


/// How many published documents a subscriber may fall behind before it
/// starts skipping to the most recent ones.
pub const PUBLISH_QUEUE_CAPACITY: usize = 16;

/// Channel carrying serialized snapshot documents from the dispatcher to
/// every connected subscriber.
pub fn publish_channel() -> (broadcast::Sender<String>, broadcast::Receiver<String>) {
    broadcast::channel(PUBLISH_QUEUE_CAPACITY)
}

/// Accept loop for subscriber connections. Each accepted connection gets
/// its own task and its own receiver on the publish channel.
pub async fn serve_subscribers(
        listener: TcpListener,
        publisher: broadcast::Sender<String>,
        mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Stopping subscriber server");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("Subscriber connected from {}", peer);
                    tokio::spawn(handle_subscriber(stream, publisher.subscribe()));
                }
                Err(error) => error!("Accept failed: {:?}", error),
            }
        }
    }
}

/// Forward published documents to one subscriber until it disconnects or
/// the publish channel closes.
async fn handle_subscriber(stream: TcpStream, mut documents: broadcast::Receiver<String>) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(error) => {
            error!("WebSocket handshake failed: {:?}", error);
            return;
        }
    };
    loop {
        match documents.recv().await {
            Ok(json) => {
                if ws.send(Message::Text(json)).await.is_err() {
                    info!("Subscriber disconnected");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Subscriber lagging, skipped {} snapshots", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
