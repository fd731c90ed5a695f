//! Common machinery for WebSocket exchange feeds: the adapter traits and
//! the long-running task that keeps one exchange's updates applied to its
//! own book and the shared aggregate.

use log::{info, error, debug};
use futures::prelude::*;
use std::sync::Arc;
use tokio::{net::TcpStream, sync::{watch, RwLock}, time::{sleep, Duration}};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};

use crate::book::{AggregateBook, SourceBook};
use crate::core::*;


/// Delay before trying reconnection
const SLEEP_BEFORE_RECONNECT_MS: u64 = 200;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;


/// Exchange-specific parser turning a raw message into a normalized
/// [BookUpdate](BookUpdate).
pub trait BookUpdateReader: Send + Sync {
    /// Parse one raw exchange message. `None` means the message does not
    /// decode to a complete book update; nothing from it is applied.
    fn read_book_update(&self, value: &str) -> Option<BookUpdate>;
}

/// Contains all the information to connect to an exchange.
pub trait BookUpdateSource: Send + Sync {
    /// WebSocket URL.
    fn ws_url(&self) -> String;

    /// Subscription message to send after connecting, for exchanges that
    /// do not encode the channel in the URL.
    fn subscribe_message(&self) -> Option<String>;

    /// Exchange-specific message parser.
    fn make_book_update_reader(&self) -> Box<dyn BookUpdateReader>;

    /// Exchange code. Used for messages and as the published book name.
    fn exchange_code(&self) -> &'static str;
}

/// The handles a feed task writes through: the book it exclusively owns
/// plus the aggregate shared with every other feed.
pub struct FeedBooks {
    pub source: Arc<RwLock<SourceBook>>,
    pub aggregate: Arc<RwLock<AggregateBook>>,
}

/// Apply one decoded update to the feed's own book and to the shared
/// aggregate. Each lock is held for one whole batch, so a message is
/// applied atomically with respect to other feeds and the dispatcher.
pub async fn apply_book_update(update: &BookUpdate, books: &FeedBooks) {
    {
        let mut book = books.source.write().await;
        for level in &update.bids {
            book.apply_update(Side::Bid, level.price, level.quantity);
        }
        for level in &update.asks {
            book.apply_update(Side::Ask, level.price, level.quantity);
        }
    }
    let mut aggregate = books.aggregate.write().await;
    for level in &update.bids {
        aggregate.apply_update(Side::Bid, level.price, level.quantity);
    }
    for level in &update.asks {
        aggregate.apply_update(Side::Ask, level.price, level.quantity);
    }
}

/// Long-running task for one exchange feed. Connects, subscribes, applies
/// updates in arrival order, answers pings and reconnects after transport
/// failures. Exits when the shutdown signal flips.
pub async fn run_feed(
        adapter: Box<dyn BookUpdateSource>,
        books: FeedBooks,
        mut shutdown: watch::Receiver<bool>) {
    let reader = adapter.make_book_update_reader();
    let exchange_code = adapter.exchange_code();
    'connection:
    loop {
        if *shutdown.borrow() {
            break;
        }
        let mut ws = match connect(adapter.as_ref()).await {
            Ok(ws) => ws,
            Err(error) => {
                error!("Connection to {} failed: {:?}", exchange_code, error);
                sleep(Duration::from_millis(SLEEP_BEFORE_RECONNECT_MS)).await;
                continue;
            }
        };
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Disconnecting exchange {}", exchange_code);
                    match ws.close(None).await {
                        Ok(_) => info!("Exchange {} disconnected", exchange_code),
                        Err(error) => error!("Error disconnecting from {}: {:?}", exchange_code, error),
                    }
                    break 'connection;
                }
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        match reader.read_book_update(&text) {
                            Some(update) => apply_book_update(&update, &books).await,
                            None => debug!("Could not parse message from {}: {}", exchange_code, text),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping from {}", exchange_code);
                        if ws.send(Message::Pong(data)).await.is_err() {
                            error!("Error sending ping response to {}", exchange_code);
                        }
                    }
                    Some(Err(
                            tungstenite::Error::AlreadyClosed |
                            tungstenite::Error::Io(_)
                        )
                    ) | None => {
                        error!("Connection to exchange {} closed", exchange_code);
                        break;
                    }
                    Some(other) => debug!("Received unexpected message: {:?}", other),
                }
            }
        }
        info!("Trying reconnection in {}ms", SLEEP_BEFORE_RECONNECT_MS);
        sleep(Duration::from_millis(SLEEP_BEFORE_RECONNECT_MS)).await;
    }
}

/// Two step connection: open the WebSocket, then subscribe to the book
/// channel when the exchange requires an explicit subscription.
async fn connect(adapter: &dyn BookUpdateSource) -> Result<WsStream, FeedError> {
    let ws_url = adapter.ws_url();
    info!("Connecting to WebSocket: {}", &ws_url);
    let (mut ws, _) = connect_async(ws_url).await.map_err(|_| FeedError::Io)?;
    if let Some(subscribe_message) = adapter.subscribe_message() {
        info!("Subscription '{}'.", subscribe_message);
        ws.send(Message::Text(subscribe_message))
            .await
            .map_err(|_| FeedError::Subscription)?;
    }
    info!("Connected to {}.", adapter.exchange_code());
    Ok(ws)
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn feed_books() -> FeedBooks {
        FeedBooks {
            source: Arc::new(RwLock::new(SourceBook::new())),
            aggregate: Arc::new(RwLock::new(AggregateBook::new())),
        }
    }

    #[tokio::test]
    async fn test_apply_book_update_reaches_both_books() {
        let books = feed_books();
        let update = BookUpdate {
            exchange_code: "test",
            bids: vec![PriceQty::from_strs("100", "2"), PriceQty::from_strs("99", "1")],
            asks: vec![PriceQty::from_strs("101", "3")],
        };
        apply_book_update(&update, &books).await;
        let source = books.source.read().await;
        assert_eq!(source.bids().get(dec("100")), Some(dec("2")));
        assert_eq!(source.asks().get(dec("101")), Some(dec("3")));
        let aggregate = books.aggregate.read().await;
        assert_eq!(aggregate.bids().get(dec("99")), Some(dec("1")));
    }

    #[tokio::test]
    async fn test_reapplied_update_replaces_source_but_adds_to_aggregate() {
        let books = feed_books();
        let update = BookUpdate {
            exchange_code: "test",
            bids: vec![PriceQty::from_strs("100", "2")],
            asks: vec![],
        };
        apply_book_update(&update, &books).await;
        apply_book_update(&update, &books).await;
        assert_eq!(books.source.read().await.bids().get(dec("100")), Some(dec("2")));
        assert_eq!(books.aggregate.read().await.bids().get(dec("100")), Some(dec("4")));
    }

    #[tokio::test]
    async fn test_zero_quantity_level_removes_from_both_books() {
        let books = feed_books();
        let populate = BookUpdate {
            exchange_code: "test",
            bids: vec![],
            asks: vec![PriceQty::from_strs("50", "1")],
        };
        apply_book_update(&populate, &books).await;
        let delete = BookUpdate {
            exchange_code: "test",
            bids: vec![],
            asks: vec![PriceQty::from_strs("50", "0")],
        };
        apply_book_update(&delete, &books).await;
        assert!(books.source.read().await.asks().is_empty());
        assert!(books.aggregate.read().await.asks().is_empty());
    }
}
