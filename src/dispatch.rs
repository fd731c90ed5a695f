//! Periodic snapshot publication: on every tick the dispatcher reads the
//! current state of every book, builds one filtered document and hands it
//! to the publish channel without waiting on subscriber delivery.

use log::{info, error, debug};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::book::{AggregateBook, SourceBook};
use crate::snapshot::{BookSnapshot, SnapshotDocument};


/// Default publish cadence.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Name of the cross-exchange book in the published document.
pub const AGGREGATE_BOOK_NAME: &str = "aggregate";

/// Periodic task assembling snapshot documents from all books.
pub struct Dispatcher {
    /// Per-exchange books, keyed by the name they are published under.
    sources: Vec<(String, Arc<RwLock<SourceBook>>)>,
    aggregate: Arc<RwLock<AggregateBook>>,
    publisher: broadcast::Sender<String>,
    tick: Duration,
}

impl Dispatcher {
    pub fn new(
            sources: Vec<(String, Arc<RwLock<SourceBook>>)>,
            aggregate: Arc<RwLock<AggregateBook>>,
            publisher: broadcast::Sender<String>,
            tick: Duration) -> Self {
        Self { sources, aggregate, publisher, tick }
    }

    /// Tick loop. Runs until the shutdown signal flips; a tick missed
    /// under load is skipped, not replayed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Stopping dispatcher");
                    break;
                }
                _ = ticker.tick() => self.publish_snapshot().await,
            }
        }
    }

    async fn publish_snapshot(&self) {
        let document = self.snapshot_document().await;
        match serde_json::to_string(&document) {
            // Sending with no subscribers connected is fine.
            Ok(json) => {
                if self.publisher.send(json).is_err() {
                    debug!("No subscribers connected");
                }
            }
            Err(error) => error!("Could not serialize snapshot: {:?}", error),
        }
    }

    /// Read every book and build the document for one tick. Locks are
    /// taken one book at a time, read-only.
    pub async fn snapshot_document(&self) -> SnapshotDocument {
        let mut document = SnapshotDocument::new();
        for (name, book) in &self.sources {
            let book = book.read().await;
            document.insert(name.clone(), BookSnapshot::of_source(&book));
        }
        let aggregate = self.aggregate.read().await;
        document.insert(AGGREGATE_BOOK_NAME.to_string(), BookSnapshot::of_aggregate(&aggregate));
        document
    }
}
