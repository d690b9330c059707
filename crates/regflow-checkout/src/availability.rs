//! # Availability Tracker
//!
//! Keeps the latest ticket counts pushed by the availability feed.
//!
//! ## Message Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  feed ──{item, count, sold_out}──► consume() ──► ┌──────────────────┐   │
//! │  (any Stream)                                    │  latest board    │   │
//! │                                                  │  banquet: 12     │   │
//! │                                                  │  brunch:  0 SO   │   │
//! │                                                  └────────┬─────────┘   │
//! │                                                           │             │
//! │  submit() ──────────────── apply_to(&mut catalog) ◄───────┘             │
//! │                                                                         │
//! │  Updates are ABSOLUTE: the newest value for an item replaces the old.  │
//! │  The board is advisory; submission re-validates regardless.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use regflow_core::{AvailabilityUpdate, Catalog, ItemId};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct AvailabilityTracker {
    board: Arc<RwLock<HashMap<ItemId, AvailabilityUpdate>>>,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one update, replacing any earlier value for the item.
    pub async fn record(&self, update: AvailabilityUpdate) {
        debug!(
            item_id = %update.item_id,
            available = update.available_count,
            sold_out = update.is_sold_out,
            "Availability update"
        );
        self.board
            .write()
            .await
            .insert(update.item_id.clone(), update);
    }

    /// Drains `feed` into the board. Returns how many updates were read.
    pub async fn consume<S>(&self, feed: S) -> u64
    where
        S: Stream<Item = AvailabilityUpdate>,
    {
        tokio::pin!(feed);
        let mut seen = 0;
        while let Some(update) = feed.next().await {
            self.record(update).await;
            seen += 1;
        }
        info!(updates = seen, "Availability feed ended");
        seen
    }

    /// Consumes `feed` on a background task.
    pub fn spawn<S>(&self, feed: S) -> JoinHandle<u64>
    where
        S: Stream<Item = AvailabilityUpdate> + Send + 'static,
    {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.consume(feed).await })
    }

    pub async fn latest(&self, item_id: &ItemId) -> Option<AvailabilityUpdate> {
        self.board.read().await.get(item_id).cloned()
    }

    /// Copies every known count into `catalog`. Returns how many items changed.
    pub async fn apply_to(&self, catalog: &mut Catalog) -> usize {
        let board = self.board.read().await;
        let applied = board
            .values()
            .filter(|update| catalog.apply_availability(update))
            .count();
        if applied > 0 {
            debug!(applied, version = catalog.version, "Availability applied to catalog");
        }
        applied
    }

    pub async fn len(&self) -> usize {
        self.board.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.board.read().await.is_empty()
    }
}
