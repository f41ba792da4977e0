use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingChange {
    pub owner_id: Uuid,
    pub listing_id: Uuid,
}

/// Why a subscriber should take a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Changed(Uuid),
    /// The receiver fell behind and missed changes.
    Resync,
}

/// Fan-out of listing writes to live subscribers.
#[derive(Clone)]
pub struct ListingHub {
    tx: broadcast::Sender<ListingChange>,
}

impl ListingHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, change: ListingChange) {
        // No receivers is normal when nobody has the listings page open.
        let _ = self.tx.send(change);
    }

    /// Changes to `owner_id`'s listings. Dropping the stream unsubscribes.
    pub fn subscribe(&self, owner_id: Uuid) -> impl Stream<Item = Refresh> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |msg| match msg {
            Ok(change) if change.owner_id == owner_id => Some(Refresh::Changed(change.listing_id)),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!("Listing subscriber for {} lagged by {}", owner_id, skipped);
                Some(Refresh::Resync)
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ListingHub {
    fn default() -> Self {
        Self::new(256)
    }
}
