//! Event bus broadcasting store changes to subscribers.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, StoreEvent, SubscriptionHandle, SubscriptionId};

/// Default number of buffered events per subscriber.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

struct Subscription {
    sender: Sender<StoreEvent>,
    /// Events buffered before the subscriber counts as overflowing. The
    /// channel holds one more slot, kept for the `Dropped` notice.
    limit: usize,
}

impl Subscription {
    /// Try to send an event. Returns false if the subscriber should be dropped.
    fn try_send(&self, event: StoreEvent) -> bool {
        if self.sender.len() >= self.limit {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Best-effort notice before the subscription is removed.
    fn notify_dropped(&self, reason: DropReason) {
        let _ = self.sender.try_send(StoreEvent::Dropped { reason });
    }
}

/// Fans store events out to subscribers over bounded channels.
///
/// A subscriber whose buffer is full, or whose receiver is gone, is
/// removed on the next publish instead of blocking the store. A full
/// subscriber receives `Dropped { reason: BufferOverflow }` as its last event.
pub struct EventBus {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.buffer_size + 1);

        self.subscriptions.write().insert(
            id,
            Subscription {
                sender,
                limit: self.buffer_size,
            },
        );

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscriptions.write().remove(&id) {
            sub.notify_dropped(DropReason::Unsubscribed);
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Send `event` to every subscriber, dropping those that cannot take it.
    pub fn publish(&self, event: StoreEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            if subs.is_empty() {
                return;
            }
            for (id, sub) in subs.iter() {
                if !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::debug!(subscription = id.0, "dropping slow or closed subscriber");
                    sub.notify_dropped(DropReason::BufferOverflow);
                }
            }
        }
    }
}
