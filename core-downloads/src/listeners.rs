//! # Listener Registry
//!
//! Multi-subscriber fan-out of [`DownloadEvent`]s.
//!
//! Each subscriber owns an unbounded receiver, so a slow listener never makes
//! the download queue wait and never loses events. Events are handed to a
//! dedicated notification task that delivers them in FIFO order to every
//! registered listener, in registration order.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ListenerRegistry::new();
//! let mut subscription = registry.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Some(event) = subscription.receiver.recv().await {
//!         println!("{}", event.description());
//!     }
//! });
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use crate::events::DownloadEvent;

/// Identifier handed out by [`ListenerRegistry::subscribe`].
pub type ListenerId = u64;

/// A registered listener.
#[derive(Debug)]
pub struct ListenerSubscription {
    pub id: ListenerId,
    pub receiver: UnboundedReceiver<DownloadEvent>,
}

type ListenerList = Arc<Mutex<Vec<(ListenerId, UnboundedSender<DownloadEvent>)>>>;

/// Registry of download listeners.
///
/// Cloning is cheap; clones share the same listeners and notification task.
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct ListenerRegistry {
    listeners: ListenerList,
    next_id: Arc<AtomicU64>,
    queue: UnboundedSender<DownloadEvent>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        let listeners: ListenerList = Arc::new(Mutex::new(Vec::new()));
        let (queue, mut pending) = mpsc::unbounded_channel::<DownloadEvent>();

        let task_listeners = Arc::clone(&listeners);
        tokio::spawn(async move {
            while let Some(event) = pending.recv().await {
                deliver(&task_listeners, event);
            }
            debug!("Listener notification task stopped");
        });

        Self {
            listeners,
            next_id: Arc::new(AtomicU64::new(1)),
            queue,
        }
    }

    /// Register a new listener.
    pub fn subscribe(&self) -> ListenerSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::unbounded_channel();
        lock(&self.listeners).push((id, tx));
        debug!(listener_id = id, "Download listener subscribed");
        ListenerSubscription { id, receiver }
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        if listeners.len() != before {
            debug!(listener_id = id, "Download listener unsubscribed");
        }
    }

    /// Number of registered listeners, including ones whose receiver was
    /// dropped but not yet pruned.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Queue an event for delivery to every listener.
    pub fn notify(&self, event: DownloadEvent) {
        trace!(event = event.description(), "Queueing download event");
        // Only fails once every registry clone is gone.
        let _ = self.queue.send(event);
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(
    listeners: &Mutex<Vec<(ListenerId, UnboundedSender<DownloadEvent>)>>,
) -> MutexGuard<'_, Vec<(ListenerId, UnboundedSender<DownloadEvent>)>> {
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn deliver(listeners: &ListenerList, event: DownloadEvent) {
    let mut listeners = lock(listeners);
    listeners.retain(|(id, tx)| {
        if tx.send(event.clone()).is_ok() {
            true
        } else {
            debug!(listener_id = *id, "Pruning dropped download listener");
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_listener_receives_events_in_order() {
        let registry = ListenerRegistry::new();
        let mut first = registry.subscribe();
        let mut second = registry.subscribe();
        assert_ne!(first.id, second.id);

        registry.notify(DownloadEvent::QueueRefreshed);
        registry.notify(DownloadEvent::AllRemoved);

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.receiver.recv().await, Some(DownloadEvent::QueueRefreshed));
            assert_eq!(sub.receiver.recv().await, Some(DownloadEvent::AllRemoved));
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_stops_delivery() {
        let registry = ListenerRegistry::new();
        let mut gone = registry.subscribe();
        let mut kept = registry.subscribe();

        registry.unsubscribe(gone.id);
        registry.unsubscribe(gone.id);
        registry.unsubscribe(9_999);
        assert_eq!(registry.listener_count(), 1);

        registry.notify(DownloadEvent::AllRemoved);
        assert_eq!(kept.receiver.recv().await, Some(DownloadEvent::AllRemoved));
        // Sender was dropped with the registry entry.
        assert_eq!(gone.receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receivers_are_pruned() {
        let registry = ListenerRegistry::new();
        let dropped = registry.subscribe();
        let mut live = registry.subscribe();
        drop(dropped);

        registry.notify(DownloadEvent::QueueRefreshed);
        assert_eq!(live.receiver.recv().await, Some(DownloadEvent::QueueRefreshed));
        assert_eq!(registry.listener_count(), 1);
    }
}
