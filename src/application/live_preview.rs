//! Process-wide live-preview channel.
//!
//! Content editors change entries out of band; every change is fanned out to
//! the mounted routes as a payload-less notification. Each mounted route holds
//! a [`Subscription`] for as long as it is mounted and drops it on unmount.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::broadcast;
use tracing::{debug, info};

const SOURCE: &str = "pagewright::live_preview";
const DEFAULT_CAPACITY: usize = 64;

static GLOBAL: OnceCell<LivePreview> = OnceCell::new();

/// Notification that some entry changed. Carries no detail about which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryChanged {
    /// Monotonic counter of notifications seen by this channel.
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct LivePreviewConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for LivePreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Handle to the live-preview channel. Cheap to clone.
#[derive(Clone)]
pub struct LivePreview {
    inner: Arc<Inner>,
}

struct Inner {
    enabled: bool,
    sender: broadcast::Sender<EntryChanged>,
    subscribers: AtomicUsize,
    generation: AtomicU64,
}

impl LivePreview {
    /// Build a standalone channel. Most callers want [`LivePreview::init`].
    pub fn new(config: &LivePreviewConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                enabled: config.enabled,
                sender,
                subscribers: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Install the process-wide channel. Later calls return the instance
    /// installed by the first one and ignore their configuration.
    pub fn init(config: &LivePreviewConfig) -> LivePreview {
        GLOBAL
            .get_or_init(|| {
                info!(
                    target = SOURCE,
                    enabled = config.enabled,
                    capacity = config.capacity,
                    "live preview initialised"
                );
                LivePreview::new(config)
            })
            .clone()
    }

    /// The process-wide channel, if [`LivePreview::init`] has run.
    pub fn global() -> Option<LivePreview> {
        GLOBAL.get().cloned()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Register a handler for entry-change notifications.
    pub fn subscribe(&self) -> Subscription {
        let receiver = self.inner.sender.subscribe();
        let count = self.inner.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!("pagewright_live_preview_subscribers").set(count as f64);
        debug!(target = SOURCE, subscribers = count, "subscription registered");
        Subscription {
            receiver,
            channel: Arc::clone(&self.inner),
        }
    }

    /// Broadcast an entry change to every current subscriber.
    ///
    /// Returns the number of subscribers that will observe it.
    pub fn notify_entry_change(&self) -> usize {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        counter!("pagewright_live_preview_notifications_total").increment(1);
        let delivered = self
            .inner
            .sender
            .send(EntryChanged { generation })
            .unwrap_or(0);
        debug!(
            target = SOURCE,
            generation, delivered, "entry change broadcast"
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }
}

/// A registered entry-change handler. Unsubscribes when dropped.
pub struct Subscription {
    receiver: broadcast::Receiver<EntryChanged>,
    channel: Arc<Inner>,
}

impl Subscription {
    /// Wait for the next notification.
    ///
    /// Lagging behind the channel collapses the missed notifications into a
    /// single one, since any change means "re-fetch". Returns `None` once the
    /// channel is gone.
    pub async fn changed(&mut self) -> Option<EntryChanged> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(target = SOURCE, skipped, "subscriber lagged");
                let generation = self.channel.generation.load(Ordering::SeqCst);
                self.receiver = self.receiver.resubscribe();
                Some(EntryChanged { generation })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Explicitly remove this handler.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.channel.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        gauge!("pagewright_live_preview_subscribers").set(remaining as f64);
        debug!(target = SOURCE, subscribers = remaining, "subscription removed");
    }
}
