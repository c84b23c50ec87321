use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::record::SpanRecord;

/// Maximum number of undelivered events per subscriber.
pub const SUBSCRIBER_CAPACITY: usize = 1000;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<SpanRecord>>,
}

/// Fans span events out to live subscribers.
///
/// Create one per process and hand clones to whoever publishes or
/// subscribes. Delivery is best effort: a subscriber whose queue is full
/// misses the event, publishing never blocks.
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl Broadcaster {
    /// Creates a hub without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `record` to every current subscriber.
    pub fn publish(&self, record: &SpanRecord) {
        let subscribers = self.subscribers.lock();
        for (id, sender) in &subscribers.senders {
            match sender.try_send(record.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    trace!("subscriber {id} is full, dropping span event");
                }
                // The subscription is being dropped.
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Registers a new subscriber.
    ///
    /// Only events published after this call are delivered. The
    /// subscriber is removed when the subscription is dropped.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut subscribers = self.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.insert(id, tx);
        debug!("span subscriber {id} joined");
        Subscription {
            id,
            rx,
            broadcaster: self.clone(),
        }
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().senders.len()
    }
}

/// A registered receiver of span events.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<SpanRecord>,
    broadcaster: Broadcaster,
}

impl Subscription {
    /// Waits for the next event, in publish order.
    ///
    /// This method is cancellation safe.
    pub async fn recv(&mut self) -> Option<SpanRecord> {
        self.rx.recv().await
    }

    /// Returns the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<SpanRecord> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.subscribers.lock().senders.remove(&self.id);
        debug!("span subscriber {} left", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordStatus;
    use crate::types::{SpanData, SpanKind};

    fn record(name: &str) -> SpanRecord {
        SpanRecord {
            ts: "2026-01-01T00:00:00.000+00:00".to_owned(),
            trace_id: "tr_1".to_owned(),
            span_id: format!("sp_{name}"),
            parent_id: None,
            name: name.to_owned(),
            kind: SpanKind::Internal,
            duration_ms: None,
            status: RecordStatus::Running,
            data: SpanData::new(),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_publish_order() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(&record("before"));

        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        for name in ["a", "b", "c"] {
            broadcaster.publish(&record(name));
        }
        for sub in [&mut first, &mut second] {
            for name in ["a", "b", "c"] {
                assert_eq!(sub.recv().await.unwrap().name, name);
            }
            assert!(sub.try_recv().is_none());
        }
    }

    #[test]
    fn test_full_subscriber_is_skipped() {
        let broadcaster = Broadcaster::new();
        let mut slow = broadcaster.subscribe();
        for i in 0..SUBSCRIBER_CAPACITY + 10 {
            broadcaster.publish(&record(&i.to_string()));
        }
        let mut fresh = broadcaster.subscribe();
        broadcaster.publish(&record("late"));

        let mut received = 0;
        while slow.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_CAPACITY);
        assert_eq!(fresh.try_recv().unwrap().name, "late");
    }

    #[test]
    fn test_drop_unsubscribes() {
        let broadcaster = Broadcaster::new();
        let sub = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.publish(&record("nobody"));
    }
}
