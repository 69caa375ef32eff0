use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::event::{Envelope, Event};

const DEFAULT_CAPACITY: usize = 64;

/// In-process publish/subscribe bus with one channel per topic.
///
/// Subscriptions end when the [`Subscription`] is dropped or explicitly
/// unsubscribed, so a view that goes away cannot leak a listener.
pub struct EventBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publish an event to its topic. Returns the number of subscribers that
    /// received it.
    pub fn publish<E: Event>(&self, event: &E) -> usize {
        let envelope = event.to_envelope();
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = topics.get(&envelope.topic) else {
            return 0;
        };
        match sender.send(envelope) {
            Ok(n) => n,
            Err(_) => {
                debug!(topic = event.topic(), "No live subscribers");
                0
            }
        }
    }

    /// Subscribe to a topic, decoding payloads as `E`.
    pub fn subscribe<E: Event>(&self, topic: &str) -> Subscription<E> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let receiver = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Subscription {
            topic: topic.to_string(),
            receiver,
            _marker: PhantomData,
        }
    }

    /// Number of live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).map(|s| s.receiver_count()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A typed handle on one topic of an [`EventBus`].
pub struct Subscription<E: Event> {
    topic: String,
    receiver: broadcast::Receiver<Envelope>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Event> Subscription<E> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => match E::from_envelope(&envelope) {
                    Ok(event) => return Some(event),
                    Err(e) => warn!(topic = %self.topic, error = %e, "Dropping undecodable event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => match E::from_envelope(&envelope) {
                    Ok(event) => return Some(event),
                    Err(e) => warn!(topic = %self.topic, error = %e, "Dropping undecodable event"),
                },
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// End the subscription.
    pub fn unsubscribe(self) {}
}
