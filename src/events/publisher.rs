use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;

use crate::error::EngineResult;
use crate::models::Queueable;

use super::subscription::TopicSubscription;

/// A bean as it was when it was broadcast
#[derive(Debug, Clone)]
pub struct BeanEvent<B> {
    pub bean: B,
    pub published_at: DateTime<Utc>,
}

impl<B> BeanEvent<B> {
    pub fn new(bean: B) -> Self {
        Self {
            bean,
            published_at: Utc::now(),
        }
    }
}

/// Broadcasts bean state to whoever is listening on a status topic
pub trait Publisher<B>: Send + Sync {
    fn broadcast(&self, bean: &B) -> EngineResult<()>;
}

/// Per-listener senders of a topic. Listener channels are unbounded so a slow
/// listener never loses a final status.
pub(crate) type ListenerSenders<B> = Arc<Mutex<Vec<mpsc::UnboundedSender<BeanEvent<B>>>>>;

/// In-process status topic. Listeners attached through a
/// [`TopicSubscription`] get every event; raw receivers from
/// [`TopicPublisher::subscribe`] share a bounded broadcast channel and may
/// lag.
pub struct TopicPublisher<B> {
    topic: String,
    sender: broadcast::Sender<BeanEvent<B>>,
    listeners: ListenerSenders<B>,
}

impl<B> Clone for TopicPublisher<B> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            sender: self.sender.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<B: Queueable> TopicPublisher<B> {
    /// Create a new topic with the specified channel capacity
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            sender,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribe to raw events
    pub fn subscribe(&self) -> broadcast::Receiver<BeanEvent<B>> {
        self.sender.subscribe()
    }

    /// Create a subscription that dispatches events on this topic to listeners
    pub fn subscription(&self) -> TopicSubscription<B> {
        TopicSubscription::new(self.topic.clone(), self.listeners.clone())
    }

    /// Get the number of raw receivers and attached listeners
    pub fn subscriber_count(&self) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| !listener.is_closed());
        self.sender.receiver_count() + listeners.len()
    }
}

impl<B: Queueable> Publisher<B> for TopicPublisher<B> {
    fn broadcast(&self, bean: &B) -> EngineResult<()> {
        let event = BeanEvent::new(bean.clone());
        // Held while sending so every listener sees broadcasts in one order
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| listener.send(event.clone()).is_ok());
        // send() only fails when nobody is subscribed, which is fine for a
        // status topic
        if self.sender.send(event).is_err() && listeners.is_empty() {
            trace!(
                topic = %self.topic,
                bean_id = %bean.unique_id(),
                "No subscribers for status broadcast"
            );
        }
        Ok(())
    }
}

/// Publishes one bean type onto a topic carrying another, e.g. a `MoveAtom`
/// process publishing onto an active queue's `QueueAtom` topic
pub struct MappedPublisher<B, T> {
    inner: Arc<dyn Publisher<T>>,
    map: fn(B) -> T,
}

impl<B, T> MappedPublisher<B, T> {
    pub fn new(inner: Arc<dyn Publisher<T>>, map: fn(B) -> T) -> Self {
        Self { inner, map }
    }
}

impl<B, T> Publisher<B> for MappedPublisher<B, T>
where
    B: Clone + Send + Sync,
    T: Send + Sync,
{
    fn broadcast(&self, bean: &B) -> EngineResult<()> {
        self.inner.broadcast(&(self.map)(bean.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MoveAtom, QueueAtom};

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let publisher = TopicPublisher::<QueueAtom>::new("status", 8);
        let atom = QueueAtom::from(MoveAtom::single("m", "x", 1.0));
        assert!(publisher.broadcast(&atom).is_ok());
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_mapped_publisher_wraps_bean() {
        let topic = TopicPublisher::<QueueAtom>::new("status", 8);
        let mut receiver = topic.subscribe();
        let mapped: MappedPublisher<MoveAtom, QueueAtom> =
            MappedPublisher::new(Arc::new(topic.clone()), QueueAtom::Move);

        let atom = MoveAtom::single("m", "x", 1.0);
        mapped.broadcast(&atom).unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.bean, QueueAtom::Move(atom));
    }
}
