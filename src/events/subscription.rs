use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

use super::publisher::{BeanEvent, ListenerSenders};

/// Receives bean-change events from a subscription
pub trait BeanListener<B>: Send + Sync {
    fn bean_change_performed(&self, event: &BeanEvent<B>);
}

/// A live connection to a status topic
pub trait Subscription<B>: Send + Sync {
    /// Start delivering events to `listener`. Events broadcast after this
    /// call returns are guaranteed to reach the listener.
    fn add_listener(&self, listener: Arc<dyn BeanListener<B>>) -> EngineResult<()>;

    /// Stop delivering events. Calling this more than once is harmless.
    fn disconnect(&self) -> EngineResult<()>;

    fn is_connected(&self) -> bool;
}

/// Subscription to an in-process [`TopicPublisher`](super::TopicPublisher).
/// Each listener gets its own unbounded channel and dispatch task, so every
/// event reaches a listener, in the order it was broadcast.
pub struct TopicSubscription<B> {
    topic: String,
    listeners: ListenerSenders<B>,
    dispatchers: Mutex<Vec<JoinHandle<()>>>,
    connected: AtomicBool,
}

impl<B> TopicSubscription<B> {
    pub(crate) fn new(topic: String, listeners: ListenerSenders<B>) -> Self {
        Self {
            topic,
            listeners,
            dispatchers: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<B: Clone + Send + Sync + 'static> Subscription<B> for TopicSubscription<B> {
    fn add_listener(&self, listener: Arc<dyn BeanListener<B>>) -> EngineResult<()> {
        if !self.is_connected() {
            return Err(EngineError::Transport(format!(
                "subscription to '{}' has been disconnected",
                self.topic
            )));
        }
        let runtime = Handle::try_current().map_err(|e| {
            EngineError::Transport(format!("no async runtime to dispatch '{}': {e}", self.topic))
        })?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<BeanEvent<B>>();
        let dispatcher = runtime.spawn(async move {
            while let Some(event) = receiver.recv().await {
                listener.bean_change_performed(&event);
            }
        });
        self.listeners.lock().push(sender);
        self.dispatchers.lock().push(dispatcher);
        Ok(())
    }

    fn disconnect(&self) -> EngineResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            let dispatchers = std::mem::take(&mut *self.dispatchers.lock());
            debug!(topic = %self.topic, listeners = dispatchers.len(), "Disconnecting subscription");
            for dispatcher in dispatchers {
                dispatcher.abort();
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl<B> Drop for TopicSubscription<B> {
    fn drop(&mut self) {
        for dispatcher in self.dispatchers.get_mut().drain(..) {
            dispatcher.abort();
        }
    }
}
