//! In-process message bus
//!
//! Broadcast channel carrying domain events out of the player and commands
//! into it. Handlers registered for a topic run on their own task, never on
//! the publisher's.

use crate::events::{BusMessage, Topic};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Broadcast bus for [`BusMessage`]s
#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<BusMessage>,
}

impl MessageBus {
    /// Create a bus keeping up to `capacity` undelivered messages per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers
    ///
    /// Publishing with nobody listening is fine.
    pub fn publish(&self, message: BusMessage) {
        trace!("publish {:?}", message.topic());
        let _ = self.sender.send(message);
    }

    /// Subscribe to every message published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Call `handler` for every message of `topic` published from now on
    ///
    /// Must be called within a tokio runtime. The handler stays registered
    /// until the returned [`Registration`] is dropped.
    pub fn register(
        &self,
        topic: Topic,
        mut handler: impl FnMut(BusMessage) + Send + 'static,
    ) -> Registration {
        let mut receiver = self.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if message.topic() == topic => handler(message),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Handler for {:?} lagged, skipped {} messages", topic, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Registration { handle }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Keeps a topic handler alive; dropping it unregisters the handler
#[derive(Debug)]
pub struct Registration {
    handle: JoinHandle<()>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlayerCommand;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_register_filters_by_topic() {
        let bus = MessageBus::new(16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _registration = bus.register(Topic::PlayerCommand, move |message| {
            let _ = tx.send(message);
        });

        bus.publish(BusMessage::PlaylistChanged);
        bus.publish(BusMessage::Command(PlayerCommand::Next));

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, BusMessage::Command(PlayerCommand::Next)));
    }

    #[tokio::test]
    async fn test_subscribe_sees_published() {
        let bus = MessageBus::default();
        let mut receiver = bus.subscribe();
        bus.publish(BusMessage::QueueStarved);
        assert!(matches!(
            receiver.recv().await.unwrap(),
            BusMessage::QueueStarved
        ));
    }

    #[tokio::test]
    async fn test_dropped_registration_stops_handler() {
        let bus = MessageBus::new(16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registration = bus.register(Topic::Playlist, move |message| {
            let _ = tx.send(message);
        });
        drop(registration);
        tokio::task::yield_now().await;

        bus.publish(BusMessage::PlaylistChanged);
        let received =
            tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv()).await;
        assert!(!matches!(received, Ok(Some(_))));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = MessageBus::new(4);
        bus.publish(BusMessage::PlaylistChanged);
    }
}
