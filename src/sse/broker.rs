//! Live vote fan-out.
//!
//! The subscriber registry lives inside a single control loop task and is
//! only reachable through [`EventBroker`] messages, so registration, removal
//! and publishing are processed one at a time in arrival order.

use crate::sse::models::VoteCastEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Receiving half of a subscriber's delivery channel.
pub type Delivery = mpsc::Receiver<Arc<VoteCastEvent>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BrokerError {
    #[error("event broker has shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    /// Capacity of each subscriber's delivery channel.
    pub subscriber_buffer: usize,
    /// Consecutive full-channel publishes before a subscriber is evicted.
    /// Zero disables eviction.
    pub max_consecutive_drops: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
            max_consecutive_drops: 32,
        }
    }
}

enum Command {
    Register {
        reply: oneshot::Sender<(SubscriberId, Delivery)>,
    },
    Unregister(SubscriberId),
    Publish(Arc<VoteCastEvent>),
    SubscriberCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Cloneable handle to the broker's control loop.
#[derive(Clone)]
pub struct EventBroker {
    commands: mpsc::UnboundedSender<Command>,
}

impl EventBroker {
    /// Spawns the control loop on the current tokio runtime.
    pub fn start(config: BrokerConfig) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        tokio::spawn(ControlLoop::new(config).run(inbox));
        Self { commands }
    }

    pub async fn register(&self) -> Result<(SubscriberId, Delivery), BrokerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Register { reply })
            .map_err(|_| BrokerError::Closed)?;
        response.await.map_err(|_| BrokerError::Closed)
    }

    /// Removes the subscriber and closes its delivery channel. Unknown ids are
    /// ignored.
    pub fn unregister(&self, id: SubscriberId) {
        let _ = self.commands.send(Command::Unregister(id));
    }

    /// Queues `event` for every registered subscriber without waiting on any
    /// of them.
    pub fn publish(&self, event: VoteCastEvent) {
        let _ = self.commands.send(Command::Publish(Arc::new(event)));
    }

    pub async fn subscriber_count(&self) -> usize {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::SubscriberCount { reply }).is_err() {
            return 0;
        }
        response.await.unwrap_or(0)
    }

    /// Closes every delivery channel and stops the control loop.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

struct Subscriber {
    sender: mpsc::Sender<Arc<VoteCastEvent>>,
    consecutive_drops: u32,
}

struct ControlLoop {
    config: BrokerConfig,
    next_id: u64,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl ControlLoop {
    fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            next_id: 0,
            subscribers: HashMap::new(),
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            match command {
                Command::Register { reply } => {
                    let (id, delivery) = self.register();
                    // The caller went away before getting its handle.
                    if reply.send((id, delivery)).is_err() {
                        self.subscribers.remove(&id);
                    }
                }
                Command::Unregister(id) => {
                    if self.subscribers.remove(&id).is_some() {
                        debug!(
                            subscriber = %id,
                            remaining = self.subscribers.len(),
                            "subscriber removed"
                        );
                    }
                }
                Command::Publish(event) => self.publish(&event),
                Command::SubscriberCount { reply } => {
                    let _ = reply.send(self.subscribers.len());
                }
                Command::Shutdown => break,
            }
        }

        debug!(
            subscribers = self.subscribers.len(),
            "event broker stopping, closing delivery channels"
        );
        self.subscribers.clear();
    }

    fn register(&mut self) -> (SubscriberId, Delivery) {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        let (sender, delivery) = mpsc::channel(self.config.subscriber_buffer.max(1));
        self.subscribers.insert(
            id,
            Subscriber {
                sender,
                consecutive_drops: 0,
            },
        );
        debug!(subscriber = %id, total = self.subscribers.len(), "subscriber registered");
        (id, delivery)
    }

    fn publish(&mut self, event: &Arc<VoteCastEvent>) {
        let max_drops = self.config.max_consecutive_drops;
        let mut to_remove = Vec::new();

        for (id, subscriber) in self.subscribers.iter_mut() {
            match subscriber.sender.try_send(Arc::clone(event)) {
                Ok(()) => subscriber.consecutive_drops = 0,
                Err(TrySendError::Full(_)) => {
                    subscriber.consecutive_drops += 1;
                    if max_drops > 0 && subscriber.consecutive_drops >= max_drops {
                        warn!(
                            subscriber = %id,
                            drops = subscriber.consecutive_drops,
                            "evicting slow subscriber"
                        );
                        to_remove.push(*id);
                    } else {
                        debug!(
                            subscriber = %id,
                            drops = subscriber.consecutive_drops,
                            "subscriber channel full, event dropped"
                        );
                    }
                }
                Err(TrySendError::Closed(_)) => to_remove.push(*id),
            }
        }

        for id in to_remove {
            self.subscribers.remove(&id);
        }

        debug!(
            poll_id = %event.poll_id,
            recipients = self.subscribers.len(),
            "vote event published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn make_event() -> VoteCastEvent {
        VoteCastEvent {
            poll_id: Uuid::new_v4(),
            option_id: Uuid::new_v4(),
            voter_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    fn start(subscriber_buffer: usize, max_consecutive_drops: u32) -> EventBroker {
        EventBroker::start(BrokerConfig {
            subscriber_buffer,
            max_consecutive_drops,
        })
    }

    #[tokio::test]
    async fn register_and_unregister_update_count() {
        let broker = start(8, 4);
        let (first, _d1) = broker.register().await.unwrap();
        let (second, _d2) = broker.register().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(broker.subscriber_count().await, 2);

        broker.unregister(first);
        assert_eq!(broker.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event_in_publish_order() {
        let broker = start(64, 4);
        let mut deliveries = Vec::new();
        for _ in 0..3 {
            deliveries.push(broker.register().await.unwrap().1);
        }

        let events: Vec<VoteCastEvent> = (0..10).map(|_| make_event()).collect();
        for event in &events {
            broker.publish(event.clone());
        }

        for delivery in deliveries.iter_mut() {
            for expected in &events {
                let received = delivery.recv().await.unwrap();
                assert_eq!(received.as_ref(), expected);
            }
        }
    }

    #[tokio::test]
    async fn unregister_closes_delivery_channel() {
        let broker = start(8, 4);
        let (id, mut delivery) = broker.register().await.unwrap();

        broker.unregister(id);

        assert!(delivery.recv().await.is_none());
    }

    #[tokio::test]
    async fn double_unregister_leaves_others_untouched() {
        let broker = start(8, 4);
        let (gone, _gone_delivery) = broker.register().await.unwrap();
        let (_kept, mut kept_delivery) = broker.register().await.unwrap();

        broker.unregister(gone);
        broker.unregister(gone);
        assert_eq!(broker.subscriber_count().await, 1);

        let event = make_event();
        broker.publish(event.clone());
        assert_eq!(kept_delivery.recv().await.unwrap().as_ref(), &event);
    }

    #[tokio::test]
    async fn saturated_subscriber_does_not_block_others() {
        let broker = start(1, 0);
        let (_stuck, _never_drained) = broker.register().await.unwrap();
        let (_live, mut live_delivery) = broker.register().await.unwrap();

        for _ in 0..5 {
            let event = make_event();
            broker.publish(event.clone());
            let received = timeout(Duration::from_secs(1), live_delivery.recv())
                .await
                .expect("live subscriber starved by a full one")
                .unwrap();
            assert_eq!(received.as_ref(), &event);
        }

        // Eviction disabled, so the stuck subscriber is still registered.
        assert_eq!(broker.subscriber_count().await, 2);
    }

    #[tokio::test]
    async fn persistently_full_subscriber_is_evicted() {
        let broker = start(1, 2);
        let (_id, mut delivery) = broker.register().await.unwrap();

        let first = make_event();
        broker.publish(first.clone());
        broker.publish(make_event());
        broker.publish(make_event());

        assert_eq!(broker.subscriber_count().await, 0);
        assert_eq!(delivery.recv().await.unwrap().as_ref(), &first);
        assert!(delivery.recv().await.is_none());
    }

    #[tokio::test]
    async fn successful_delivery_resets_drop_counter() {
        let broker = start(1, 2);
        let (_id, mut delivery) = broker.register().await.unwrap();

        for _ in 0..4 {
            broker.publish(make_event());
            broker.publish(make_event());
            assert!(delivery.recv().await.is_some());
        }

        assert_eq!(broker.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn dropped_receiver_is_removed_on_next_publish() {
        let broker = start(8, 4);
        let (_id, delivery) = broker.register().await.unwrap();
        drop(delivery);

        broker.publish(make_event());

        assert_eq!(broker.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let broker = start(8, 4);
        broker.publish(make_event());
        assert_eq!(broker.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_closes_channels_and_rejects_registration() {
        let broker = start(8, 4);
        let (id, mut delivery) = broker.register().await.unwrap();

        broker.shutdown();

        assert!(delivery.recv().await.is_none());
        assert_eq!(broker.register().await.unwrap_err(), BrokerError::Closed);
        broker.unregister(id);
        broker.publish(make_event());
        assert_eq!(broker.subscriber_count().await, 0);
    }
}
