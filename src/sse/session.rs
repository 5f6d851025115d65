use crate::sse::broker::{BrokerError, Delivery, EventBroker, SubscriberId};
use crate::sse::models::Frame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Broker registration that is released when dropped, whichever way the
/// owning session ends.
struct Registration {
    broker: EventBroker,
    id: SubscriberId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.broker.unregister(self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The broker closed the delivery channel (eviction or shutdown).
    BrokerClosed,
    /// A write to the client transport failed.
    TransportClosed,
}

/// One live client: drains its delivery channel into outbound frames and
/// emits a keep-alive frame every `heartbeat` so a vanished client shows up
/// as a failed write.
pub struct SubscriptionSession {
    registration: Registration,
    events: Delivery,
    heartbeat: Duration,
}

impl SubscriptionSession {
    pub async fn open(broker: &EventBroker, heartbeat: Duration) -> Result<Self, BrokerError> {
        let (id, events) = broker.register().await?;
        debug!(subscriber = %id, "live session opened");

        Ok(Self {
            registration: Registration {
                broker: broker.clone(),
                id,
            },
            events,
            heartbeat,
        })
    }

    pub fn id(&self) -> SubscriberId {
        self.registration.id
    }

    pub async fn run(mut self, transport: mpsc::Sender<Frame>) -> SessionEnd {
        let mut ticker = time::interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            let frame = tokio::select! {
                received = self.events.recv() => match received {
                    Some(event) => match Frame::vote_cast(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(
                                subscriber = %self.registration.id,
                                error = %e,
                                "failed to serialize vote event"
                            );
                            continue;
                        }
                    },
                    None => break SessionEnd::BrokerClosed,
                },
                _ = ticker.tick() => Frame::KeepAlive,
            };

            if transport.send(frame).await.is_err() {
                break SessionEnd::TransportClosed;
            }
        };

        debug!(subscriber = %self.id(), ?end, "live session closed");
        end
    }
}
