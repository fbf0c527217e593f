use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::core::error::BrokerError;
use crate::core::message::{Message, MessageId, PrioritizedMessage};
use crate::core::queue::{self, QueueReader, QueueWriter};
use crate::core::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Fixed capacity of every subscription queue.
    pub queue_capacity: usize,
    /// Restricts each queue to a single consumer draining in enqueue order.
    pub preserve_order: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            preserve_order: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nobody is subscribed to the message id; nothing was enqueued.
    NoSubscribers,
    /// The message was enqueued on `queues` subscription queues.
    Delivered { queues: usize },
}

#[derive(Debug, Clone)]
struct Subscription {
    subscriber_ids: Arc<[MessageId]>,
    writer: QueueWriter,
}

/// [`Broker`] routes published messages to every queue subscribed to the
/// message's id.
///
/// Subscriptions are kept per id in registration order inside a `DashMap`,
/// as an immutable slice that `subscribe` replaces. A publish works on the
/// slice current when it starts, so no map guard is held while it waits on a
/// full queue.
#[derive(Debug)]
pub struct Broker {
    config: BrokerConfig,
    routes: DashMap<MessageId, Arc<[Subscription]>>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
        if config.queue_capacity == 0 {
            return Err(BrokerError::InvalidCapacity);
        }
        Ok(Self {
            config,
            routes: DashMap::new(),
        })
    }

    /// Registers a new queue under `message_id` and returns its read handle.
    pub fn subscribe(&self, message_id: MessageId, subscriber_ids: &[MessageId]) -> QueueReader {
        let (writer, reader) = queue::bounded(self.config.queue_capacity, self.config.preserve_order);

        let subscription = Subscription {
            subscriber_ids: subscriber_ids.into(),
            writer,
        };
        let mut slot = self
            .routes
            .entry(message_id)
            .or_insert_with(|| Arc::from(Vec::new()));
        let mut next = slot.to_vec();
        next.push(subscription);
        *slot = next.into();
        drop(slot);

        info!(
            target: "fanout::broker",
            %message_id,
            subscriber_ids = ?subscriber_ids,
            capacity = self.config.queue_capacity,
            "Subscriber registered"
        );
        reader
    }

    /// Enqueues `message` on every queue registered for its id.
    ///
    /// Waits while a queue is full. If `shutdown` fires first the call
    /// returns [`BrokerError::Cancelled`]; queues written before that keep
    /// their copy.
    pub async fn publish(
        &self,
        message: Arc<Message>,
        priority: i32,
        shutdown: &Shutdown,
    ) -> Result<PublishOutcome, BrokerError> {
        let message_id = message.id;
        let Some(subscriptions) = self.snapshot(message_id) else {
            warn!(target: "fanout::broker", %message_id, "No subscribers found for message");
            return Ok(PublishOutcome::NoSubscribers);
        };

        if shutdown.is_triggered() {
            return Err(BrokerError::Cancelled);
        }

        debug!(
            target: "fanout::broker",
            %message_id,
            queues = subscriptions.len(),
            "Publishing message"
        );

        let mut shutdown = shutdown.clone();
        let mut delivered = 0;
        for subscription in subscriptions.iter() {
            let item = PrioritizedMessage::new(Arc::clone(&message), priority);
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    return Err(BrokerError::Cancelled);
                }
                result = subscription.writer.send(item) => match result {
                    Ok(()) => delivered += 1,
                    Err(_) => warn!(
                        target: "fanout::broker",
                        %message_id,
                        subscriber_ids = ?subscription.subscriber_ids,
                        "Skipping subscription: reader dropped"
                    ),
                },
            }
        }

        Ok(PublishOutcome::Delivered { queues: delivered })
    }

    /// Number of queues currently registered for `message_id`.
    pub fn subscription_count(&self, message_id: MessageId) -> usize {
        self.routes
            .get(&message_id)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Lists every message id with at least one subscription.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.routes.iter().map(|entry| *entry.key()).collect()
    }

    fn snapshot(&self, message_id: MessageId) -> Option<Arc<[Subscription]>> {
        self.routes
            .get(&message_id)
            .map(|entry| Arc::clone(entry.value()))
    }
}
