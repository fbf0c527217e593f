use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::message::MessageId;
use crate::core::queue::QueueReader;

/// A consumer of one subscription queue.
///
/// The broker never looks inside a subscriber: it registers a queue for the
/// declared ids and hands the read end to [`MessageSubscriber::listen`],
/// which runs on its own task until the queue completes.
#[async_trait]
pub trait MessageSubscriber: Send + Sync + fmt::Debug + 'static {
    /// Ids this subscriber declares. The first one is the routing key.
    fn subscriber_ids(&self) -> &[MessageId];

    fn service_type(&self) -> &str;

    /// Drains `reader` until it reports completion.
    async fn listen(self: Arc<Self>, reader: QueueReader);
}

/// Logs every message it receives. Used for subscribers declared in config.
#[derive(Debug, Clone)]
pub struct LoggingSubscriber {
    service_type: String,
    subscriber_ids: Vec<MessageId>,
}

impl LoggingSubscriber {
    pub fn new(service_type: impl Into<String>, subscriber_ids: Vec<MessageId>) -> Self {
        Self {
            service_type: service_type.into(),
            subscriber_ids,
        }
    }
}

#[async_trait]
impl MessageSubscriber for LoggingSubscriber {
    fn subscriber_ids(&self) -> &[MessageId] {
        &self.subscriber_ids
    }

    fn service_type(&self) -> &str {
        &self.service_type
    }

    async fn listen(self: Arc<Self>, mut reader: QueueReader) {
        while let Some(item) = reader.recv().await {
            info!(
                target: "fanout::subscriber",
                service_type = %self.service_type,
                message_id = %item.message.id,
                name = %item.message.name,
                priority = item.priority,
                "Received message"
            );
        }
        info!(
            target: "fanout::subscriber",
            service_type = %self.service_type,
            "Subscription queue completed"
        );
    }
}
