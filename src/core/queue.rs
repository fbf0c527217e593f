//! Bounded per-subscription queues.
//!
//! Every subscription owns one fixed-capacity multi-producer queue. The
//! broker keeps the writing end; the subscriber receives a [`QueueReader`].

use flume::{Receiver, Sender};

use crate::core::message::PrioritizedMessage;

/// Writing end of a subscription queue, held by the broker.
#[derive(Debug, Clone)]
pub(crate) struct QueueWriter {
    sender: Sender<PrioritizedMessage>,
}

impl QueueWriter {
    /// Waits for a free slot and enqueues `item`.
    ///
    /// Dropping the returned future before it resolves leaves the queue
    /// untouched. Fails only when the reader side is gone, handing the item
    /// back.
    pub(crate) async fn send(&self, item: PrioritizedMessage) -> Result<(), PrioritizedMessage> {
        self.sender.send_async(item).await.map_err(|e| e.into_inner())
    }
}

/// Read handle for a subscription queue.
#[derive(Debug)]
pub struct QueueReader {
    receiver: Receiver<PrioritizedMessage>,
    preserve_order: bool,
}

/// Creates a queue holding at most `capacity` messages.
pub(crate) fn bounded(capacity: usize, preserve_order: bool) -> (QueueWriter, QueueReader) {
    let (sender, receiver) = flume::bounded(capacity);
    (
        QueueWriter { sender },
        QueueReader {
            receiver,
            preserve_order,
        },
    )
}

impl QueueReader {
    /// Waits for the next message.
    ///
    /// Returns `None` once the queue is drained and the broker has dropped
    /// every writer. Takes `&mut self` so a shared handle cannot be drained
    /// by several tasks; use [`QueueReader::fork`] for that.
    pub async fn recv(&mut self) -> Option<PrioritizedMessage> {
        self.receiver.recv_async().await.ok()
    }

    /// Takes the next message without waiting.
    pub fn try_recv(&mut self) -> Option<PrioritizedMessage> {
        self.receiver.try_recv().ok()
    }

    /// Hands out another consumer of the same queue.
    ///
    /// Queues created with order preservation have exactly one consumer, so
    /// this returns `None` for them.
    pub fn fork(&self) -> Option<QueueReader> {
        if self.preserve_order {
            return None;
        }
        Some(QueueReader {
            receiver: self.receiver.clone(),
            preserve_order: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.receiver.capacity().unwrap_or(usize::MAX)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// True once every writer is gone; buffered messages may still remain.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_disconnected()
    }
}
