use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

use crate::core::error::BrokerError;
use crate::core::frame::{FrameError, FrameReader, DEFAULT_MAX_FRAME_LEN};
use crate::core::message::decode_message;
use crate::core::registry::Broker;
use crate::core::shutdown::Shutdown;

const DEFAULT_FRAME_BACKLOG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Frames read ahead of the decode/publish stage.
    pub frame_backlog: usize,
    pub max_frame_len: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            frame_backlog: DEFAULT_FRAME_BACKLOG,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("broker error: {0}")]
    Broker(BrokerError),

    #[error("cancelled by shutdown")]
    Cancelled,
}

impl From<BrokerError> for ConnectionError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Cancelled => ConnectionError::Cancelled,
            other => ConnectionError::Broker(other),
        }
    }
}

/// Per-connection counters, returned when the connection closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub published: u64,
    pub malformed: u64,
}

/// One accepted ingestion connection.
///
/// Reading and decode/publish run as two stages joined on the same task and
/// linked by a bounded frame backlog, so a publish waiting on a full queue
/// does not stop the socket from being drained into the backlog.
pub struct Connection<S> {
    id: u64,
    stream: S,
    broker: Arc<Broker>,
    limits: ConnectionLimits,
    shutdown: Shutdown,
}

impl<S> Connection<S>
where
    S: AsyncRead + Unpin + Send,
{
    pub fn new(
        id: u64,
        stream: S,
        broker: Arc<Broker>,
        limits: ConnectionLimits,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            id,
            stream,
            broker,
            limits,
            shutdown,
        }
    }

    /// Runs the connection to completion. Never fails outward: every
    /// terminal condition is logged here and the stream is dropped.
    pub async fn run(self) -> ConnectionStats {
        let span = tracing::info_span!("connection", conn_id = self.id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> ConnectionStats {
        let Connection {
            id,
            stream,
            broker,
            limits,
            shutdown,
        } = self;

        let (frames_tx, frames_rx) = mpsc::channel(limits.frame_backlog.max(1));
        let reading = read_frames(stream, frames_tx, limits.max_frame_len, shutdown.clone());
        let dispatching = dispatch_frames(frames_rx, &broker, &shutdown);

        let (read_result, (stats, dispatch_result)) = tokio::join!(reading, dispatching);

        for result in [read_result, dispatch_result] {
            match result {
                Ok(()) => {}
                Err(ConnectionError::Cancelled) => {
                    debug!("connection {} stopped by shutdown", id);
                }
                Err(err) => {
                    error!("connection {} error: {}", id, err);
                }
            }
        }

        info!(
            published = stats.published,
            malformed = stats.malformed,
            "connection {} closed",
            id
        );
        stats
    }
}

async fn read_frames<S>(
    stream: S,
    frames: mpsc::Sender<Bytes>,
    max_frame_len: usize,
    mut shutdown: Shutdown,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + Unpin,
{
    let mut reader = FrameReader::new(stream, max_frame_len);
    loop {
        let next = tokio::select! {
            _ = shutdown.triggered() => return Err(ConnectionError::Cancelled),
            next = reader.next_frame() => next?,
        };

        let Some(frame) = next else {
            debug!("peer closed the stream");
            return Ok(());
        };

        if frames.send(frame).await.is_err() {
            // Dispatch stage has ended; it reports its own reason.
            return Ok(());
        }
    }
}

async fn dispatch_frames(
    mut frames: mpsc::Receiver<Bytes>,
    broker: &Broker,
    shutdown: &Shutdown,
) -> (ConnectionStats, Result<(), ConnectionError>) {
    let mut stats = ConnectionStats::default();

    while let Some(frame) = frames.recv().await {
        let message = match decode_message(&frame) {
            Ok(message) => message,
            Err(err) => {
                stats.malformed += 1;
                warn!(error = %err, "Skipping malformed frame");
                continue;
            }
        };

        info!(message_id = %message.id, name = %message.name, "Received message");

        if let Err(err) = broker.publish(Arc::new(message), 0, shutdown).await {
            return (stats, Err(err.into()));
        }
        stats.published += 1;
    }

    (stats, Ok(()))
}
