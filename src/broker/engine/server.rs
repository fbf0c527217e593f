//! TCP ingestion server.
//!
//! Registers subscribers with the broker, then accepts connections and runs
//! each one on its own task until the shutdown signal is raised.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::broker::engine::connection::{Connection, ConnectionLimits};
use crate::config::ServerConfig;
use crate::core::error::BrokerError;
use crate::core::registry::Broker;
use crate::core::shutdown::Shutdown;
use crate::core::subscriber::MessageSubscriber;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

pub struct Server {
    listener: TcpListener,
    broker: Arc<Broker>,
    limits: ConnectionLimits,
    shutdown: Shutdown,
    subscriber_tasks: Vec<JoinHandle<()>>,
}

impl Server {
    /// Binds the listening socket described by `config`.
    pub async fn bind(
        config: &ServerConfig,
        broker: Arc<Broker>,
        shutdown: Shutdown,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.bind_addr.as_str(), config.port)).await?;
        info!("Starting TCP server on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            broker,
            limits: ConnectionLimits {
                frame_backlog: config.frame_backlog,
                max_frame_len: config.max_frame_len,
            },
            shutdown,
            subscriber_tasks: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Subscribes `subscriber` under the first of its ids and starts its
    /// drain task.
    pub fn attach(&mut self, subscriber: Arc<dyn MessageSubscriber>) -> Result<(), BrokerError> {
        let ids = subscriber.subscriber_ids();
        let Some(&routing_id) = ids.first() else {
            return Err(BrokerError::NoSubscriberIds(
                subscriber.service_type().to_string(),
            ));
        };

        let reader = self.broker.subscribe(routing_id, ids);
        info!(
            service_type = subscriber.service_type(),
            message_id = %routing_id,
            "Starting subscriber"
        );

        let task = tokio::spawn(subscriber.listen(reader));
        self.subscriber_tasks.push(task);
        Ok(())
    }

    /// Run the accept loop until a shutdown signal is received.
    ///
    /// Connections already running are not awaited; they see the same signal
    /// and wind down on their own. Returns the subscriber drain tasks, which
    /// finish once every connection has released the broker and their queues
    /// are empty.
    pub async fn run(self) -> Result<Vec<JoinHandle<()>>, ServerError> {
        let Server {
            listener,
            broker,
            limits,
            mut shutdown,
            subscriber_tasks,
        } = self;

        let mut next_conn_id: u64 = 1;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let conn_id = next_conn_id;
                            next_conn_id = next_conn_id.wrapping_add(1);

                            if let Err(err) = stream.set_nodelay(true) {
                                debug!("set_nodelay failed for {}: {}", addr, err);
                            }
                            info!("Client connected from {} (connection {})", addr, conn_id);

                            let connection = Connection::new(
                                conn_id,
                                stream,
                                Arc::clone(&broker),
                                limits,
                                shutdown.clone(),
                            );
                            tokio::spawn(async move {
                                connection.run().await;
                                info!("Client disconnected from {} (connection {})", addr, conn_id);
                            });
                        }
                        Err(err) => {
                            error!("accept error: {}", err);
                        }
                    }
                }
                _ = shutdown.triggered() => {
                    info!("shutdown signal received; stopping accept loop");
                    break;
                }
            }
        }

        debug!(
            subscribers = subscriber_tasks.len(),
            "accept loop stopped; subscriber tasks left to drain"
        );
        Ok(subscriber_tasks)
    }
}
