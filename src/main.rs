//! fanout – broker daemon.
//
//  $ fanout --config fanout.toml
//  $ FANOUT_PORT=9000 fanout
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use fanout::core::shutdown;
use fanout::core::subscriber::LoggingSubscriber;
use fanout::logging::init_logging;
use fanout::{load_config, Broker, Config, Server};

const SUBSCRIBER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "fanout", version, about = "Line-delimited JSON message broker")]
struct Cli {
    /// Path to config TOML (env FANOUT_CONFIG overrides)
    #[arg(short, long, default_value = "fanout.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let cfg_path: String = std::env::var("FANOUT_CONFIG").unwrap_or(cli.config);
    let cfg: Config = load_config(&cfg_path)?;
    info!("Starting server with config {}", cfg_path);

    let broker = Arc::new(Broker::new(cfg.broker_config())?);
    let (trigger, shutdown) = shutdown::channel();

    let mut server = Server::bind(&cfg.server, broker, shutdown).await?;
    for sub in &cfg.subscribers {
        let subscriber = LoggingSubscriber::new(&sub.service_type, sub.subscriber_ids.clone());
        server.attach(Arc::new(subscriber))?;
    }

    tokio::spawn(async move {
        if let Err(e) = shutdown::trigger_on_signal(trigger).await {
            error!("failed to listen for shutdown signals: {e}");
        }
    });

    let subscriber_tasks = server.run().await?;
    let drain = async {
        for task in subscriber_tasks {
            if let Err(e) = task.await {
                error!("subscriber task failed: {e}");
            }
        }
    };
    if tokio::time::timeout(SUBSCRIBER_DRAIN_TIMEOUT, drain).await.is_err() {
        warn!(
            "subscribers still draining after {:?}; exiting",
            SUBSCRIBER_DRAIN_TIMEOUT
        );
    }
    info!("Server stopped");
    Ok(())
}
