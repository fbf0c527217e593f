#![allow(dead_code)]

use std::sync::{Arc, Once};

use fanout::core::shutdown::{self, Shutdown, ShutdownTrigger};
use fanout::{Broker, BrokerConfig};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        fanout::logging::init_logging();
    });
}

pub fn broker(queue_capacity: usize, preserve_order: bool) -> Arc<Broker> {
    Arc::new(
        Broker::new(BrokerConfig {
            queue_capacity,
            preserve_order,
        })
        .expect("valid broker config"),
    )
}

/// The trigger must stay alive for the listener to remain untriggered.
pub fn shutdown() -> (ShutdownTrigger, Shutdown) {
    shutdown::channel()
}
