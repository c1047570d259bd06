use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tracing_ingest_bridge::{
    attr::Attr,
    caller,
    handler::{Entry, Handler},
    init::{Bridge, BridgeConfig},
    record::LogRecord,
    severity::Level,
    sink::{Destination, Transport},
};

/// Prints the text of every delivered record.
struct PrintTransport;

#[async_trait]
impl Transport for PrintTransport {
    async fn send(
        &self,
        _destination: &Destination,
        records: &[LogRecord],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        for record in records {
            println!("severity={} {}", record.severity(), record.text());
        }
        Ok(())
    }
}

/// Uses the handler API directly, without `tracing`: derive handlers with
/// default attributes and groups and log through them.
#[tokio::main]
async fn main() {
    let config = BridgeConfig::default();
    let bridge = match Bridge::new(Destination::from_env(), Arc::new(PrintTransport), &config) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("failed to build bridge: {e}");
            return;
        }
    };

    let service = bridge
        .handler
        .with_attributes(vec![Attr::new("service", "billing"), Attr::new("Category", "payments")]);
    let request = service
        .with_group("request")
        .with_attributes(vec![Attr::new("id", 42)]);

    let entry = Entry::new(Level::INFO, "charge accepted")
        .with_caller(caller!())
        .with_attr(Attr::new("amount", 19.99));
    if let Err(e) = request.handle(&entry) {
        eprintln!("handler failed: {e}");
    }

    let entry = Entry::new(Level(6), "custom severity").with_caller(caller!());
    if let Err(e) = service.handle(&entry) {
        eprintln!("handler failed: {e}");
    }

    bridge.shutdown().await;
}
