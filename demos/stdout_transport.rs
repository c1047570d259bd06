use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_ingest_bridge::{
    init::init_tracing,
    record::LogRecord,
    sink::{Destination, Transport},
};

/// Example of integrating a backend by implementing the `Transport`
/// trait directly. A real transport would POST the batch to the
/// ingestion endpoint; this one prints each record as a JSON line.
struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    async fn send(
        &self,
        destination: &Destination,
        records: &[LogRecord],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        for record in records {
            println!(
                "[{}/{}] {}",
                destination.application_name,
                destination.subsystem_name,
                serde_json::to_string(record)?
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let bridge = match init_tracing(Arc::new(StdoutTransport)) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("failed to initialize tracing: {e}");
            return;
        }
    };

    info!("service started");

    let span = tracing::info_span!("request", ThreadId = "worker-3", path = "/login");
    let _guard = span.enter();
    warn!(Category = "auth", ClassName = "SessionStore", user = "a", "password expired");
    drop(_guard);

    bridge.shutdown().await;
}
