use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_ingest_bridge::init::{init_tracing_with_config, BridgeConfig};
use tracing_ingest_bridge::noop_sink::NoopTransport;
use tracing_ingest_bridge::sink::Destination;

#[tokio::main]
async fn main() {
    let config = BridgeConfig {
        batch_max_bytes: 512 * 1024,
        flush_interval: Duration::from_millis(200),
        enable_stdout: false,
        add_source: false,
        ..Default::default()
    };

    let bridge = match init_tracing_with_config(Destination::from_env(), Arc::new(NoopTransport), config) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("failed to initialize tracing: {e}");
            return;
        }
    };

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, Category = "load", "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: logged {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let sink = Arc::clone(&bridge.sink);
    bridge.shutdown().await;
    println!(
        "delivered {} records, dropped {}",
        sink.sent_records.load(Ordering::Relaxed),
        sink.dropped_records.load(Ordering::Relaxed)
    );
}
