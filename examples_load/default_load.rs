use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::error;

use tracing_ingest_bridge::init::init_tracing;
use tracing_ingest_bridge::noop_sink::NoopTransport;

#[tokio::main]
async fn main() {
    let bridge = match init_tracing(Arc::new(NoopTransport)) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("failed to initialize tracing: {e}");
            return;
        }
    };

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: logged {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let sink = Arc::clone(&bridge.sink);
    bridge.shutdown().await;
    println!("delivered {} records", sink.sent_records.load(Ordering::Relaxed));
}
