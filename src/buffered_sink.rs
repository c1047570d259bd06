use crate::buffer::LogBuffer;
use crate::record::LogRecord;
use crate::sink::{Destination, LogMessage, RecordLabels, Sink, Transport};
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, warn};

/// Batching behaviour of a [`BufferedSink`].
///
/// **Fields**
/// - `batch_max_bytes`: upper bound on the encoded size of one batch; the
///   flush task is also woken early once this many bytes are buffered.
/// - `flush_interval`: maximum time a record waits before a flush.
/// - `max_retries`: attempts per batch before it is dropped.
#[derive(Clone, Debug)]
pub struct FlushConfig {
    pub batch_max_bytes: u64,
    pub flush_interval: Duration,
    pub max_retries: u32,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            batch_max_bytes: 2 * 1024 * 1024,
            flush_interval: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}

/// [`Sink`] that turns messages into [`LogRecord`]s, stages them in a
/// [`LogBuffer`] and ships them through a [`Transport`] from a background
/// Tokio task.
///
/// Application threads only pay for encoding and one buffer append;
/// network I/O happens on the flush task.
pub struct BufferedSink {
    destination: Destination,
    buffer: LogBuffer,
    batch_max_bytes: u64,
    max_retries: u32,
    stopped: AtomicBool,
    wake: Notify,
    shutdown: Notify,
    /// Records offered through [`Sink::log`], accepted or not.
    pub logged_records: AtomicU64,
    /// Records refused after stop or dropped after exhausting retries.
    pub dropped_records: AtomicU64,
    /// Records the transport accepted.
    pub sent_records: AtomicU64,
}

impl BufferedSink {
    /// Create a sink and spawn its flush task on the current Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `batch_max_bytes`,
    /// `flush_interval` and `max_retries` to avoid degenerate configs.
    ///
    /// **Returns**
    /// - the shared sink, ready to hand to an
    ///   [`IngestHandler`](crate::adapter::IngestHandler);
    /// - the flush task's handle, which completes after [`Sink::stop`].
    pub fn spawn(
        destination: Destination,
        transport: Arc<dyn Transport>,
        config: FlushConfig,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let batch_max_bytes = config.batch_max_bytes.max(1);
        let max_retries = config.max_retries.max(1);
        let flush_interval = if config.flush_interval < Duration::from_millis(10) {
            Duration::from_millis(10)
        } else {
            config.flush_interval
        };

        let sink = Arc::new(BufferedSink {
            destination,
            buffer: LogBuffer::new(),
            batch_max_bytes,
            max_retries,
            stopped: AtomicBool::new(false),
            wake: Notify::new(),
            shutdown: Notify::new(),
            logged_records: AtomicU64::new(0),
            dropped_records: AtomicU64::new(0),
            sent_records: AtomicU64::new(0),
        });

        let handle = tokio::spawn(run_flush_loop(Arc::clone(&sink), transport, flush_interval));
        (sink, handle)
    }

    /// Records currently waiting for delivery.
    pub fn buffered_records(&self) -> usize {
        self.buffer.len()
    }

    /// Encoded size of the records waiting for delivery.
    pub fn buffered_bytes(&self) -> u64 {
        self.buffer.size()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Send everything currently buffered, batch by batch.
    async fn flush_buffer(&self, transport: &dyn Transport) {
        loop {
            let batch = self.buffer.drain_bytes(self.batch_max_bytes);
            if batch.is_empty() {
                return;
            }
            let count = batch.len() as u64;
            match send_batch(transport, &self.destination, &batch, self.max_retries).await {
                Ok(()) => {
                    self.sent_records.fetch_add(count, Ordering::Relaxed);
                }
                Err(e) => {
                    self.dropped_records.fetch_add(count, Ordering::Relaxed);
                    warn!(records = count, error = %e, "dropping log batch after retries");
                }
            }
        }
    }
}

/// The record is stamped with the time the sink receives the message.
fn encode_record(severity: u32, message: &LogMessage, labels: RecordLabels) -> LogRecord {
    // A message that cannot be encoded still ships its text.
    let text = serde_json::to_string(message).unwrap_or_else(|_| message.message.clone());
    LogRecord::new(text)
        .with_severity(severity)
        .with_category(labels.category)
        .with_class_name(labels.class_name)
        .with_method_name(labels.method_name)
        .with_thread_id(labels.thread_id)
}

impl Sink for BufferedSink {
    fn log(&self, severity: u32, message: LogMessage, labels: RecordLabels) {
        self.logged_records.fetch_add(1, Ordering::Relaxed);

        // The closed check and the push share the buffer lock, so a record
        // is either refused here or seen by the final drain after stop.
        if !self.buffer.append(encode_record(severity, &message, labels)) {
            self.dropped_records.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.buffer.size() >= self.batch_max_bytes {
            self.wake.notify_one();
        }
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.buffer.close();
            self.shutdown.notify_one();
        }
    }
}

async fn run_flush_loop(
    sink: Arc<BufferedSink>,
    transport: Arc<dyn Transport>,
    flush_interval: Duration,
) {
    let mut ticker = interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(destination = ?sink.destination, "log flush task started");

    loop {
        let stopping = tokio::select! {
            _ = ticker.tick() => false,
            _ = sink.wake.notified() => false,
            _ = sink.shutdown.notified() => true,
        };

        sink.flush_buffer(&*transport).await;

        if stopping {
            if let Err(e) = transport.flush().await {
                warn!(error = %e, "transport flush failed during shutdown");
            }
            debug!("log flush task stopped");
            return;
        }
    }
}

async fn send_batch(
    transport: &dyn Transport,
    destination: &Destination,
    batch: &[LogRecord],
    max_retries: u32,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut backoff = Duration::from_millis(100);
    let max_backoff = Duration::from_secs(10);
    let mut attempt = 1;

    loop {
        match transport.send(destination, batch).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= max_retries => return Err(e),
            Err(e) => {
                warn!(attempt, error = %e, "log transport send failed, retrying in {:?}", backoff);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Data;
    use crate::sink::Source;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    /// Transport that keeps batches in memory and fails the first
    /// `failures` sends.
    #[derive(Default)]
    struct MemoryTransport {
        batches: Mutex<Vec<Vec<LogRecord>>>,
        failures: AtomicU32,
        flushes: AtomicU32,
    }

    impl MemoryTransport {
        fn failing(failures: u32) -> Self {
            MemoryTransport {
                failures: AtomicU32::new(failures),
                ..Default::default()
            }
        }

        fn records(&self) -> Vec<LogRecord> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(
            &self,
            _destination: &Destination,
            records: &[LogRecord],
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err("backend unavailable".into());
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }

        async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn message(text: &str) -> LogMessage {
        LogMessage {
            message: text.to_string(),
            ..Default::default()
        }
    }

    fn slow_flush() -> FlushConfig {
        FlushConfig {
            flush_interval: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    #[test]
    fn record_carries_message_and_labels() {
        let mut data = Data::new();
        data.insert("user".to_string(), json!("a"));
        let message = LogMessage {
            message: "login".to_string(),
            data,
            source: Source::default(),
        };
        let labels = RecordLabels {
            category: "auth".to_string(),
            class_name: "Session".to_string(),
            method_name: "app::login".to_string(),
            thread_id: "3".to_string(),
        };

        let record = encode_record(2, &message, labels);

        assert_eq!(record.severity(), 2);
        assert_eq!(record.category(), "auth");
        assert_eq!(record.class_name(), "Session");
        assert_eq!(record.method_name(), "app::login");
        assert_eq!(record.thread_id(), "3");
        let text: serde_json::Value = serde_json::from_str(record.text()).unwrap();
        assert_eq!(text, json!({"message": "login", "data": {"user": "a"}}));
    }

    #[tokio::test]
    async fn stop_flushes_pending_records() {
        let transport = Arc::new(MemoryTransport::default());
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            slow_flush(),
        );

        sink.log(1, message("one"), RecordLabels::default());
        sink.log(2, message("two"), RecordLabels::default());
        assert_eq!(sink.buffered_records(), 2);

        sink.stop();
        handle.await.unwrap();

        let records = transport.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity(), 1);
        assert_eq!(records[1].severity(), 2);
        assert_eq!(sink.buffered_records(), 0);
        assert_eq!(sink.buffered_bytes(), 0);
        assert_eq!(sink.sent_records.load(Ordering::Relaxed), 2);
        assert_eq!(transport.flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_rejects_late_records() {
        let transport = Arc::new(MemoryTransport::default());
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            slow_flush(),
        );

        sink.stop();
        sink.stop();
        handle.await.unwrap();
        sink.stop();

        sink.log(2, message("late"), RecordLabels::default());
        assert!(sink.is_stopped());
        assert_eq!(sink.buffered_records(), 0);
        assert_eq!(sink.logged_records.load(Ordering::Relaxed), 1);
        assert_eq!(sink.dropped_records.load(Ordering::Relaxed), 1);
        assert_eq!(transport.flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn records_logged_during_stop_are_sent_or_dropped() {
        for _ in 0..20 {
            let transport = Arc::new(MemoryTransport::default());
            let (sink, handle) = BufferedSink::spawn(
                Destination::default(),
                Arc::clone(&transport) as Arc<dyn Transport>,
                slow_flush(),
            );

            let writer = {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    let mut i = 0u64;
                    while !sink.is_stopped() || i < 50 {
                        sink.log(2, message(&format!("m{i}")), RecordLabels::default());
                        i += 1;
                    }
                    // A few more after stop, racing the final drain.
                    for _ in 0..50 {
                        sink.log(2, message("late"), RecordLabels::default());
                    }
                })
            };

            sleep(Duration::from_millis(1)).await;
            sink.stop();
            handle.await.unwrap();
            writer.join().unwrap();

            let logged = sink.logged_records.load(Ordering::Relaxed);
            let sent = sink.sent_records.load(Ordering::Relaxed);
            let dropped = sink.dropped_records.load(Ordering::Relaxed);
            assert_eq!(logged, sent + dropped);
            assert_eq!(sent, transport.records().len() as u64);
            assert_eq!(sink.buffered_records(), 0);

            sink.log(2, message("after join"), RecordLabels::default());
            assert_eq!(sink.dropped_records.load(Ordering::Relaxed), dropped + 1);
        }
    }

    #[test]
    fn record_is_stamped_when_the_sink_receives_it() {
        let before = crate::record::now_seconds();
        let record = encode_record(2, &message("now"), RecordLabels::default());
        let after = crate::record::now_seconds();

        assert!(record.timestamp() >= before);
        assert!(record.timestamp() <= after);
    }

    #[tokio::test]
    async fn interval_flush_ships_records() {
        let transport = Arc::new(MemoryTransport::default());
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            FlushConfig {
                flush_interval: Duration::from_millis(20),
                ..Default::default()
            },
        );

        sink.log(2, message("tick"), RecordLabels::default());
        for _ in 0..100 {
            if !transport.records().is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.records().len(), 1);

        sink.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_buffer_wakes_flush_task_early() {
        let transport = Arc::new(MemoryTransport::default());
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            FlushConfig {
                batch_max_bytes: 64,
                ..slow_flush()
            },
        );
        // The interval's first tick fires immediately; let it pass.
        sleep(Duration::from_millis(20)).await;

        sink.log(2, message(&"x".repeat(100)), RecordLabels::default());
        for _ in 0..100 {
            if !transport.records().is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.records().len(), 1);

        sink.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn batches_respect_byte_budget() {
        let transport = Arc::new(MemoryTransport::default());
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            FlushConfig {
                batch_max_bytes: 1,
                ..slow_flush()
            },
        );
        for i in 0..3 {
            sink.log(2, message(&format!("m{i}")), RecordLabels::default());
        }
        sink.stop();
        handle.await.unwrap();

        let batches = transport.batches.lock().unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 1));
    }

    #[tokio::test]
    async fn failed_sends_are_retried() {
        let transport = Arc::new(MemoryTransport::failing(2));
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            FlushConfig {
                max_retries: 3,
                ..slow_flush()
            },
        );

        sink.log(4, message("retry me"), RecordLabels::default());
        sink.stop();
        handle.await.unwrap();

        assert_eq!(transport.records().len(), 1);
        assert_eq!(sink.sent_records.load(Ordering::Relaxed), 1);
        assert_eq!(sink.dropped_records.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn batch_is_dropped_after_max_retries() {
        let transport = Arc::new(MemoryTransport::failing(10));
        let (sink, handle) = BufferedSink::spawn(
            Destination::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            FlushConfig {
                max_retries: 2,
                ..slow_flush()
            },
        );

        sink.log(4, message("lost"), RecordLabels::default());
        sink.stop();
        handle.await.unwrap();

        assert!(transport.records().is_empty());
        assert_eq!(sink.dropped_records.load(Ordering::Relaxed), 1);
        assert_eq!(sink.sent_records.load(Ordering::Relaxed), 0);
    }
}
