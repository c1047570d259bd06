use crate::record::LogRecord;
use crate::sink::{Destination, LogMessage, RecordLabels, Sink, Transport};
use async_trait::async_trait;
use std::error::Error;

/// A transport that accepts and discards every batch.
///
/// Useful for measuring the overhead of the buffering pipeline without
/// any external I/O, and for tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn send(
        &self,
        _destination: &Destination,
        _records: &[LogRecord],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// A sink that drops every message without building a record.
#[derive(Clone, Default)]
pub struct NoopSink;

impl Sink for NoopSink {
    fn log(&self, _severity: u32, _message: LogMessage, _labels: RecordLabels) {}

    fn stop(&self) {}
}
