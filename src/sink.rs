use crate::attr::Data;
use crate::record::LogRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::error::Error;

/// Code location attached to a [`LogMessage`] when source capture is on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Source {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl Source {
    pub fn is_empty(&self) -> bool {
        self.function.is_empty() && self.file.is_empty() && self.line == 0
    }
}

/// Structured body of a log line; serialized into [`LogRecord`]'s `text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Data::is_empty")]
    pub data: Data,
    #[serde(skip_serializing_if = "Source::is_empty")]
    pub source: Source,
}

/// Well-known fields routed out of the free-form data into dedicated
/// wire fields. Each defaults to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordLabels {
    pub category: String,
    pub class_name: String,
    pub method_name: String,
    pub thread_id: String,
}

/// Credentials and target identifiers of one backend log stream.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Destination {
    pub private_key: String,
    pub application_name: String,
    pub subsystem_name: String,
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("private_key", &"<redacted>")
            .field("application_name", &self.application_name)
            .field("subsystem_name", &self.subsystem_name)
            .finish()
    }
}

/// Receiver of finished log messages.
///
/// A single sink is shared by a root handler and everything derived from
/// it, so implementations must accept concurrent calls.
pub trait Sink: Send + Sync {
    /// Accept one finished message.
    ///
    /// **Parameters**
    /// - `severity`: backend severity ordinal.
    /// - `message`: message text, free-form data and optional source.
    /// - `labels`: well-known fields extracted from the attributes.
    fn log(&self, severity: u32, message: LogMessage, labels: RecordLabels);

    /// Release the sink's resources. Calling it more than once is a no-op.
    fn stop(&self);
}

/// Asynchronous delivery of record batches to a concrete backend.
///
/// Implementations own the wire protocol, authentication and HTTP client.
/// The buffered sink calls `send` from its background flush task and
/// never from application threads.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one batch of records.
    ///
    /// **Parameters**
    /// - `destination`: credentials and stream identifiers for the batch.
    /// - `records`: records in append order.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the batch.
    /// - `Err(..)` on any failure. The flush task treats this as transient
    ///   and retries the same batch with backoff.
    async fn send(
        &self,
        destination: &Destination,
        records: &[LogRecord],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush anything the transport buffers on its own side.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_data_and_source_are_omitted() {
        let message = LogMessage {
            message: "start".to_string(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&message).unwrap(), json!({"message": "start"}));
    }

    #[test]
    fn full_message_serializes_every_part() {
        let mut data = Data::new();
        data.insert("user".to_string(), json!("a"));
        let message = LogMessage {
            message: "login".to_string(),
            data,
            source: Source {
                function: "app::auth".to_string(),
                file: "src/auth.rs".to_string(),
                line: 12,
            },
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "message": "login",
                "data": {"user": "a"},
                "source": {"function": "app::auth", "file": "src/auth.rs", "line": 12}
            })
        );
    }

    #[test]
    fn destination_debug_hides_key() {
        let destination = Destination {
            private_key: "secret".to_string(),
            application_name: "app".to_string(),
            subsystem_name: "api".to_string(),
        };
        let rendered = format!("{destination:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("api"));
    }
}
