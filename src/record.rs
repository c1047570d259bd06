use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Error returned when a [`LogRecord`] cannot be encoded into its wire form.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One wire-ready log line.
///
/// Records are immutable once built: the buffer recomputes [`LogRecord::size`]
/// when draining, so the encoded form must never change after the record
/// has been appended. Build one with [`LogRecord::new`] and the consuming
/// `with_*` setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    timestamp: f64,
    severity: u32,
    text: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    class_name: String,
    #[serde(default)]
    method_name: String,
    #[serde(default)]
    thread_id: String,
}

impl LogRecord {
    /// Create a record stamped with the current time and severity `0`.
    pub fn new(text: impl Into<String>) -> Self {
        LogRecord {
            timestamp: now_seconds(),
            severity: 0,
            text: text.into(),
            category: String::new(),
            class_name: String::new(),
            method_name: String::new(),
            thread_id: String::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_severity(mut self, severity: u32) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_method_name(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = method_name.into();
        self
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn severity(&self) -> u32 {
        self.severity
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Byte length of the record's canonical JSON encoding.
    ///
    /// **Returns**
    /// - `Ok(len)` with the number of bytes the record occupies on the wire.
    /// - `Err(RecordError::Encode)` if the record could not be serialized.
    ///   Callers that aggregate sizes must handle this case explicitly.
    pub fn size(&self) -> Result<usize, RecordError> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

/// Current wall-clock time as fractional seconds since the epoch.
pub(crate) fn now_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_uses_camel_case_keys() {
        let record = LogRecord::new("hello")
            .with_timestamp(1.5)
            .with_severity(2)
            .with_class_name("Repo")
            .with_method_name("load")
            .with_thread_id("7");

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], 1.5);
        assert_eq!(json["severity"], 2);
        assert_eq!(json["text"], "hello");
        assert_eq!(json["category"], "");
        assert_eq!(json["className"], "Repo");
        assert_eq!(json["methodName"], "load");
        assert_eq!(json["threadId"], "7");
    }

    #[test]
    fn size_matches_encoded_length() {
        let record = LogRecord::new("héllo").with_timestamp(10.25).with_severity(4);
        let encoded = serde_json::to_string(&record).unwrap();
        assert_eq!(record.size().unwrap(), encoded.len());
    }

    #[test]
    fn size_is_stable_across_calls() {
        let record = LogRecord::new("stable").with_category("db");
        assert_eq!(record.size().unwrap(), record.size().unwrap());
    }

    #[test]
    fn labels_default_to_empty_when_decoding() {
        let record: LogRecord =
            serde_json::from_str(r#"{"timestamp":3.0,"severity":1,"text":"x"}"#).unwrap();
        assert_eq!(record.text(), "x");
        assert_eq!(record.category(), "");
        assert_eq!(record.thread_id(), "");
    }

    #[test]
    fn new_record_is_timestamped_now() {
        let before = now_seconds();
        let record = LogRecord::new("t");
        assert!(record.timestamp() >= before);
        assert!(record.timestamp().fract() >= 0.0);
    }
}
