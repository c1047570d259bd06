//! Structured handler that normalizes events for the ingestion backend.
//!
//! [`IngestHandler`] merges an event's attributes with the defaults it
//! inherited from its parents, pulls the well-known `Category`,
//! `ClassName` and `ThreadId` keys out into dedicated fields, maps the
//! level to a backend severity and hands the result to a shared [`Sink`].

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::attr::{merge_attrs_at, Attr, Data};
use crate::handler::{Entry, Handler, HandlerError};
use crate::severity::{to_severity, Level};
use crate::sink::{LogMessage, RecordLabels, Sink, Source};

/// Attribute key routed into [`RecordLabels::category`].
pub const CATEGORY_KEY: &str = "Category";
/// Attribute key routed into [`RecordLabels::class_name`].
pub const CLASS_NAME_KEY: &str = "ClassName";
/// Attribute key routed into [`RecordLabels::thread_id`].
pub const THREAD_ID_KEY: &str = "ThreadId";

/// How [`IngestHandler::enabled`] decides whether a level is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPolicy {
    /// Ask the downstream handler.
    Delegate,
    /// Handle every level at or above the given one.
    Minimum(Level),
}

impl Default for LevelPolicy {
    fn default() -> Self {
        LevelPolicy::Minimum(Level::INFO)
    }
}

/// Error returned when an [`IngestHandler`] is built from an inconsistent
/// configuration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("level policy delegates to a downstream handler but none is configured")]
    DelegateWithoutDownstream,
}

/// Builder for a root [`IngestHandler`].
pub struct IngestHandlerBuilder {
    sink: Arc<dyn Sink>,
    add_source: bool,
    policy: LevelPolicy,
    next: Option<Arc<dyn Handler>>,
    attrs: Vec<Attr>,
}

impl IngestHandlerBuilder {
    /// Record the calling function, file and line of each event.
    pub fn add_source(mut self, add_source: bool) -> Self {
        self.add_source = add_source;
        self
    }

    pub fn level_policy(mut self, policy: LevelPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for `level_policy(LevelPolicy::Minimum(level))`.
    pub fn min_level(self, level: Level) -> Self {
        self.level_policy(LevelPolicy::Minimum(level))
    }

    /// Forward every handled event to `next` after it reached the sink.
    pub fn next(mut self, next: Arc<dyn Handler>) -> Self {
        self.next = Some(next);
        self
    }

    /// Default attributes of the root handler.
    pub fn attributes(mut self, attrs: Vec<Attr>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn build(self) -> Result<IngestHandler, BuildError> {
        if self.policy == LevelPolicy::Delegate && self.next.is_none() {
            return Err(BuildError::DelegateWithoutDownstream);
        }
        let mut default_data = Data::new();
        merge_attrs_at(&mut default_data, &[], &self.attrs);
        Ok(IngestHandler {
            sink: self.sink,
            add_source: self.add_source,
            policy: self.policy,
            next: self.next,
            default_data: Arc::new(default_data),
            groups: Arc::new(Vec::new()),
        })
    }
}

/// [`Handler`] that forwards normalized events to a [`Sink`].
///
/// Cloning is cheap: the sink, the default data and the group path are
/// shared. Derived handlers copy the default data before merging into it,
/// so a parent never observes its children's attributes.
#[derive(Clone)]
pub struct IngestHandler {
    sink: Arc<dyn Sink>,
    add_source: bool,
    policy: LevelPolicy,
    next: Option<Arc<dyn Handler>>,
    default_data: Arc<Data>,
    groups: Arc<Vec<String>>,
}

impl IngestHandler {
    pub fn builder(sink: Arc<dyn Sink>) -> IngestHandlerBuilder {
        IngestHandlerBuilder {
            sink,
            add_source: false,
            policy: LevelPolicy::default(),
            next: None,
            attrs: Vec::new(),
        }
    }

    /// Default attributes every event handled here starts from.
    pub fn default_data(&self) -> &Data {
        &self.default_data
    }

    /// Stop the shared sink. Affects every handler derived from the same
    /// root; further events must not be logged afterwards.
    pub fn stop(&self) {
        self.sink.stop();
    }

    fn derive_with_attributes(&self, attrs: Vec<Attr>) -> IngestHandler {
        let mut data: Data = self.default_data.as_ref().clone();
        merge_attrs_at(&mut data, &self.groups, &attrs);
        IngestHandler {
            next: self.next.as_ref().map(|next| next.with_attributes(attrs)),
            default_data: Arc::new(data),
            ..self.clone()
        }
    }

    fn derive_with_group(&self, name: &str) -> IngestHandler {
        if name.is_empty() {
            return self.clone();
        }
        let mut groups: Vec<String> = self.groups.as_ref().clone();
        groups.push(name.to_string());
        IngestHandler {
            next: self.next.as_ref().map(|next| next.with_group(name)),
            groups: Arc::new(groups),
            ..self.clone()
        }
    }

    fn source_for(&self, entry: &Entry) -> Source {
        match (&entry.caller, self.add_source) {
            (Some(caller), true) => Source {
                function: caller.function.clone(),
                file: caller.file.clone(),
                line: caller.line,
            },
            _ => Source::default(),
        }
    }
}

/// Remove the well-known keys from `data` and return them as labels.
fn extract_labels(data: &mut Data, method_name: String) -> RecordLabels {
    RecordLabels {
        category: take_label(data, CATEGORY_KEY),
        class_name: take_label(data, CLASS_NAME_KEY),
        method_name,
        thread_id: take_label(data, THREAD_ID_KEY),
    }
}

fn take_label(data: &mut Data, key: &str) -> String {
    match data.remove(key) {
        Some(JsonValue::String(s)) => s,
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl Handler for IngestHandler {
    fn enabled(&self, level: Level) -> bool {
        match (self.policy, &self.next) {
            (LevelPolicy::Minimum(min), _) => level >= min,
            (LevelPolicy::Delegate, Some(next)) => next.enabled(level),
            (LevelPolicy::Delegate, None) => level >= Level::INFO,
        }
    }

    fn handle(&self, entry: &Entry) -> Result<(), HandlerError> {
        let source = self.source_for(entry);

        let mut data: Data = self.default_data.as_ref().clone();
        merge_attrs_at(&mut data, &self.groups, &entry.attrs);

        let method_name = entry
            .caller
            .as_ref()
            .map(|caller| caller.function.clone())
            .unwrap_or_default();
        let labels = extract_labels(&mut data, method_name);
        let message = LogMessage {
            message: entry.message.clone(),
            data,
            source,
        };
        self.sink.log(to_severity(entry.level), message, labels);

        match &self.next {
            Some(next) => next.handle(entry),
            None => Ok(()),
        }
    }

    fn with_attributes(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(self.derive_with_attributes(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(self.derive_with_group(name))
    }
}
