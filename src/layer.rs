use crate::attr::{Attr, Value};
use crate::handler::{Caller, Entry, Handler};
use crate::severity::Level;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{span, Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target prefix of this crate's own diagnostics.
const SELF_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that turns events into [`Entry`] values and
/// passes them to a [`Handler`].
///
/// Fields of the spans enclosing an event are added before the event's own
/// fields, outermost span first, so the event wins on conflicting keys.
/// With [`IngestLayer::with_group_spans`] each span's fields are nested
/// under the span's name instead.
///
/// Events emitted by this crate itself are ignored, so the flush task's
/// diagnostics can never feed back into the pipeline.
pub struct IngestLayer {
    handler: Arc<dyn Handler>,
    group_spans: bool,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events passed to the handler.
    pub handled_events: Arc<AtomicU64>,
    /// Events whose handler returned an error.
    pub failed_events: Arc<AtomicU64>,
}

impl IngestLayer {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            group_spans: false,
            total_events: Arc::new(AtomicU64::new(0)),
            handled_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Nest each span's fields under the span's name.
    pub fn with_group_spans(mut self, group_spans: bool) -> Self {
        self.group_spans = group_spans;
        self
    }
}

/// Fields recorded on a span, kept in its extensions.
struct SpanAttrs(Vec<Attr>);

fn is_own_target(target: &str) -> bool {
    target == SELF_TARGET
        || target
            .strip_prefix(SELF_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S> Layer<S> for IngestLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Vec::new();
        attrs.record(&mut AttrVisitor {
            attrs: &mut fields,
            message: None,
        });
        span.extensions_mut().insert(SpanAttrs(fields));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanAttrs(fields)) = extensions.get_mut::<SpanAttrs>() {
            values.record(&mut AttrVisitor {
                attrs: fields,
                message: None,
            });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }
        let level = Level::from(*meta.level());
        if !self.handler.enabled(level) {
            return;
        }

        let mut attrs = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let extensions = span.extensions();
                let Some(SpanAttrs(fields)) = extensions.get::<SpanAttrs>() else {
                    continue;
                };
                if self.group_spans {
                    attrs.push(Attr::group(span.name(), fields.clone()));
                } else {
                    attrs.extend(fields.iter().cloned());
                }
            }
        }

        let mut message = String::new();
        event.record(&mut AttrVisitor {
            attrs: &mut attrs,
            message: Some(&mut message),
        });

        let entry = Entry {
            level,
            message,
            attrs,
            caller: Some(Caller::new(
                meta.module_path().unwrap_or_else(|| meta.target()),
                meta.file().unwrap_or_default(),
                meta.line().unwrap_or_default(),
            )),
        };

        self.handled_events.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.handler.handle(&entry) {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            // Cannot report through `tracing`: this layer is part of the
            // subscriber that would receive it.
            eprintln!("log handler failed: {e}");
        }
    }
}

/// Collects `tracing` fields as [`Attr`]s; the `message` field goes to
/// `message` when one is given.
struct AttrVisitor<'a> {
    attrs: &'a mut Vec<Attr>,
    message: Option<&'a mut String>,
}

impl AttrVisitor<'_> {
    fn push(&mut self, field: &Field, value: Value) {
        let name = field.name();
        // Metadata injected by `tracing-log` duplicates the event's own.
        if name.starts_with("log.") {
            return;
        }
        self.attrs.push(Attr::new(name, value));
    }

    fn take_message(&mut self, field: &Field, text: impl FnOnce() -> String) -> bool {
        match &mut self.message {
            Some(message) if field.name() == "message" => {
                **message = text();
                true
            }
            _ => false,
        }
    }
}

impl Visit for AttrVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if !self.take_message(field, || value.to_string()) {
            self.push(field, Value::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.take_message(field, || format!("{:?}", value)) {
            self.push(field, Value::Str(format!("{:?}", value)));
        }
    }
}
