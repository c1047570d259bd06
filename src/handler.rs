use std::error::Error;
use std::panic::Location;
use std::sync::Arc;

use crate::attr::Attr;
use crate::severity::Level;

/// Code location that produced an [`Entry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl Caller {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Caller {
            function: function.into(),
            file: file.into(),
            line,
        }
    }
}

/// Capture the current module, file and line as a [`Caller`].
#[macro_export]
macro_rules! caller {
    () => {
        $crate::handler::Caller::new(module_path!(), file!(), line!())
    };
}

/// One structured event on its way through a [`Handler`] chain.
///
/// Entries carry no timestamp; the wire record is stamped when the sink
/// receives the message.
#[derive(Debug, Clone)]
pub struct Entry {
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
    pub caller: Option<Caller>,
}

impl Entry {
    /// Create an entry with no attributes.
    ///
    /// The caller's file and line are recorded; the function is unknown at
    /// this point and left empty. Use [`Entry::with_caller`] together with
    /// the [`caller!`](crate::caller) macro to record a full location.
    #[track_caller]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Entry {
            level,
            message: message.into(),
            attrs: Vec::new(),
            caller: Some(Caller::new("", location.file(), location.line())),
        }
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn without_caller(mut self) -> Self {
        self.caller = None;
        self
    }
}

/// Error returned from [`Handler::handle`].
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    /// A handler further down the chain failed.
    #[error("downstream handler failed: {0}")]
    Downstream(#[source] Box<dyn Error + Send + Sync>),
}

/// Pluggable structured-logging handler.
///
/// Handlers are immutable: deriving one with extra attributes or a group
/// returns a new handler and leaves `self` untouched, so derived handlers
/// can be created concurrently from a shared parent.
pub trait Handler: Send + Sync {
    /// Whether events at `level` should be handled at all.
    fn enabled(&self, level: Level) -> bool;

    /// Process one event.
    fn handle(&self, entry: &Entry) -> Result<(), HandlerError>;

    /// Return a handler that adds `attrs` to every event it handles.
    fn with_attributes(&self, attrs: Vec<Attr>) -> Arc<dyn Handler>;

    /// Return a handler that nests all subsequently added attributes
    /// under `name`.
    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}
