use crate::adapter::{BuildError, IngestHandler};
use crate::buffered_sink::{BufferedSink, FlushConfig};
use crate::handler::Handler;
use crate::layer::IngestLayer;
use crate::severity::Level;
use crate::sink::{Destination, Sink, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging bridge.
///
/// **Fields**
/// - `batch_max_bytes`: upper bound on the encoded size of one batch.
/// - `flush_interval`: maximum interval between flushes even when the
///   batch is not full.
/// - `max_retries`: delivery attempts per batch before it is dropped.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added alongside the [`IngestLayer`] and events are also printed to
///   the console.
/// - `add_source`: record function, file and line of each event.
/// - `min_level`: lowest level shipped to the backend.
/// - `group_spans`: nest span fields under the span name.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub batch_max_bytes: u64,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub enable_stdout: bool,
    pub add_source: bool,
    pub min_level: Level,
    pub group_spans: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let flush = FlushConfig::default();
        Self {
            batch_max_bytes: flush.batch_max_bytes,
            flush_interval: flush.flush_interval,
            max_retries: flush.max_retries,
            enable_stdout: true,
            add_source: true,
            min_level: Level::INFO,
            group_spans: false,
        }
    }
}

impl BridgeConfig {
    fn flush_config(&self) -> FlushConfig {
        FlushConfig {
            batch_max_bytes: self.batch_max_bytes,
            flush_interval: self.flush_interval,
            max_retries: self.max_retries,
        }
    }
}

/// Error returned by the initialization helpers.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to install global subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Root handler of one destination together with its flush task.
pub struct Bridge {
    pub handler: IngestHandler,
    pub sink: Arc<BufferedSink>,
    pub flush_task: JoinHandle<()>,
}

impl Bridge {
    /// Create the buffered sink and the root handler for `destination`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        destination: Destination,
        transport: Arc<dyn Transport>,
        config: &BridgeConfig,
    ) -> Result<Self, BuildError> {
        let (sink, flush_task) = BufferedSink::spawn(destination, transport, config.flush_config());
        let handler = IngestHandler::builder(Arc::clone(&sink) as Arc<dyn Sink>)
            .add_source(config.add_source)
            .min_level(config.min_level)
            .build()?;
        Ok(Bridge {
            handler,
            sink,
            flush_task,
        })
    }

    /// `tracing` layer feeding this bridge's root handler.
    pub fn layer(&self, config: &BridgeConfig) -> IngestLayer {
        IngestLayer::new(Arc::new(self.handler.clone()) as Arc<dyn Handler>)
            .with_group_spans(config.group_spans)
    }

    /// Stop the sink and wait for the final flush to finish.
    pub async fn shutdown(self) {
        self.handler.stop();
        if let Err(e) = self.flush_task.await {
            eprintln!("log flush task failed: {e}");
        }
    }
}

/// Initialize the global `tracing` subscriber for `destination` using the
/// provided transport and [`BridgeConfig`].
///
/// **Effects**
///
/// Installs a [`Registry`] combined with an [`IngestLayer`] (and a `fmt`
/// layer when `enable_stdout` is set) as the global default subscriber,
/// so all `tracing` events in the process reach the backend.
///
/// **Returns**
/// - the [`Bridge`], whose [`Bridge::shutdown`] flushes pending records;
/// - `Err(InitError)` if a global subscriber is already installed.
pub fn init_tracing_with_config(
    destination: Destination,
    transport: Arc<dyn Transport>,
    config: BridgeConfig,
) -> Result<Bridge, InitError> {
    let bridge = Bridge::new(destination, transport, &config)?;
    let layer = bridge.layer(&config);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(bridge)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`BridgeConfig::default`] and a destination read from the environment
/// (see [`Destination::from_env`]).
pub fn init_tracing(transport: Arc<dyn Transport>) -> Result<Bridge, InitError> {
    init_tracing_with_config(Destination::from_env(), transport, BridgeConfig::default())
}
