//! Dispatcher - fans bus traffic out to sinks

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{Envelope, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{FileSink, LogSink, NetworkSink};

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builds every configured sink, then the dispatcher over them
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    tap: broadcast::Receiver<Envelope>,
}

impl DispatcherBuilder {
    /// `tap` is usually `MessageBus::tap()`
    pub fn new(config: DispatcherConfig, tap: broadcast::Receiver<Envelope>) -> Self {
        Self { config, tap }
    }

    #[instrument(name = "dispatcher_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            handles.push(start_sink(sink_config).await?);
        }
        Ok(Dispatcher::with_handles(handles, self.tap))
    }
}

#[instrument(
    name = "dispatcher_start_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn start_sink(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let capacity = config.queue_capacity;

    let handle = match config.sink_type {
        SinkType::Log => {
            SinkHandle::spawn(LogSink::from_params(&config.name, &config.params), capacity)
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::spawn(sink, capacity)
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::spawn(sink, capacity)
        }
    };
    debug!(sink = %config.name, capacity, "Sink started");
    Ok(handle)
}

/// Totals reported when the dispatcher stops
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    /// Envelopes taken off the tap
    pub envelopes: u64,
    /// Envelopes the tap skipped because the dispatcher fell behind
    pub lagged: u64,
    /// Per-sink totals, taken after every sink was drained
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// Consumes the bus tap and offers every envelope to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    tap: broadcast::Receiver<Envelope>,
}

impl Dispatcher {
    pub fn with_handles(handles: Vec<SinkHandle>, tap: broadcast::Receiver<Envelope>) -> Self {
        Self { handles, tap }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Live counters, still readable once the dispatcher has been spawned
    pub fn sink_metrics(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Run until the bus closes
    pub async fn run(self) -> DispatchSummary {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until the bus closes or `stop` resolves
    ///
    /// On stop, whatever is already buffered in the tap is still dispatched
    /// before the sinks are drained and closed.
    #[instrument(name = "dispatcher_run", skip_all)]
    pub async fn run_until<F>(mut self, stop: F) -> DispatchSummary
    where
        F: Future<Output = ()> + Send,
    {
        info!(sinks = self.handles.len(), "Dispatcher started");
        tokio::pin!(stop);

        let mut summary = DispatchSummary::default();
        loop {
            tokio::select! {
                received = self.tap.recv() => match received {
                    Ok(envelope) => self.dispatch(envelope, &mut summary),
                    Err(RecvError::Lagged(skipped)) => {
                        summary.lagged += skipped;
                        warn!(skipped, "Dispatcher lagged behind the bus");
                    }
                    Err(RecvError::Closed) => {
                        info!("Bus closed");
                        break;
                    }
                },
                _ = &mut stop => {
                    self.drain_tap(&mut summary);
                    info!("Dispatcher stop requested");
                    break;
                }
            }
        }

        for handle in self.handles {
            let name = handle.name().to_string();
            summary.sinks.push((name, handle.shutdown().await));
        }
        info!(
            envelopes = summary.envelopes,
            lagged = summary.lagged,
            "Dispatcher shutdown complete"
        );
        summary
    }

    pub fn spawn(self) -> JoinHandle<DispatchSummary> {
        tokio::spawn(self.run())
    }

    pub fn spawn_until<F>(self, stop: F) -> JoinHandle<DispatchSummary>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run_until(stop))
    }

    fn drain_tap(&mut self, summary: &mut DispatchSummary) {
        loop {
            match self.tap.try_recv() {
                Ok(envelope) => self.dispatch(envelope, summary),
                Err(TryRecvError::Lagged(skipped)) => summary.lagged += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    fn dispatch(&self, envelope: Envelope, summary: &mut DispatchSummary) {
        summary.envelopes += 1;
        if summary.envelopes.is_multiple_of(100) {
            debug!(envelopes = summary.envelopes, "Dispatcher progress");
        }

        if let Some((last, rest)) = self.handles.split_last() {
            for handle in rest {
                handle.offer(envelope.clone());
            }
            last.offer(envelope);
        }
    }
}

/// Create a dispatcher from sink configs
pub async fn create_dispatcher(
    sinks: Vec<SinkConfig>,
    tap: broadcast::Receiver<Envelope>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(DispatcherConfig { sinks }, tap)
        .build()
        .await
}
