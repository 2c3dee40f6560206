//! SinkHandle - a sink running behind its own bounded queue
//!
//! The dispatcher only ever calls `offer`, which never waits. A slow or
//! failing sink loses envelopes to its own queue and nothing else.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use contracts::{DataSink, Envelope};

use crate::metrics::{Delivery, MetricsSnapshot, SinkMetrics};

pub struct SinkHandle {
    name: String,
    queue: mpsc::Sender<Envelope>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start a worker task owning `sink`
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            rx,
            metrics: Arc::clone(&metrics),
        };

        Self {
            name,
            queue,
            metrics,
            worker: tokio::spawn(worker.run()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand an envelope to the sink queue
    ///
    /// Returns false when the envelope was not queued.
    pub fn offer(&self, envelope: Envelope) -> bool {
        match self.queue.try_send(envelope) {
            Ok(()) => {
                self.metrics
                    .set_backlog(self.queue.max_capacity() - self.queue.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                self.metrics.record(Delivery::Dropped);
                warn!(
                    sink = %self.name,
                    topic = %envelope.topic,
                    seq = envelope.seq,
                    "Sink queue full, envelope dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker is gone");
                false
            }
        }
    }

    /// Close the queue, let the worker write what is left, and report totals
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        let Self {
            name,
            queue,
            metrics,
            worker,
        } = self;

        drop(queue);
        if let Err(e) = worker.await {
            error!(sink = %name, error = ?e, "Sink worker panicked");
        }
        metrics.snapshot()
    }
}

struct SinkWorker<S> {
    sink: S,
    rx: mpsc::Receiver<Envelope>,
    metrics: Arc<SinkMetrics>,
}

impl<S: DataSink> SinkWorker<S> {
    async fn run(mut self) {
        let name = self.sink.name().to_string();
        debug!(sink = %name, "Sink worker started");

        while let Some(envelope) = self.rx.recv().await {
            self.metrics.set_backlog(self.rx.len());
            self.deliver(&name, &envelope).await;
        }

        self.finish(&name).await;
        debug!(sink = %name, "Sink worker stopped");
    }

    async fn deliver(&mut self, name: &str, envelope: &Envelope) {
        match self.sink.write(envelope).await {
            Ok(()) => {
                self.metrics.record(Delivery::Written);
                trace!(sink = %name, topic = %envelope.topic, seq = envelope.seq, "Written");
            }
            Err(e) => {
                self.metrics.record(Delivery::Failed);
                error!(
                    sink = %name,
                    topic = %envelope.topic,
                    seq = envelope.seq,
                    error = %e,
                    "Sink write failed"
                );
            }
        }
    }

    async fn finish(&mut self, name: &str) {
        if let Err(e) = self.sink.flush().await {
            error!(sink = %name, error = %e, "Flush failed during shutdown");
        }
        if let Err(e) = self.sink.close().await {
            error!(sink = %name, error = %e, "Close failed during shutdown");
        }
    }
}
