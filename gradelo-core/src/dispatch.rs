//! Background hit dispatch
//!
//! Tracking calls never wait on the network. They push the built request
//! onto an in-memory channel and return; a tokio task owned by the
//! [`Dispatcher`] drains the channel into the [`Transport`] one request at a
//! time. A failed send is logged, handed to the failure handler if one is
//! registered, and dropped. There is no retry and nothing is persisted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::request::TrackingRequest;
use crate::transport::Transport;

/// A hit the transport could not deliver
#[derive(Debug)]
pub struct DeliveryFailure {
    pub request: TrackingRequest,
    pub error: TrackerError,
}

/// Callback receiving delivery failures, invoked on the dispatcher task
pub type FailureHandler = Arc<dyn Fn(&DeliveryFailure) + Send + Sync>;

/// Dispatch statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Requests accepted from tracking calls
    pub enqueued: u64,
    /// Requests the transport reported as sent
    pub delivered: u64,
    /// Requests the transport rejected
    pub failed: u64,
    /// Requests that never reached the transport (worker gone)
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum Command {
    Send(TrackingRequest),
    Flush(oneshot::Sender<()>),
}

/// Owns the delivery task
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
    failure_handler: Arc<RwLock<Option<FailureHandler>>>,
    transport_name: String,
}

impl Dispatcher {
    /// Start the delivery task on the current tokio runtime
    pub fn spawn(transport: Arc<dyn Transport>) -> TrackerResult<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            TrackerError::Runtime(format!("dispatcher needs a tokio runtime: {}", e))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let failure_handler: Arc<RwLock<Option<FailureHandler>>> = Arc::new(RwLock::new(None));
        let transport_name = transport.name().to_string();

        handle.spawn(run_worker(
            rx,
            transport,
            counters.clone(),
            failure_handler.clone(),
        ));

        Ok(Self {
            tx,
            counters,
            failure_handler,
            transport_name,
        })
    }

    /// Queue a request for delivery. Never blocks.
    pub fn dispatch(&self, request: TrackingRequest) {
        self.counters.enqueued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Command::Send(request)).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            warn!(transport = %self.transport_name, "dispatcher stopped; hit dropped");
        }
    }

    /// Wait until every request queued before this call has been handed to
    /// the transport
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Register the failure handler, replacing any previous one
    pub fn set_failure_handler(&self, handler: FailureHandler) {
        *self.failure_handler.write() = Some(handler);
    }

    /// Remove the failure handler
    pub fn clear_failure_handler(&self) {
        *self.failure_handler.write() = None;
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            enqueued: self.counters.enqueued.load(Ordering::SeqCst),
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
        }
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Command>,
    transport: Arc<dyn Transport>,
    counters: Arc<Counters>,
    failure_handler: Arc<RwLock<Option<FailureHandler>>>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Send(request) => {
                let result = transport.send(&request).await;
                match result {
                    Ok(()) => {
                        counters.delivered.fetch_add(1, Ordering::SeqCst);
                        debug!(hit = %request.hit_type(), "hit delivered");
                    }
                    Err(error) => {
                        counters.failed.fetch_add(1, Ordering::SeqCst);
                        warn!(
                            hit = %request.hit_type(),
                            code = error.code(),
                            error = %error,
                            "hit delivery failed"
                        );
                        // Clone the handler out so it runs without the lock held
                        let handler = failure_handler.read().clone();
                        if let Some(handler) = handler {
                            handler(&DeliveryFailure { request, error });
                        }
                    }
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(transport = transport.name(), "dispatcher stopped");
}
