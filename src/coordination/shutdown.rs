//! Graceful shutdown coordination.
//!
//! Sequences teardown: stop taking new work, drain in-flight order attempts
//! against a deadline, then close the event streams. Interested components
//! observe progress through a phase channel instead of being polled.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

/// Teardown steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    StoppingIntake,
    DrainingWorkers,
    ClosingStreams,
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::StoppingIntake => write!(f, "stopping_intake"),
            ShutdownPhase::DrainingWorkers => write!(f, "draining_workers"),
            ShutdownPhase::ClosingStreams => write!(f, "closing_streams"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

type Step = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Coordinates one shutdown pass across the service.
pub struct GracefulShutdown {
    requested: AtomicBool,
    trigger: watch::Sender<bool>,
    phase: watch::Sender<ShutdownPhase>,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(drain_timeout: Duration) -> Self {
        let (trigger, _) = watch::channel(false);
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            requested: AtomicBool::new(false),
            trigger,
            phase,
            drain_timeout,
        }
    }

    /// Receiver that flips to `true` once shutdown is requested.
    pub fn trigger_receiver(&self) -> watch::Receiver<bool> {
        self.trigger.subscribe()
    }

    pub fn phase_receiver(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase.subscribe().borrow()
    }

    /// Request shutdown. Repeated requests are ignored.
    pub fn request(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already in progress; ignoring repeated signal");
            return;
        }
        info!("Shutdown requested");
        let _ = self.trigger.send(true);
    }

    /// Block until a shutdown request arrives, from a signal or a call to
    /// [`request`](Self::request).
    pub async fn wait_for_trigger(&self) {
        let mut rx = self.trigger.subscribe();
        // Err means the sender half is gone, which also ends the wait.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        let _ = self.phase.send(phase);
        info!(phase = %phase, "Shutdown phase");
    }

    /// Run the teardown sequence.
    ///
    /// `stop_intake` must make new work impossible. `drain_workers` resolves
    /// once in-flight attempts have finished; the worker pool applies its own
    /// abandon deadline inside, so the outer timeout here only guards against
    /// a wedged drain. `close_streams` tears down event delivery last so
    /// subscribers see the final transitions of drained orders.
    pub async fn execute<F1, F2, F3>(&self, stop_intake: F1, drain_workers: F2, close_streams: F3)
    where
        F1: FnOnce() -> Step,
        F2: FnOnce() -> Step,
        F3: FnOnce() -> Step,
    {
        let started = std::time::Instant::now();

        self.set_phase(ShutdownPhase::StoppingIntake);
        stop_intake().await;

        self.set_phase(ShutdownPhase::DrainingWorkers);
        let grace = self.drain_timeout + Duration::from_secs(5);
        if tokio::time::timeout(grace, drain_workers()).await.is_err() {
            warn!(
                timeout_secs = grace.as_secs(),
                "Worker drain did not finish in time"
            );
        }

        self.set_phase(ShutdownPhase::ClosingStreams);
        close_streams().await;

        self.set_phase(ShutdownPhase::Complete);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Shutdown complete"
        );
    }
}

/// Forward SIGINT and SIGTERM to a shutdown request. First signal wins.
pub fn listen_for_signals(shutdown: Arc<GracefulShutdown>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let terminate = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        error!(error = %e, "Could not install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            std::future::pending::<()>().await;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
            _ = terminate => info!("Received SIGTERM"),
        }
        shutdown.request();
    })
}
