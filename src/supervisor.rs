//! Lifecycle state machine and restart enforcement.
//!
//! The supervisor owns the handle to the managed daemon, consumes its
//! lifecycle signals one at a time, and republishes every transition as a
//! status, a log line, and a metric update. `Down` and `Stopped` are the
//! only signals that drive recovery: `Down` stops the unresponsive process,
//! and the `Stopped` confirmation of the exit is what starts it again.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{ChainwardConfig, ConfigError};
use crate::lifecycle::{LifecycleSignal, Status};
use crate::metrics::{self, Gauge, GaugeValue, MetricsSink};
use crate::node::DaemonHandle;
use crate::restart::RestartPolicy;

/// Capacity of the lifecycle signal channel.
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Handle to the managed node process.
///
/// Both operations are fire-and-forget: outcomes surface only as later
/// lifecycle signals, never as return values.
#[async_trait]
pub trait NodeHandle: Send {
    /// Ask the node to start.
    async fn start(&mut self);

    /// Ask the node to stop.
    async fn stop(&mut self);
}

/// Translates lifecycle signals into status, metrics, and restarts.
pub struct Supervisor<N: NodeHandle> {
    node: N,
    signals: mpsc::Receiver<LifecycleSignal>,
    metrics: Box<dyn MetricsSink>,
    restart_policy: RestartPolicy,
    status: Status,
}

impl Supervisor<DaemonHandle> {
    /// Build a supervisor over the configured daemon process.
    ///
    /// Validates the configuration, detects the metrics capability, and
    /// wires the signal channel. The daemon is not started; that happens in
    /// [`Supervisor::run`], after the subscription already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn initialize(config: &ChainwardConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let sink = metrics::detect_sink(&config.metrics);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let node = crate::node::spawn_daemon(config, signal_tx);

        info!(binary = %config.daemon.binary.display(), "supervisor initialized");

        Ok(Self::new(
            node,
            signal_rx,
            sink,
            RestartPolicy::from_config(&config.restart),
        ))
    }
}

impl<N: NodeHandle> Supervisor<N> {
    /// Assemble a supervisor from its parts. The signal channel must be the
    /// one the node handle reports into.
    pub fn new(
        node: N,
        signals: mpsc::Receiver<LifecycleSignal>,
        metrics: Box<dyn MetricsSink>,
        restart_policy: RestartPolicy,
    ) -> Self {
        Self {
            node,
            signals,
            metrics,
            restart_policy,
            status: Status::Stopped,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Start the node and handle its signals until process exit.
    ///
    /// Does not return under normal operation; the supervisor process is
    /// terminated externally. Returns only if every signal sender is gone,
    /// which means the node actor itself has died.
    pub async fn run(&mut self) {
        self.node.start().await;

        while let Some(signal) = self.signals.recv().await {
            self.handle_signal(signal).await;
        }

        error!("signal channel closed, supervision ended");
    }

    /// Apply one lifecycle signal to completion.
    ///
    /// Every transition except `Ready` clears the whole gauge set before
    /// setting its own values. `Ready` is additive: it arrives on every
    /// healthy poll of a synchronized daemon and compounds block data onto
    /// the current cycle without blanking it.
    pub async fn handle_signal(&mut self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Starting { args } => {
                info!(args = %args, "daemon has started");
                self.status = Status::Starting;
                self.metrics.reset_all();
                self.set_status_gauge();
                self.publish().await;
            }
            LifecycleSignal::Started => {
                info!("daemon is attempting to synchronize with the network");
                self.status = Status::Started;
                self.metrics.reset_all();
                self.set_status_gauge();
                self.publish().await;
            }
            LifecycleSignal::SyncProgress {
                height,
                network_height,
                percent,
            } => {
                info!(height, network_height, percent, "daemon is synchronizing");
                self.status = Status::Synchronizing;
                self.metrics.reset_all();
                self.set_status_gauge();
                self.metrics.set(
                    Gauge::Progress,
                    GaugeValue::Text(format!("{height}/{network_height} ({percent}%)")),
                );
                self.publish().await;
            }
            LifecycleSignal::Synced => {
                info!("daemon is synchronized with the network");
                self.status = Status::Synchronized;
                self.metrics.reset_all();
                self.set_status_gauge();
                self.publish().await;
            }
            LifecycleSignal::Ready {
                height,
                difficulty,
                hashrate,
            } => {
                info!(height, difficulty, hashrate, "daemon is waiting for connections");
                self.status = Status::WaitingForConnections;
                self.metrics
                    .set(Gauge::Status, GaugeValue::text("waiting for connections"));
                self.metrics.set(Gauge::Blockheight, GaugeValue::Count(height));
                self.metrics.set(Gauge::NetHash, GaugeValue::Rate(hashrate));
                self.metrics.set(Gauge::Difficulty, GaugeValue::Count(difficulty));
                self.publish().await;
            }
            LifecycleSignal::Desynced {
                daemon_height,
                network_height,
                deviance,
            } => {
                warn!(
                    deviance,
                    network_height, daemon_height, "daemon is off the blockchain"
                );
                self.status = Status::Desynchronized;
                self.metrics.reset_all();
                self.set_status_gauge();
                self.metrics.set(
                    Gauge::Progress,
                    GaugeValue::Text(format!("{daemon_height}/{network_height}")),
                );
                self.publish().await;
            }
            LifecycleSignal::Down => {
                warn!("daemon is not responding, stopping process");
                self.status = Status::Down;
                self.metrics.reset_all();
                self.set_status_gauge();
                self.publish().await;
                self.node.stop().await;
            }
            LifecycleSignal::Stopped { code } => {
                self.status = Status::Stopped;
                self.metrics.reset_all();
                self.metrics.set(
                    Gauge::Status,
                    GaugeValue::Text(format!("stopped (code: {code})")),
                );
                self.publish().await;
                if self.restart_policy.permit(chrono::Utc::now()) {
                    info!(code, "daemon has closed, restarting process");
                    self.node.start().await;
                } else {
                    error!(code, "daemon has closed, restart limit reached");
                }
            }
            LifecycleSignal::Info { message } => {
                info!(message = %message, "daemon info");
            }
            LifecycleSignal::Fault { error } => {
                error!(error = %error, "daemon error");
            }
        }
    }

    fn set_status_gauge(&mut self) {
        self.metrics
            .set(Gauge::Status, GaugeValue::text(self.status.as_str()));
    }

    async fn publish(&mut self) {
        if let Err(e) = self.metrics.flush().await {
            warn!(error = %e, "failed to publish metrics");
        }
    }
}
