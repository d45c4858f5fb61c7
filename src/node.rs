//! Process-backed node handle.
//!
//! [`DaemonHandle`] is the supervisor-facing half: fire-and-forget start and
//! stop commands over a channel. The actor behind it exclusively owns the
//! daemon child process, polls its status RPC between commands, and reports
//! every outcome as lifecycle signals. The actor never calls back into the
//! supervisor; the signal channel is the only path upward.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ChainwardConfig, DaemonConfig};
use crate::lifecycle::LifecycleSignal;
use crate::supervisor::NodeHandle;
use crate::watcher::{StatusClient, SyncTracker};

/// Grace period between SIGTERM and SIGKILL during a stop.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Pause after a failed spawn before reporting the exit, so a missing or
/// broken binary cannot spin the restart path hot.
const SPAWN_FAILURE_PAUSE: Duration = Duration::from_secs(1);

/// Commands accepted by the daemon actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonCommand {
    Start,
    Stop,
}

/// Exit notice sent by the per-generation wait task.
#[derive(Debug, Clone, Copy)]
struct ExitReport {
    code: i32,
}

/// Supervisor-facing handle to the daemon actor.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    commands: mpsc::Sender<DaemonCommand>,
}

#[async_trait]
impl NodeHandle for DaemonHandle {
    async fn start(&mut self) {
        if self.commands.send(DaemonCommand::Start).await.is_err() {
            warn!("daemon actor is gone, dropping start command");
        }
    }

    async fn stop(&mut self) {
        if self.commands.send(DaemonCommand::Stop).await.is_err() {
            warn!("daemon actor is gone, dropping stop command");
        }
    }
}

/// Spawn the daemon actor and return the supervisor-facing handle.
///
/// The actor reports into `signals` and lives until every handle clone is
/// dropped. No process is spawned until the first start command.
pub fn spawn_daemon(
    config: &ChainwardConfig,
    signals: mpsc::Sender<LifecycleSignal>,
) -> DaemonHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (exit_tx, exit_rx) = mpsc::channel(4);

    let process = DaemonProcess {
        daemon: config.daemon.clone(),
        commands: command_rx,
        signals,
        client: StatusClient::new(
            &config.daemon.rpc_base_url(),
            Duration::from_secs(config.checks.poll_timeout_secs),
        ),
        tracker: SyncTracker::new(&config.checks),
        poll_interval: Duration::from_secs(config.checks.poll_interval_secs),
        poll: tokio::time::interval(Duration::from_secs(config.checks.poll_interval_secs)),
        exit_tx,
        exit_rx,
        pid: None,
    };
    tokio::spawn(process.run());

    DaemonHandle {
        commands: command_tx,
    }
}

/// Actor that owns the daemon child process for its whole life.
struct DaemonProcess {
    daemon: DaemonConfig,
    commands: mpsc::Receiver<DaemonCommand>,
    signals: mpsc::Sender<LifecycleSignal>,
    client: StatusClient,
    tracker: SyncTracker,
    poll_interval: Duration,
    poll: tokio::time::Interval,
    exit_tx: mpsc::Sender<ExitReport>,
    exit_rx: mpsc::Receiver<ExitReport>,
    pid: Option<u32>,
}

impl DaemonProcess {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(DaemonCommand::Start) => self.handle_start().await,
                    Some(DaemonCommand::Stop) => self.handle_stop().await,
                    None => {
                        debug!("command channel closed, daemon actor exiting");
                        break;
                    }
                },
                Some(report) = self.exit_rx.recv() => {
                    self.report_exit(report).await;
                }
                _ = self.poll.tick(), if self.pid.is_some() => {
                    self.poll_once().await;
                }
            }
        }
    }

    async fn handle_start(&mut self) {
        if self.pid.is_some() {
            warn!("daemon is already running, ignoring start command");
            return;
        }

        let args = self.build_args();
        self.emit(LifecycleSignal::Starting {
            args: args.join(" "),
        })
        .await;
        self.tracker.reset();

        let mut command = Command::new(&self.daemon.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => {
                info!(binary = %self.daemon.binary.display(), "daemon process spawned");
                self.pid = child.id();
                watch_exit(child, self.exit_tx.clone());

                // Fresh interval so the new process gets a full quiet period
                // before its first poll.
                self.poll = tokio::time::interval(self.poll_interval);
                self.poll.tick().await;

                self.emit(LifecycleSignal::Started).await;
            }
            Err(e) => {
                self.emit(LifecycleSignal::Fault {
                    error: format!("failed to spawn {}: {e}", self.daemon.binary.display()),
                })
                .await;
                tokio::time::sleep(SPAWN_FAILURE_PAUSE).await;
                self.emit(LifecycleSignal::Stopped { code: -1 }).await;
            }
        }
    }

    async fn handle_stop(&mut self) {
        let Some(pid) = self.pid else {
            debug!("stop requested but daemon is not running");
            return;
        };

        info!(pid, "sending SIGTERM to daemon");
        send_signal(pid, false).await;

        match tokio::time::timeout(STOP_GRACE, self.exit_rx.recv()).await {
            Ok(Some(report)) => self.report_exit(report).await,
            // The channel cannot close while the actor holds a sender.
            Ok(None) => {}
            Err(_) => {
                warn!(
                    pid,
                    grace_secs = STOP_GRACE.as_secs(),
                    "daemon did not exit in time, sending SIGKILL"
                );
                send_signal(pid, true).await;
                if let Some(report) = self.exit_rx.recv().await {
                    self.report_exit(report).await;
                }
            }
        }
    }

    async fn poll_once(&mut self) {
        match self.client.fetch_info().await {
            Ok(info) => {
                for signal in self.tracker.observe(&info) {
                    self.emit(signal).await;
                }
            }
            Err(e) => {
                debug!(error = %e, "daemon status poll failed");
                if let Some(signal) = self.tracker.observe_failure() {
                    self.emit(signal).await;
                }
            }
        }
    }

    async fn report_exit(&mut self, report: ExitReport) {
        self.pid = None;
        self.emit(LifecycleSignal::Stopped { code: report.code })
            .await;
    }

    async fn emit(&self, signal: LifecycleSignal) {
        if self.signals.send(signal).await.is_err() {
            warn!("signal channel closed, dropping lifecycle signal");
        }
    }

    /// Daemon command line: checkpoint source, RPC binding, data directory,
    /// then uninterpreted passthrough arguments.
    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--load-checkpoints".to_owned(),
            self.daemon.checkpoints.clone(),
            "--rpc-bind-ip".to_owned(),
            self.daemon.rpc_host.clone(),
            "--rpc-bind-port".to_owned(),
            self.daemon.rpc_port.to_string(),
        ];
        if let Some(dir) = &self.daemon.data_dir {
            args.push("--data-dir".to_owned());
            args.push(dir.display().to_string());
        }
        args.extend(self.daemon.extra_args.iter().cloned());
        args
    }
}

/// Wait for the child to exit on a dedicated task and report the code.
///
/// Signal-terminated processes carry no exit code and are reported as -1.
fn watch_exit(mut child: Child, exits: mpsc::Sender<ExitReport>) {
    tokio::spawn(async move {
        let code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                warn!(error = %e, "failed to wait on daemon process");
                -1
            }
        };
        if exits.send(ExitReport { code }).await.is_err() {
            debug!("daemon actor is gone, dropping exit report");
        }
    });
}

/// Signal the daemon process by pid via `kill`, off the async runtime.
async fn send_signal(pid: u32, force: bool) {
    let pid_string = pid.to_string();
    let result = tokio::task::spawn_blocking(move || {
        let mut command = std::process::Command::new("kill");
        if force {
            command.arg("-9");
        }
        command
            .arg(&pid_string)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
    })
    .await;

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(pid, error = %e, "failed to signal daemon process"),
        Err(e) => warn!(pid, error = %e, "signal task panicked"),
    }
}
