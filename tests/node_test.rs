//! Tests for the daemon actor: spawn, exit reporting, and stop signalling.
//!
//! These drive real child processes, so they are Unix-only.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use chainward::config::ChainwardConfig;
use chainward::lifecycle::LifecycleSignal;
use chainward::node::spawn_daemon;
use chainward::supervisor::NodeHandle;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

fn daemon_config(binary: PathBuf) -> ChainwardConfig {
    let mut config = ChainwardConfig::default();
    config.daemon.binary = binary;
    // Keep the status poller quiet for the duration of the test.
    config.checks.poll_interval_secs = 3600;
    config
}

async fn next_signal(rx: &mut mpsc::Receiver<LifecycleSignal>) -> LifecycleSignal {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("lifecycle signal within deadline")
        .expect("signal channel open")
}

// ---------------------------------------------------------------------------
// Spawn and exit reporting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spawn_reports_the_command_line_and_the_exit_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "daemon.sh", "#!/bin/sh\nexit 7\n");

    let mut config = daemon_config(script);
    config.daemon.extra_args = vec!["--log-level".to_owned(), "4".to_owned()];

    let (tx, mut rx) = mpsc::channel(64);
    let mut handle = spawn_daemon(&config, tx);
    handle.start().await;

    match next_signal(&mut rx).await {
        LifecycleSignal::Starting { args } => {
            assert!(
                args.contains("--load-checkpoints ./checkpoints.csv"),
                "got args: {args}"
            );
            assert!(args.contains("--rpc-bind-ip 127.0.0.1"));
            assert!(args.contains("--rpc-bind-port 11898"));
            assert!(args.contains("--log-level 4"));
        }
        other => panic!("expected Starting, got {other:?}"),
    }

    assert_eq!(next_signal(&mut rx).await, LifecycleSignal::Started);
    assert_eq!(
        next_signal(&mut rx).await,
        LifecycleSignal::Stopped { code: 7 }
    );
}

#[tokio::test]
async fn a_missing_binary_reports_a_fault_then_a_stop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = daemon_config(dir.path().join("no-such-daemon"));

    let (tx, mut rx) = mpsc::channel(64);
    let mut handle = spawn_daemon(&config, tx);
    handle.start().await;

    assert!(matches!(
        next_signal(&mut rx).await,
        LifecycleSignal::Starting { .. }
    ));

    match next_signal(&mut rx).await {
        LifecycleSignal::Fault { error } => {
            assert!(error.contains("failed to spawn"), "got error: {error}");
        }
        other => panic!("expected Fault, got {other:?}"),
    }

    assert_eq!(
        next_signal(&mut rx).await,
        LifecycleSignal::Stopped { code: -1 }
    );
}

// ---------------------------------------------------------------------------
// Stop signalling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_terminates_a_running_daemon() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "daemon.sh", "#!/bin/sh\nexec sleep 30\n");
    let config = daemon_config(script);

    let (tx, mut rx) = mpsc::channel(64);
    let mut handle = spawn_daemon(&config, tx);
    handle.start().await;

    assert!(matches!(
        next_signal(&mut rx).await,
        LifecycleSignal::Starting { .. }
    ));
    assert_eq!(next_signal(&mut rx).await, LifecycleSignal::Started);

    handle.stop().await;

    // SIGTERM carries no exit code, so the stop reports -1.
    assert_eq!(
        next_signal(&mut rx).await,
        LifecycleSignal::Stopped { code: -1 }
    );
}

#[tokio::test]
async fn stop_without_a_running_daemon_reports_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = daemon_config(dir.path().join("never-started"));

    let (tx, mut rx) = mpsc::channel(64);
    let mut handle = spawn_daemon(&config, tx);
    handle.stop().await;

    let outcome = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(outcome.is_err(), "no signal expected, got {outcome:?}");
}

#[tokio::test]
async fn a_second_start_while_running_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "daemon.sh", "#!/bin/sh\nexec sleep 30\n");
    let config = daemon_config(script);

    let (tx, mut rx) = mpsc::channel(64);
    let mut handle = spawn_daemon(&config, tx);
    handle.start().await;

    assert!(matches!(
        next_signal(&mut rx).await,
        LifecycleSignal::Starting { .. }
    ));
    assert_eq!(next_signal(&mut rx).await, LifecycleSignal::Started);

    handle.start().await;
    let extra = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(
        extra.is_err(),
        "redundant start should emit nothing, got {extra:?}"
    );

    handle.stop().await;
    assert_eq!(
        next_signal(&mut rx).await,
        LifecycleSignal::Stopped { code: -1 }
    );
}
