//! Daemon status polling and sync classification.
//!
//! [`StatusClient`] fetches `/getinfo` snapshots from the managed daemon's
//! local RPC. [`SyncTracker`] turns those snapshots and poll failures into
//! lifecycle signals; it holds pure state so the classification rules are
//! testable without a running daemon.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::config::ChecksConfig;
use crate::lifecycle::LifecycleSignal;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Snapshot returned by the daemon's `/getinfo` RPC.
///
/// Fields the classifier does not use are ignored; missing fields default so
/// partial responses from older daemons still parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonInfo {
    /// Daemon's current chain height.
    #[serde(default)]
    pub height: u64,

    /// Network chain height as observed by the daemon.
    #[serde(default)]
    pub network_height: u64,

    /// Current network difficulty.
    #[serde(default)]
    pub difficulty: u64,

    /// Daemon's own judgement of whether it is synchronized.
    #[serde(default)]
    pub synced: bool,
}

/// HTTP client for the daemon's local status RPC.
#[derive(Debug, Clone)]
pub struct StatusClient {
    client: reqwest::Client,
    info_url: String,
    timeout: Duration,
}

impl StatusClient {
    /// Create a client for the daemon RPC rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            info_url: format!("{base_url}/getinfo"),
            timeout,
        }
    }

    /// Fetch one status snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails, times out, or the response
    /// body is not a valid snapshot.
    pub async fn fetch_info(&self) -> anyhow::Result<DaemonInfo> {
        let response = self
            .client
            .get(&self.info_url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("failed to reach daemon RPC at {}", self.info_url))?;
        let response = response
            .error_for_status()
            .context("daemon RPC returned an error status")?;
        let info = response
            .json::<DaemonInfo>()
            .await
            .context("failed to parse daemon RPC response")?;
        Ok(info)
    }
}

// ---------------------------------------------------------------------------
// Sync classification
// ---------------------------------------------------------------------------

/// Classifies status snapshots into lifecycle signals.
///
/// One tracker covers one process generation; call [`SyncTracker::reset`]
/// whenever the daemon is (re)started so the synced and down edges fire
/// again for the new process.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    max_deviance: u64,
    block_target_secs: u64,
    max_failures: u32,
    synced: bool,
    failures: u32,
    down_reported: bool,
}

impl SyncTracker {
    /// Create a tracker with the configured thresholds.
    pub fn new(checks: &ChecksConfig) -> Self {
        Self {
            max_deviance: checks.max_deviance,
            block_target_secs: checks.block_target_secs,
            max_failures: checks.max_poll_failures,
            synced: false,
            failures: 0,
            down_reported: false,
        }
    }

    /// Forget all per-generation state.
    pub fn reset(&mut self) {
        self.synced = false;
        self.failures = 0;
        self.down_reported = false;
    }

    /// Classify one successful poll.
    ///
    /// A successful poll also ends any down episode in progress.
    pub fn observe(&mut self, info: &DaemonInfo) -> Vec<LifecycleSignal> {
        self.failures = 0;
        self.down_reported = false;

        if !self.synced {
            if Self::caught_up(info) {
                self.synced = true;
                return vec![LifecycleSignal::Synced, self.ready_signal(info)];
            }
            return vec![LifecycleSignal::SyncProgress {
                height: info.height,
                network_height: info.network_height,
                percent: sync_percent(info.height, info.network_height),
            }];
        }

        let deviance = info.network_height.saturating_sub(info.height);
        if deviance > self.max_deviance {
            self.synced = false;
            return vec![LifecycleSignal::Desynced {
                daemon_height: info.height,
                network_height: info.network_height,
                deviance,
            }];
        }

        vec![self.ready_signal(info)]
    }

    /// Record one failed poll. Emits `Down` when the failure threshold is
    /// crossed, once per episode.
    pub fn observe_failure(&mut self) -> Option<LifecycleSignal> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.max_failures && !self.down_reported {
            self.down_reported = true;
            return Some(LifecycleSignal::Down);
        }
        None
    }

    fn caught_up(info: &DaemonInfo) -> bool {
        info.synced || (info.network_height > 0 && info.height >= info.network_height)
    }

    fn ready_signal(&self, info: &DaemonInfo) -> LifecycleSignal {
        #[allow(clippy::cast_precision_loss)]
        let hashrate = (info.difficulty as f64 / self.block_target_secs as f64).round();
        LifecycleSignal::Ready {
            height: info.height,
            difficulty: info.difficulty,
            hashrate,
        }
    }
}

/// Sync completion as a percentage, rounded down to basis-point precision.
fn sync_percent(height: u64, network_height: u64) -> f64 {
    let basis_points = height
        .saturating_mul(10_000)
        .checked_div(network_height)
        .unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let percent = basis_points as f64 / 100.0;
    percent.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SyncTracker {
        SyncTracker::new(&ChecksConfig::default())
    }

    fn info(height: u64, network_height: u64) -> DaemonInfo {
        DaemonInfo {
            height,
            network_height,
            difficulty: 120_000,
            synced: false,
        }
    }

    #[test]
    fn reports_progress_until_caught_up() {
        let mut t = tracker();

        let signals = t.observe(&info(100, 200));
        assert_eq!(
            signals,
            vec![LifecycleSignal::SyncProgress {
                height: 100,
                network_height: 200,
                percent: 50.0,
            }]
        );

        let signals = t.observe(&info(200, 200));
        assert_eq!(signals[0], LifecycleSignal::Synced);
        assert!(matches!(
            signals[1],
            LifecycleSignal::Ready { height: 200, .. }
        ));
    }

    #[test]
    fn synced_flag_short_circuits_height_check() {
        let mut t = tracker();
        let snapshot = DaemonInfo {
            height: 195,
            network_height: 200,
            difficulty: 0,
            synced: true,
        };
        assert_eq!(t.observe(&snapshot)[0], LifecycleSignal::Synced);
    }

    #[test]
    fn steady_state_repeats_ready() {
        let mut t = tracker();
        t.observe(&info(200, 200));

        let signals = t.observe(&info(201, 201));
        assert_eq!(signals.len(), 1);
        assert!(matches!(signals[0], LifecycleSignal::Ready { .. }));
    }

    #[test]
    fn ready_estimates_network_hashrate() {
        let mut t = tracker();
        let signals = t.observe(&info(200, 200));
        let LifecycleSignal::Ready { hashrate, .. } = &signals[1] else {
            panic!("expected a ready signal");
        };
        // difficulty 120_000 over a 30 second block target
        assert!((hashrate - 4000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn small_lag_is_not_a_desync() {
        let mut t = tracker();
        t.observe(&info(200, 200));

        let signals = t.observe(&info(197, 202));
        assert!(matches!(signals[0], LifecycleSignal::Ready { .. }));
    }

    #[test]
    fn desync_fires_past_max_deviance_and_resyncs() {
        let mut t = tracker();
        t.observe(&info(200, 200));

        let signals = t.observe(&info(98, 210));
        assert_eq!(
            signals,
            vec![LifecycleSignal::Desynced {
                daemon_height: 98,
                network_height: 210,
                deviance: 112,
            }]
        );

        // Catching back up repeats the synced edge.
        let signals = t.observe(&info(210, 210));
        assert_eq!(signals[0], LifecycleSignal::Synced);
    }

    #[test]
    fn down_fires_once_per_episode() {
        let mut t = tracker();
        assert_eq!(t.observe_failure(), None);
        assert_eq!(t.observe_failure(), None);
        assert_eq!(t.observe_failure(), Some(LifecycleSignal::Down));
        assert_eq!(t.observe_failure(), None);
    }

    #[test]
    fn successful_poll_restarts_the_failure_count() {
        let mut t = tracker();
        t.observe_failure();
        t.observe_failure();
        t.observe(&info(10, 100));

        assert_eq!(t.observe_failure(), None);
        assert_eq!(t.observe_failure(), None);
        assert_eq!(t.observe_failure(), Some(LifecycleSignal::Down));
    }

    #[test]
    fn reset_starts_a_fresh_generation() {
        let mut t = tracker();
        t.observe(&info(200, 200));
        t.reset();

        let signals = t.observe(&info(200, 200));
        assert_eq!(signals[0], LifecycleSignal::Synced);
    }

    #[test]
    fn percent_has_basis_point_precision() {
        assert!((sync_percent(100, 200) - 50.0).abs() < 1e-9);
        assert!((sync_percent(1, 3) - 33.33).abs() < 1e-9);
        assert!(sync_percent(0, 0).abs() < 1e-9);
        assert!((sync_percent(250, 200) - 100.0).abs() < 1e-9);
    }
}
