//! Named-gauge metrics capability.
//!
//! The supervisor publishes five gauges describing the daemon's lifecycle.
//! The backing sink is injected at construction: a status-file sink when one
//! is configured, otherwise a no-op sink that silently discards every
//! operation. Sink presence is decided once at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MetricsConfig;

/// The gauge set, in reset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gauge {
    /// Current lifecycle status token.
    Status,
    /// Sync progress, rendered as `"height/network_height (percent%)"`.
    Progress,
    /// Daemon's current block height.
    Blockheight,
    /// Estimated network hash rate in hashes per second.
    NetHash,
    /// Current network difficulty.
    Difficulty,
}

impl Gauge {
    /// All gauges, in the order they are cleared by [`MetricsSink::reset_all`].
    pub const ALL: [Self; 5] = [
        Self::Status,
        Self::Progress,
        Self::Blockheight,
        Self::NetHash,
        Self::Difficulty,
    ];

    /// Stable field name used in the status report.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Progress => "progress",
            Self::Blockheight => "blockheight",
            Self::NetHash => "net_hash",
            Self::Difficulty => "difficulty",
        }
    }
}

/// A value held by a gauge. A gauge with no value is "unset" and serializes
/// as `null` in the status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GaugeValue {
    /// Free-form text (status tokens, progress fractions).
    Text(String),
    /// Integer quantity (block height, difficulty).
    Count(u64),
    /// Fractional rate (hashes per second).
    Rate(f64),
}

impl GaugeValue {
    /// Convenience constructor for text values.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// Destination for gauge updates.
///
/// The supervisor owns exactly one sink and drives it from its single-task
/// signal loop, so implementations need no internal locking. `set`/`clear`
/// stage values; [`MetricsSink::flush`] propagates the current snapshot to
/// the backend after each handled signal.
#[async_trait]
pub trait MetricsSink: Send {
    /// Stage a value for one gauge.
    fn set(&mut self, gauge: Gauge, value: GaugeValue);

    /// Clear one gauge back to the unset state.
    fn clear(&mut self, gauge: Gauge);

    /// Clear every gauge, in [`Gauge::ALL`] order.
    fn reset_all(&mut self) {
        for gauge in Gauge::ALL {
            self.clear(gauge);
        }
    }

    /// Publish the staged snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the snapshot; the supervisor
    /// logs and ignores it, so a failing backend never stalls supervision.
    async fn flush(&mut self) -> anyhow::Result<()>;
}

/// Sink used when no metrics backend is configured: every operation is a
/// no-op and flushing always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl MetricsSink for NoopSink {
    fn set(&mut self, _gauge: Gauge, _value: GaugeValue) {}

    fn clear(&mut self, _gauge: Gauge) {}

    async fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Gauge snapshot written to the status file for an external monitoring
/// agent to scrape. Unset gauges are `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Current lifecycle status token.
    pub status: Option<GaugeValue>,
    /// Sync progress fraction.
    pub progress: Option<GaugeValue>,
    /// Daemon block height.
    pub blockheight: Option<GaugeValue>,
    /// Network hash rate.
    pub net_hash: Option<GaugeValue>,
    /// Network difficulty.
    pub difficulty: Option<GaugeValue>,
    /// ISO 8601 timestamp of the last flush.
    pub updated_at: String,
}

/// Sink that writes the gauge snapshot to a JSON file on every flush.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// concurrent reader always sees a complete report.
#[derive(Debug)]
pub struct StatusFileSink {
    path: PathBuf,
    values: BTreeMap<Gauge, GaugeValue>,
}

impl StatusFileSink {
    /// Create a sink writing to the given path. All gauges start unset.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            values: BTreeMap::new(),
        }
    }

    fn report(&self) -> StatusReport {
        StatusReport {
            status: self.values.get(&Gauge::Status).cloned(),
            progress: self.values.get(&Gauge::Progress).cloned(),
            blockheight: self.values.get(&Gauge::Blockheight).cloned(),
            net_hash: self.values.get(&Gauge::NetHash).cloned(),
            difficulty: self.values.get(&Gauge::Difficulty).cloned(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl MetricsSink for StatusFileSink {
    fn set(&mut self, gauge: Gauge, value: GaugeValue) {
        self.values.insert(gauge, value);
    }

    fn clear(&mut self, gauge: Gauge) {
        self.values.remove(&gauge);
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.report())
            .context("failed to serialize status report")?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("failed to rename into {}", self.path.display()))?;

        debug!(path = %self.path.display(), "status report updated");
        Ok(())
    }
}

/// Decide the metrics capability once at startup.
///
/// A configured status file enables the [`StatusFileSink`]; otherwise every
/// gauge operation degrades to the [`NoopSink`].
pub fn detect_sink(config: &MetricsConfig) -> Box<dyn MetricsSink> {
    match &config.status_file {
        Some(path) => {
            info!(path = %path.display(), "metrics sink enabled, publishing gauges to status file");
            Box::new(StatusFileSink::new(path.clone()))
        }
        None => {
            info!("no metrics sink configured, gauge updates disabled");
            Box::new(NoopSink)
        }
    }
}

/// Read and parse a previously written status report.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_status_report(path: &Path) -> anyhow::Result<StatusReport> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read status report at {}", path.display()))?;
    let report: StatusReport = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse status report at {}", path.display()))?;
    Ok(report)
}
