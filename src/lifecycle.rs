//! Lifecycle signals emitted by the managed daemon and the supervisor status
//! derived from them.
//!
//! Every observation the node handle makes (spawn, sync progress, crash,
//! exit) is reported as exactly one [`LifecycleSignal`] on the supervisor's
//! signal channel. The supervisor matches exhaustively on the variant, so a
//! newly added signal kind fails compilation instead of being dropped.

use std::fmt;

/// A discrete event describing a phase of the daemon's run.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleSignal {
    /// The daemon process is being spawned with the given command line.
    Starting {
        /// Rendered argument list the daemon was launched with.
        args: String,
    },

    /// The daemon process is up and beginning to synchronize.
    Started,

    /// The daemon is catching up to the network chain tip.
    SyncProgress {
        /// Daemon's current block height.
        height: u64,
        /// Network's reported block height.
        network_height: u64,
        /// Completion percentage, rounded to two decimal places.
        percent: f64,
    },

    /// The daemon has caught up with the network.
    Synced,

    /// The daemon is synchronized and serving; carries chain-tip detail.
    ///
    /// Emitted on every healthy poll while synced, so the supervisor treats
    /// it additively rather than as a fresh transition.
    Ready {
        /// Daemon's current block height.
        height: u64,
        /// Current network difficulty.
        difficulty: u64,
        /// Estimated network hash rate in hashes per second.
        hashrate: f64,
    },

    /// The daemon has fallen behind the network after being synced.
    Desynced {
        /// Daemon's current block height.
        daemon_height: u64,
        /// Network's reported block height.
        network_height: u64,
        /// Number of blocks the daemon is behind.
        deviance: u64,
    },

    /// The daemon has stopped answering status polls.
    Down,

    /// The daemon process has exited.
    Stopped {
        /// Process exit code; `-1` when terminated by a signal or unknown.
        code: i32,
    },

    /// Informational output from the daemon, forwarded verbatim.
    Info {
        /// Raw message text.
        message: String,
    },

    /// Non-fatal operational error reported by the node handle.
    Fault {
        /// Raw error text.
        error: String,
    },
}

/// Current supervision status, mutated only by the supervisor on receipt of
/// a [`LifecycleSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Daemon spawn has been requested.
    Starting,
    /// Daemon process is up, synchronization not yet observed.
    Started,
    /// Daemon is catching up to the network.
    Synchronizing,
    /// Daemon has caught up with the network.
    Synchronized,
    /// Daemon is synced and waiting for peer connections.
    WaitingForConnections,
    /// Daemon has fallen behind the network.
    Desynchronized,
    /// Daemon is unresponsive; a stop has been issued.
    Down,
    /// Daemon process has exited.
    Stopped,
}

impl Status {
    /// Canonical token for this status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Synchronizing => "synchronizing",
            Self::Synchronized => "synchronized",
            Self::WaitingForConnections => "waiting_for_connections",
            Self::Desynchronized => "desynchronized",
            Self::Down => "down",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
