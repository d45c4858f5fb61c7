//! Chainward — a supervisor for a blockchain node daemon.
//!
//! Spawns the configured node daemon, watches its synchronization lifecycle
//! through the local status RPC, restarts it when it dies or stops
//! responding, and republishes every transition as log lines and named
//! gauges for an external monitoring agent.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod restart;
pub mod supervisor;
pub mod watcher;
