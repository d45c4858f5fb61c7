//! Auto-restart policy.
//!
//! The base policy restarts the daemon on every observed exit, with no
//! backoff and no ceiling. A rolling one-hour rate limit can be layered on
//! top through `restart.limit_per_hour` for deployments where a crash loop
//! is worse than a stopped daemon.

use chrono::{DateTime, Duration, Utc};

use crate::config::RestartConfig;

/// Decides whether an exited daemon may be started again.
#[derive(Debug, Clone)]
pub enum RestartPolicy {
    /// Restart on every exit.
    Always,
    /// Restart at most `max_per_hour` times in any rolling hour.
    Limited {
        /// Restarts allowed per rolling hour.
        max_per_hour: u32,
        /// Timestamps of restarts granted inside the current window.
        restart_times: Vec<DateTime<Utc>>,
    },
}

impl RestartPolicy {
    /// Build the policy selected by configuration. A zero limit selects the
    /// unconditional base policy.
    pub fn from_config(config: &RestartConfig) -> Self {
        if config.limit_per_hour == 0 {
            Self::Always
        } else {
            Self::Limited {
                max_per_hour: config.limit_per_hour,
                restart_times: Vec::new(),
            }
        }
    }

    /// Decide whether a restart at `now` may proceed, recording it if so.
    ///
    /// Takes the timestamp as a parameter so the window can be exercised
    /// deterministically in tests.
    pub fn permit(&mut self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Always => true,
            Self::Limited {
                max_per_hour,
                restart_times,
            } => {
                let one_hour_ago = now.checked_sub_signed(Duration::hours(1)).unwrap_or(now);
                restart_times.retain(|t| *t > one_hour_ago);

                #[allow(clippy::cast_possible_truncation)] // limit u32 fits in usize
                if restart_times.len() >= *max_per_hour as usize {
                    return false;
                }

                restart_times.push(now);
                true
            }
        }
    }
}
