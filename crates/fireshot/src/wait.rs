//! Settling between the last navigation and the first capture.
//!
//! The application needs time to initialize and fetch its data after load.
//! [`SettlePolicy::Fixed`] sleeps unconditionally; [`SettlePolicy::Poll`]
//! polls for a ready selector and gives up quietly at the timeout. Neither
//! ever fails a run: the outcome is only recorded.

use crate::driver::PageDriver;
use crate::locator::Selector;
use crate::result::FireshotResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default fixed settle delay
pub const DEFAULT_SETTLE_MS: u64 = 5_000;

/// Pause after an interaction before capturing
pub const DEFAULT_INTERACTION_SETTLE_MS: u64 = 500;

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// How to wait for the view to settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Sleep for a fixed duration
    Fixed {
        /// Duration in milliseconds
        ms: u64,
    },
    /// Poll until `ready` matches at least one element
    Poll {
        /// Readiness probe
        ready: Selector,
        /// Give up after this long
        timeout_ms: u64,
        /// Delay between probes
        #[serde(default = "default_poll_interval")]
        poll_interval_ms: u64,
    },
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::Fixed {
            ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl SettlePolicy {
    /// Fixed delay
    #[must_use]
    pub const fn fixed(ms: u64) -> Self {
        Self::Fixed { ms }
    }

    /// Readiness poll with the default interval
    #[must_use]
    pub const fn poll(ready: Selector, timeout_ms: u64) -> Self {
        Self::Poll {
            ready,
            timeout_ms,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// How settling ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleStatus {
    /// Ready selector matched
    Ready,
    /// Ready selector never matched in time
    TimedOut,
    /// Fixed delay elapsed
    Slept,
}

/// Result of a settle wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleOutcome {
    /// How it ended
    pub status: SettleStatus,
    /// Time spent waiting
    pub elapsed_ms: u64,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Wait according to `policy`
///
/// # Errors
///
/// Only propagates driver failures while probing; a timeout is an outcome.
pub async fn settle<D: PageDriver + ?Sized>(
    driver: &D,
    policy: &SettlePolicy,
) -> FireshotResult<SettleOutcome> {
    let start = Instant::now();
    match policy {
        SettlePolicy::Fixed { ms } => {
            info!(ms, "settling");
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(SettleOutcome {
                status: SettleStatus::Slept,
                elapsed_ms: millis(start.elapsed()),
            })
        }
        SettlePolicy::Poll {
            ready,
            timeout_ms,
            poll_interval_ms,
        } => {
            info!(%ready, timeout_ms, "waiting for ready selector");
            let timeout = Duration::from_millis(*timeout_ms);
            let interval = Duration::from_millis((*poll_interval_ms).max(1));
            loop {
                let count = driver.count(ready).await?;
                if count > 0 {
                    debug!(%ready, count, "ready");
                    return Ok(SettleOutcome {
                        status: SettleStatus::Ready,
                        elapsed_ms: millis(start.elapsed()),
                    });
                }
                let remaining = timeout.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    warn!(%ready, timeout_ms, "ready selector not seen; continuing");
                    return Ok(SettleOutcome {
                        status: SettleStatus::TimedOut,
                        elapsed_ms: millis(start.elapsed()),
                    });
                }
                // The last sleep stops at the deadline
                tokio::time::sleep(interval.min(remaining)).await;
            }
        }
    }
}
