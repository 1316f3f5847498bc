// crates/portal-e2e-harness/src/wait.rs
// ============================================================================
// Module: Wait Helpers
// Description: Polling probes for page state.
// Purpose: Wait for elements and URLs without arbitrary sleeps.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! Page state changes asynchronously after navigation and clicks, so every
//! probe polls with a bounded [`WaitPolicy`]. An expired wait keeps the last
//! observation so failures can say what the page showed instead.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio::time::sleep;

/// Default budget for a single element or URL wait.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(10);
/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polling policy for page probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Total time to keep polling.
    pub timeout: Duration,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Result of a poll that gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitExpired<T> {
    /// Number of probe attempts made.
    pub attempts: u32,
    /// Last observation returned by the probe.
    pub last: T,
}

/// Polls `probe` until it is satisfied or the policy expires.
///
/// The probe yields `Ok(Ok(value))` when satisfied, `Ok(Err(observation))` to
/// keep polling, and `Err(err)` to abort immediately.
///
/// # Errors
///
/// Returns `Err(Ok(WaitExpired))` on expiry and `Err(Err(E))` when the probe
/// itself fails.
pub async fn poll_until<T, O, E, F, Fut>(
    policy: WaitPolicy,
    mut probe: F,
) -> Result<T, Result<WaitExpired<O>, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Result<T, O>, E>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match probe().await {
            Ok(Ok(found)) => return Ok(found),
            Ok(Err(last)) => {
                if start.elapsed() >= policy.timeout {
                    return Err(Ok(WaitExpired {
                        attempts,
                        last,
                    }));
                }
                sleep(policy.interval).await;
            }
            Err(err) => return Err(Err(err)),
        }
    }
}
