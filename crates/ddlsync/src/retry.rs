//! Bounded exponential backoff with jitter.
//!
//! Only the metadata store's lazy provisioning retries; every other remote
//! call is single-attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

const MAX_SHIFT: u32 = 16;

/// Retry policy: `attempts` tries, delays doubling from `base` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base,
            max,
        }
    }

    pub fn from_config(config: &ddlsync_config::Config) -> Self {
        Self::new(
            config.provision_attempts(),
            config.provision_base_delay(),
            config.provision_max_delay(),
        )
    }

    /// Delay before retry number `failures` (1-based), without jitter.
    pub fn ceiling(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(MAX_SHIFT);
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        Duration::from_millis(base_ms.saturating_mul(1u64 << shift).min(max_ms))
    }

    /// Delay before retry number `failures`, jittered into [50%, 100%] of
    /// [`Backoff::ceiling`].
    pub fn delay(&self, failures: u32) -> Duration {
        let ceiling = self.ceiling(failures);
        let percent = rand::thread_rng().gen_range(50u32..=100);
        ceiling * percent / 100
    }

    /// Run `op` until it succeeds or the attempts are used up, returning the
    /// last error.
    pub async fn retry<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut failures = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures += 1;
                    if failures >= self.attempts {
                        return Err(e);
                    }
                    let delay = self.delay(failures);
                    tracing::warn!(
                        what,
                        attempt = failures,
                        of = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
