//! Retry with exponential backoff for source calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::config::ReplayConfig;
use crate::error::{ReplayError, Result, SourceError};

/// Exponential backoff schedule.
///
/// Delays double from `base` up to `max`. Each delay is jittered into
/// `[d/2, d]` so that streams failing together do not retry together.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(config.retry_base_delay, config.retry_max_delay)
    }

    /// Attempts made so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Unjittered delay for the current attempt.
    pub fn ceiling(&self) -> Duration {
        let factor = 1u32 << self.attempt.min(31);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Delay before the next retry. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling();
        self.attempt = self.attempt.saturating_add(1);

        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        if spread == 0 {
            return ceiling;
        }
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Run `op` until it succeeds, retrying source errors with backoff.
///
/// Gives up with `RetriesExhausted` after `config.max_retries` retries and
/// returns `Cancelled` if `cancel` fires while waiting.
pub async fn with_retries<T, F, Fut>(
    config: &ReplayConfig,
    cancel: &mut watch::Receiver<bool>,
    what: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, SourceError>>,
{
    let mut backoff = Backoff::from_config(config);

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let attempts = backoff.attempt() + 1;
        if backoff.attempt() >= config.max_retries {
            return Err(ReplayError::RetriesExhausted {
                attempts,
                last: err,
            });
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            operation = what,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "source call failed, retrying"
        );

        if *cancel.borrow() {
            return Err(ReplayError::Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return Err(ReplayError::Cancelled);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> ReplayConfig {
        ReplayConfig {
            max_retries,
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(4),
            ..ReplayConfig::default()
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.ceiling(), Duration::from_millis(100));

        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(100));
        assert_eq!(backoff.ceiling(), Duration::from_millis(200));

        backoff.next_delay();
        assert_eq!(backoff.ceiling(), Duration::from_millis(350));

        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_millis(350));
        }

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let (_tx, mut cancel) = watch::channel(false);
        let calls = AtomicU32::new(0);

        let value = with_retries(&fast_config(5), &mut cancel, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(SourceError::Unreachable("down".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (_tx, mut cancel) = watch::channel(false);
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retries(&fast_config(2), &mut cancel, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SourceError::Other("boom".into())) }
        })
        .await;

        match result {
            Err(ReplayError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, SourceError::Other("boom".into()));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let (tx, mut cancel) = watch::channel(false);
        let config = ReplayConfig {
            max_retries: 10,
            retry_base_delay: Duration::from_secs(60),
            retry_max_delay: Duration::from_secs(60),
            ..ReplayConfig::default()
        };

        let task = tokio::spawn(async move {
            with_retries(&config, &mut cancel, "test", || async {
                Err::<(), _>(SourceError::Timeout("slow".into()))
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        assert!(matches!(task.await.unwrap(), Err(ReplayError::Cancelled)));
    }
}
