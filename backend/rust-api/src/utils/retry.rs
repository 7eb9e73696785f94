use std::time::Duration;

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(400),
            jitter_max: Some(Duration::from_millis(25)),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_max: None,
        }
    }

    fn delay(&self, backoff: Duration) -> Duration {
        let Some(jitter_max) = self.jitter_max else {
            return backoff;
        };
        let jitter_ms = jitter_max.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::random::<u64>() % (jitter_ms + 1)
        };
        backoff + Duration::from_millis(extra)
    }
}

/// Runs `f` until it succeeds or `max_attempts` is used up, returning the
/// last error in the latter case. `operation` only labels the log lines.
pub async fn retry_async_with_config<F, Fut, T, E>(
    operation: &str,
    config: &RetryConfig,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0usize;
    let mut backoff = config.base_backoff;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= config.max_attempts.max(1) => return Err(e),
            Err(e) => {
                let wait = config.delay(backoff);
                tracing::debug!(
                    operation,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(wait).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
