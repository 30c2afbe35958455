use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::VkError;

/// Fixed-interval retry for transient VK failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Total attempts including the first. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(false, |max| attempt >= max)
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, VkError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, VkError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(operation_name, attempt, "succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                return Err(error);
            }

            if self.exhausted(attempt) {
                warn!(operation_name, attempt, error = %error, "giving up");
                return Err(error);
            }

            warn!(
                operation_name,
                attempt,
                error = %error,
                "transient failure, retrying in {:?}",
                self.interval
            );
            sleep(self.interval).await;
        }
    }
}
