//! Bounded retry for flaky network operations.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Attempt count and fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Runs `op` until it succeeds or the attempts are used up.
    ///
    /// # Errors
    ///
    /// Returns `Error::RetriesExhausted` after the last failed attempt.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", operation, attempt, attempts, e);
                    if attempt < attempts {
                        thread::sleep(self.delay);
                    }
                }
            }
        }

        Err(Error::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
        })
    }
}
