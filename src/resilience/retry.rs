// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with backoff.
//!
//! Provides configurable retry behavior for transient failures.
//! Different presets are available for different use cases.
//!
//! # Example
//!
//! ```
//! use read_sync_engine::{RetryConfig, Backoff};
//! use std::time::Duration;
//!
//! // Full sync round: 3 attempts, waiting 1s then 2s between them
//! let round = RetryConfig::full_sync(3, Duration::from_secs(1));
//! assert_eq!(round.backoff, Backoff::Linear);
//! assert_eq!(round.delay_for(1), Duration::from_secs(1));
//! assert_eq!(round.delay_for(2), Duration::from_secs(2));
//!
//! // Startup: fail fast on bad config
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_retries, 5);
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::storage::traits::StorageError;

/// How the wait grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `initial_delay * attempt`
    Linear,
    /// `initial_delay * factor^(attempt - 1)`
    Exponential { factor: f64 },
}

/// Configuration for operation retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// Total attempts, including the first
    pub max_retries: usize,
}

impl RetryConfig {
    /// Retry policy for a whole coordinator round.
    #[must_use]
    pub fn full_sync(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay: base_delay,
            max_delay: base_delay.saturating_mul(max_retries.max(1) as u32),
            backoff: Backoff::Linear,
        }
    }

    /// Fast-fail retry for opening the local database.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            backoff: Backoff::Exponential { factor: 2.0 },
        }
    }

    /// Quick retry for individual statements (busy database, lock contention).
    #[must_use]
    pub fn query() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff: Backoff::Exponential { factor: 2.0 },
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff: Backoff::Exponential { factor: 2.0 },
        }
    }

    /// Wait after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.initial_delay.saturating_mul(attempt as u32),
            Backoff::Exponential { factor } => {
                self.initial_delay.mul_f64(factor.powi(attempt as i32 - 1))
            }
        };
        delay.min(self.max_delay)
    }
}

/// Errors that know whether another attempt could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Timeout(_))
    }
}

pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + Retryable,
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!("Operation '{}' succeeded after {} retries", operation_name, attempts);
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;

                if !err.is_retryable() {
                    warn!("Operation '{}' failed with a permanent error: {}", operation_name, err);
                    return Err(err);
                }
                if attempts >= config.max_retries {
                    warn!(
                        "Operation '{}' failed (attempt {}/{}), giving up: {}",
                        operation_name, attempts, config.max_retries, err
                    );
                    return Err(err);
                }

                let delay = config.delay_for(attempts);
                crate::metrics::record_retry(operation_name);
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempts, config.max_retries, err, delay
                );

                sleep(delay).await;
            }
        }
    }
}
