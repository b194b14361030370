use crate::error::TransportError;
use crate::transport::HttpResponse;
use log::{debug, warn};
use std::future::Future;
use std::time::{Duration, Instant};

/// Bounded retry policy for outgoing HTTP requests
///
/// Connection failures and 5xx responses are retried with exponential
/// backoff until either `max_attempts` requests have been made or the next
/// attempt would start after `deadline` has elapsed. Timeouts and other
/// failures after the request went out are retried only for idempotent
/// requests, since the server may already have acted on them. Any other
/// response is returned to the caller as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
    /// Overall time budget measured from the first attempt
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            deadline: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that issues every request exactly once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether an attempt's outcome is worth retrying
    ///
    /// A write is only repeated when it provably never reached the server
    /// or the server reported a 5xx.
    pub fn is_retryable(
        outcome: &Result<HttpResponse, TransportError>,
        idempotent: bool,
    ) -> bool {
        match outcome {
            Ok(response) => response.status >= 500,
            Err(TransportError::Connect(_)) => true,
            Err(TransportError::Request(_)) | Err(TransportError::Timeout) => idempotent,
            Err(_) => false,
        }
    }

    /// Drive `attempt` until it produces a final outcome
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<F, Fut>(
        &self,
        idempotent: bool,
        mut attempt: F,
    ) -> Result<HttpResponse, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        let started = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut number = 1;

        loop {
            let outcome = attempt(number).await;

            if !Self::is_retryable(&outcome, idempotent) || number >= max_attempts {
                return outcome;
            }

            let delay = self.backoff_for(number);
            if started.elapsed() + delay > self.deadline {
                warn!(
                    "Retry deadline of {:?} reached after {} attempt(s)",
                    self.deadline, number
                );
                return match outcome {
                    Ok(response) => Ok(response),
                    Err(_) => Err(TransportError::DeadlineExceeded { attempts: number }),
                };
            }

            match &outcome {
                Ok(response) => debug!(
                    "Attempt {} returned status {}, retrying in {:?}",
                    number, response.status, delay
                ),
                Err(e) => debug!("Attempt {} failed: {}, retrying in {:?}", number, e, delay),
            }

            tokio::time::sleep(delay).await;
            number += 1;
        }
    }
}
