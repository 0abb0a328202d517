use crate::error::FetchError;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// HTTP statuses worth another attempt
const RETRIABLE_STATUSES: &[u16] = &[408, 423, 429, 500, 502, 503, 504, 507, 599];

impl FetchError {
    /// Whether a later attempt might succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => RETRIABLE_STATUSES.contains(status),
            Self::Transport(_) | Self::ShortContent { .. } => true,
            Self::Request(_) | Self::Io(_) => false,
        }
    }
}

const OBSOLETE_HTTP_DATES: &[&str] = &["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Retry limits and exponential backoff parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_wait: Duration,
    pub backoff_factor: u32,
    /// Total attempts, the first one included
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(4),
            backoff_factor: 4,
            max_attempts: 4,
        }
    }
}

/// Per-task retry bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempts: u32,
    /// Exponent for the next computed backoff
    pub backoff_step: u32,
}

impl RetryState {
    /// Account for a decision that led to another attempt
    pub fn record(&mut self, decision: &Decision) {
        if decision.retry && decision.advances_backoff {
            self.backoff_step += 1;
        }
    }
}

/// Outcome of consulting the policy after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub retry: bool,
    pub wait: Duration,
    /// False when the wait came from a `Retry-After` header
    pub advances_backoff: bool,
}

impl Decision {
    const STOP: Self = Self {
        retry: false,
        wait: Duration::ZERO,
        advances_backoff: false,
    };
}

impl RetryPolicy {
    /// Decide whether to try again after `error`
    #[must_use]
    pub fn should_retry(&self, state: &RetryState, error: &FetchError) -> Decision {
        if !error.is_transient() || state.attempts >= self.max_attempts {
            return Decision::STOP;
        }

        if let FetchError::Status {
            retry_after: Some(wait),
            ..
        } = error
        {
            return Decision {
                retry: true,
                wait: *wait,
                advances_backoff: false,
            };
        }

        Decision {
            retry: true,
            wait: self.backoff(state.backoff_step),
            advances_backoff: true,
        }
    }

    /// `initial_wait * backoff_factor^step`
    #[must_use]
    pub fn backoff(&self, step: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(step);
        self.initial_wait.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails terminally or runs out of attempts
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut state = RetryState::default();

        loop {
            state.attempts += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let decision = self.should_retry(&state, &error);
            if !decision.retry {
                return Err(error);
            }

            tracing::warn!(
                "Error downloading {label}: {error}, retrying in {:.1}s (attempt {}/{})",
                decision.wait.as_secs_f64(),
                state.attempts + 1,
                self.max_attempts
            );
            tokio::time::sleep(decision.wait).await;
            state.record(&decision);
        }
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // Obsolete HTTP-date forms: RFC 850 and asctime, both in GMT
            OBSOLETE_HTTP_DATES
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|naive| naive.and_utc())
        })?;
    // Dates in the past mean "now"
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
