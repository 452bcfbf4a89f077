//! # Retry
//!
//! Bounded in-pass retries.
//!
//! Every store call of a pass runs through [`PassContext::run`], which aborts
//! it when the pass is cancelled or its deadline passes. Read-modify-write
//! cycles use [`retry_on_conflict`], which re-invokes the whole closure (read
//! included) after a version conflict. [`poll_until`] waits for a value
//! filled in asynchronously by another controller.

use crate::config::ControllerConfig;
use crate::controller::types::ReconcilerError;
use crate::store::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Attempt budget and delays between attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub steps: u32,
    /// Delay after the first failed attempt
    pub initial: Duration,
    /// Multiplier applied to the delay after each attempt
    pub factor: f64,
    /// Upper bound for a single delay
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for RetryPolicy {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            steps: config.retry_steps.max(1),
            initial: Duration::from_millis(config.retry_initial_ms),
            factor: config.retry_factor.max(1.0),
            max: Duration::from_millis(config.retry_max_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay after the attempt with index `attempt` (zero based) failed
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.initial.as_nanos() as f64 * self.factor.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max.as_nanos() as f64 {
            return self.max;
        }
        Duration::from_nanos(nanos as u64)
    }
}

/// Cancellation and deadline scope of one reconciliation pass
#[derive(Debug, Clone)]
pub struct PassContext {
    token: CancellationToken,
    deadline: Instant,
    policy: RetryPolicy,
}

impl PassContext {
    /// Scope bound to `parent`: cancelling the parent cancels the pass
    pub fn new(parent: &CancellationToken, timeout: Duration, policy: RetryPolicy) -> Self {
        Self {
            token: parent.child_token(),
            deadline: Instant::now() + timeout,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `operation` unless the pass is cancelled or out of time
    pub async fn run<T, F>(&self, operation: F) -> Result<T, ReconcilerError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ReconcilerError::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(ReconcilerError::Timeout),
            result = operation => result.map_err(ReconcilerError::from),
        }
    }

    /// Sleep between attempts, cut short by cancellation or the deadline
    pub async fn sleep(&self, delay: Duration) -> Result<(), ReconcilerError> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ReconcilerError::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(ReconcilerError::Timeout),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Re-run `attempt` while it fails with a version conflict
///
/// Any other error, and success, is returned immediately. When the budget is
/// spent the result is [`ReconcilerError::RetryExhausted`].
pub async fn retry_on_conflict<T, F, Fut>(
    pass: &PassContext,
    operation: &str,
    mut attempt: F,
) -> Result<T, ReconcilerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReconcilerError>>,
{
    let steps = pass.policy().steps.max(1);
    for step in 0..steps {
        match attempt().await {
            Err(e) if e.is_conflict() => {
                debug!(operation, attempt = step + 1, "conflict, retrying");
                if step + 1 < steps {
                    pass.sleep(pass.policy().delay(step)).await?;
                }
            }
            other => return other,
        }
    }
    Err(ReconcilerError::RetryExhausted {
        operation: operation.to_string(),
        attempts: steps,
    })
}

/// Poll `attempt` until it yields a value; `Ok(None)` once the budget is spent
pub async fn poll_until<T, F, Fut>(pass: &PassContext, mut attempt: F) -> Result<Option<T>, ReconcilerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ReconcilerError>>,
{
    let steps = pass.policy().steps.max(1);
    for step in 0..steps {
        if let Some(value) = attempt().await? {
            return Ok(Some(value));
        }
        if step + 1 < steps {
            pass.sleep(pass.policy().delay(step)).await?;
        }
    }
    Ok(None)
}
