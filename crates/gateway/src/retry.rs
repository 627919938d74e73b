//! Retry with exponential backoff for transient gateway errors.
//!
//! Only reads and deletes are retried. A write that failed in transit may
//! still have landed, and the engine's guard read is what decides whether to
//! write again.

use reconcile::{BackendGateway, GatewayError, OperationContext, ResourceIdentity, ResourceRecord};
use std::time::Duration;

/// Retry configuration for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Notified before each retry.
pub trait RetryCallback: Send + Sync {
    /// `attempt` is 1-indexed and refers to the attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &GatewayError, delay: Duration);
}

/// Callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _: u32, _: u32, _: &GatewayError, _: Duration) {}
}

/// Callback that logs each retry as a warning.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &GatewayError, delay: Duration) {
        log::warn!(
            "attempt {attempt}/{max_attempts} failed: {error}; retrying in {:.1}s",
            delay.as_secs_f64()
        );
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// The context is checked before every attempt, and backoff sleeps wake early
/// on cancellation or at its deadline.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    ctx: &OperationContext,
    callback: &dyn RetryCallback,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Result<T, GatewayError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        ctx.check()?;
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let mut delay = config.delay_for_attempt(attempt);
                if let Some(remaining) = ctx.remaining() {
                    delay = delay.min(remaining);
                }
                callback.on_retry(attempt + 1, max_attempts, &e, delay);
                ctx.sleep(delay)?;
                attempt += 1;
            }
        }
    }
}

/// Gateway wrapper retrying transient fetch and remove failures.
pub struct RetryingGateway<G> {
    inner: G,
    config: RetryConfig,
    callback: Box<dyn RetryCallback>,
}

impl<G: BackendGateway> RetryingGateway<G> {
    pub fn new(inner: G, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            callback: Box::new(LogCallback),
        }
    }

    pub fn with_callback(mut self, callback: impl RetryCallback + 'static) -> Self {
        self.callback = Box::new(callback);
        self
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: BackendGateway> BackendGateway for RetryingGateway<G> {
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        with_retry(&self.config, ctx, self.callback.as_ref(), || {
            self.inner.fetch(ctx, id)
        })
    }

    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError> {
        self.inner.put(ctx, id, desired)
    }

    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError> {
        with_retry(&self.config, ctx, self.callback.as_ref(), || {
            self.inner.remove(ctx, id)
        })
    }
}
