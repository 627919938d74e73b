//! Operation context and callback traits
//!
//! The core imposes no timeout of its own. Callers attach a deadline and a
//! cancellation token to an [`OperationContext`]; the engine checks it before
//! every backend call and gateways pass it down to their transport.

use crate::gateway::GatewayError;
use crate::outcome::Reconciliation;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest uninterrupted stretch of [`OperationContext::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a signal handler or a failing sibling
/// operation can stop work in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation for one engine operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    started: Instant,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationContext {
    /// A context with no deadline and a fresh token.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    /// Limit the operation to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Observe an existing cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail if the operation was cancelled or ran out of time.
    pub fn check(&self) -> Result<(), GatewayError> {
        if self.cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(GatewayError::Timeout {
                elapsed: self.started.elapsed(),
            });
        }
        Ok(())
    }

    /// Wait for `delay`, waking early on cancellation or at the deadline.
    ///
    /// Sleeps in short slices and checks the context between them, so a
    /// cancelled sibling never leaves this thread parked for a full backoff.
    pub fn sleep(&self, delay: Duration) -> Result<(), GatewayError> {
        let until = Instant::now() + delay;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            let mut slice = (until - now).min(SLEEP_SLICE);
            if let Some(remaining) = self.remaining() {
                slice = slice.min(remaining);
            }
            std::thread::sleep(slice);
        }
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a wave of independent operations
    fn on_wave_start(&mut self, count: usize);

    /// Called when an operation completes successfully
    fn on_operation_complete(&mut self, id: &str, result: &Reconciliation);

    /// Called when an operation fails
    fn on_operation_failed(&mut self, id: &str, error: &crate::Error);

    /// Called when an operation is skipped because an ancestor failed
    fn on_operation_skipped(&mut self, id: &str, reason: &str);

    /// Called when a wave completes
    fn on_wave_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_wave_start(&mut self, _count: usize) {}
    fn on_operation_complete(&mut self, _id: &str, _result: &Reconciliation) {}
    fn on_operation_failed(&mut self, _id: &str, _error: &crate::Error) {}
    fn on_operation_skipped(&mut self, _id: &str, _reason: &str) {}
    fn on_wave_complete(&mut self) {}
}
