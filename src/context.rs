//! Per-request context carried by every store call.
//!
//! A [`RequestContext`] bundles the request's tracing span, a cancellation
//! token and an optional deadline. Store operations run their blocking
//! database work through [`RequestContext::run_blocking`], which gives up as
//! soon as the caller cancels or the deadline passes. The blocking side gets
//! an [`Interrupt`] to poll between round-trips.

use std::future::Future;
use std::time::{Duration, Instant};

use puzzlegallery_common::{Error, Result};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Cancellation and deadline signals, checkable from blocking code.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// An interrupt that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fail with `Cancelled` or `Timeout` if the request should stop.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::Timeout);
        }
        Ok(())
    }
}

/// Tracing span, cancellation token and deadline of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    span: Span,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(tracing::info_span!("gallery_request"))
    }
}

impl RequestContext {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Use the caller's cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Set an absolute deadline, keeping an earlier one if already set.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline `timeout` from now, keeping an earlier one if already set.
    ///
    /// A timeout too large to represent as an instant sets no deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn interrupt(&self) -> Interrupt {
        Interrupt {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }

    /// Run blocking work on the blocking pool inside this request's span.
    ///
    /// Returns `Cancelled`/`Timeout` as soon as either signal fires. The
    /// blocking task is not killed; it sees the same signals through its
    /// [`Interrupt`] and is expected to stop at its next check. Work that
    /// writes goes through [`run_to_completion`](Self::run_to_completion).
    pub async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = self.spawn(work)?;

        tokio::select! {
            joined = task => settle(joined),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = deadline_elapsed(self.deadline) => Err(Error::Timeout),
        }
    }

    /// Run blocking work that may write, and report what it actually did.
    ///
    /// Unlike [`run_blocking`](Self::run_blocking) a fired signal does not
    /// abandon the work: the call waits for it to finish. The result is
    /// `Cancelled`/`Timeout` only if the work stopped at an [`Interrupt`]
    /// check; work that committed before noticing returns its value.
    pub async fn run_to_completion<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut task = self.spawn(work)?;

        tokio::select! {
            joined = &mut task => return settle(joined),
            _ = self.cancel.cancelled() => {}
            _ = deadline_elapsed(self.deadline) => {}
        }

        tracing::debug!("request interrupted, waiting for write to settle");
        settle(task.await)
    }

    fn spawn<T, F>(&self, work: F) -> Result<JoinHandle<Result<T>>>
    where
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let interrupt = self.interrupt();
        interrupt.check()?;

        let span = self.span.clone();
        Ok(tokio::task::spawn_blocking(move || {
            span.in_scope(|| work(&interrupt))
        }))
    }
}

fn settle<T>(joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    joined.map_err(|e| Error::internal(format!("spawn_blocking join error: {e}")))?
}

fn deadline_elapsed(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
            None => std::future::pending().await,
        }
    }
}
