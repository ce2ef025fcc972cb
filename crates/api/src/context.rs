//! Per-request context handed explicitly to every service operation.
//!
//! A [`RequestContext`] carries the tracing span for the request plus the
//! two ways a caller can abandon work: a deadline and a cancellation signal.
//! Backend calls go through [`RequestContext::run`], which races the call
//! against both.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Span;

/// Why a guarded operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    /// The caller fired its cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
    /// The request deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Sending half of a cancellation signal.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] does not
/// cancel anything.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Fire the signal. Every context holding the paired [`Cancellation`]
    /// aborts its in-flight backend call.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of a cancellation signal.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    /// Create a linked handle/signal pair.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx })
    }

    /// Whether the signal has already fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires. Never resolves if the handle is
    /// dropped unfired.
    async fn fired(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Explicit per-request handle: logging span, deadline and cancellation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    span: Span,
    deadline: Option<Instant>,
    cancel: Option<Cancellation>,
}

impl RequestContext {
    /// Create a context with the given request id and span, no deadline and
    /// no cancellation signal.
    #[must_use]
    pub fn new(request_id: impl Into<String>, span: Span) -> Self {
        Self {
            request_id: request_id.into(),
            span,
            deadline: None,
            cancel: None,
        }
    }

    /// Context for work that is not tied to an inbound request (startup
    /// checks, tests).
    #[must_use]
    pub fn background(name: &str) -> Self {
        let span = tracing::info_span!("background", task = name);
        Self::new(name, span)
    }

    /// Abort guarded calls once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort guarded calls at `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort guarded calls when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Same request id and span, but none of the caller's limits: the
    /// returned context ignores this one's cancellation and deadline and
    /// expires `timeout` from now instead.
    ///
    /// For cleanup that has to run after the caller gave up.
    #[must_use]
    pub fn detached(&self, timeout: Duration) -> Self {
        Self::new(self.request_id.clone(), self.span.clone()).with_timeout(timeout)
    }

    /// The span all logging for this request is parented to.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Run `fut` unless the context is cancelled or its deadline passes first.
    ///
    /// An already-fired signal or already-expired deadline wins without
    /// polling `fut` at all.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the operation was abandoned.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if self.cancel.as_ref().is_some_and(Cancellation::is_cancelled) {
            return Err(Interrupted::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Interrupted::DeadlineExceeded);
        }

        let cancelled = async {
            match &self.cancel {
                Some(cancel) => cancel.fired().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(Interrupted::Cancelled),
            () = expired => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
