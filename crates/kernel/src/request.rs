//! Per-request deadline and cancellation.
//!
//! Every storage-touching operation in the discovery and suggestion
//! services takes a [`RequestContext`]. Futures run through
//! [`RequestContext::run`] are raced against the deadline and the
//! cancellation token; multi-step sequences call
//! [`RequestContext::check`] before starting each further step.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// Deadline and cancellation signal supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context without deadline that is never cancelled unless
    /// [`cancellation_token`](Self::cancellation_token) is triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tie this context to an externally owned cancellation token.
    pub fn cancelled_by(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token observed by this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail fast if the caller already gave up.
    pub fn check(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(AppError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the deadline passes or the
    /// request is cancelled first. The future is dropped in that case.
    pub async fn run<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.check()?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| AppError::DeadlineExceeded)?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_future_without_deadline() {
        let ctx = RequestContext::new();
        let value = ctx.run(async { Ok(7) }).await;
        assert!(matches!(value, Ok(7)));
    }

    #[tokio::test]
    async fn deadline_aborts_slow_future() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let result: AppResult<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn cancelled_context_refuses_new_work() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().cancelled_by(token.clone());
        token.cancel();

        assert!(matches!(ctx.check(), Err(AppError::Cancelled)));
        let result = ctx.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn expired_deadline_fails_check() {
        let ctx = RequestContext::new().deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(AppError::DeadlineExceeded)));
    }
}
