//! Per-request deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use storedge_core::AppError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal every port call of a request runs under.
///
/// Cloning shares the cancellation token, so cancelling any clone aborts them all.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context that expires `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_cancellation(Some(timeout), CancellationToken::new())
    }

    /// A context with no deadline; only explicit cancellation aborts it.
    pub fn background() -> Self {
        Self::with_cancellation(None, CancellationToken::new())
    }

    pub fn with_cancellation(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the context is already cancelled or past its deadline.
    pub fn check(&self, stage: &str) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled(stage.to_string()));
        }
        if matches!(self.deadline, Some(d) if Instant::now() >= d) {
            return Err(AppError::DeadlineExceeded(stage.to_string()));
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    ///
    /// On abort the future is dropped and `Cancelled`/`DeadlineExceeded` names `stage`.
    pub async fn run<T, E, F>(&self, stage: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<AppError>,
    {
        self.check(stage)?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled(stage.to_string())),
            _ = sleep_until(self.deadline) => Err(AppError::DeadlineExceeded(stage.to_string())),
            result = fut => result.map_err(Into::into),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        let value = ctx
            .run("staging", async { Ok::<_, AppError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .run("staging", async {
                Err::<(), _>(AppError::Storage("disk".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn test_run_hits_deadline() {
        let ctx = RequestContext::new(Duration::from_millis(50));
        let err = ctx
            .run("streaming", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AppError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeadlineExceeded(ref s) if s == "streaming"));
        assert!(ctx.check("committing").is_err());
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_work() {
        let ctx = RequestContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = ctx
            .run("streaming", std::future::pending::<Result<(), AppError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled(ref s) if s == "streaming"));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_check_on_cancelled_context() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::with_cancellation(None, token);
        assert!(matches!(ctx.check("staging"), Err(AppError::Cancelled(_))));
    }
}
