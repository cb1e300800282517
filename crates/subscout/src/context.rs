use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation shared by every task of one target-domain scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ScanContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the scan is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_marks_context_done() {
        let ctx = ScanContext::new(Duration::from_millis(20));
        assert!(!ctx.is_done());
        ctx.done().await;
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn cancel_reaches_clones() {
        let ctx = ScanContext::unbounded();
        let clone = ctx.clone();
        ctx.cancel();
        clone.done().await;
        assert!(clone.is_done());
    }
}

// endregion:     --- Tests
