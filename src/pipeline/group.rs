//! Fail-fast task groups
//!
//! A [`TaskGroup`] runs futures as tokio tasks under a concurrency limit and a
//! shared cancellation token. The first task that fails cancels the token, which
//! every other task in the request observes at its next suspension point. Joining
//! the group waits for every task and reports the first real error, never the
//! cancellation errors that error caused in its siblings.

use crate::{CbzError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// A set of sibling tasks that share one cancellation scope
pub struct TaskGroup {
    token: CancellationToken,
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<()>>,
}

impl TaskGroup {
    /// Creates a group that runs at most `limit` tasks at a time
    ///
    /// # Arguments
    ///
    /// * `token` - The cancellation scope shared with the rest of the request
    /// * `limit` - Maximum number of tasks running at once (at least 1)
    pub fn new(token: CancellationToken, limit: usize) -> Self {
        Self {
            token,
            permits: Arc::new(Semaphore::new(limit.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Waits for a free slot and spawns `task` into it
    ///
    /// Returns `false` without spawning when the scope is cancelled while waiting;
    /// callers should stop submitting and [`TaskGroup::wait`] for the cause.
    pub async fn spawn<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let token = self.token.clone();
        self.tasks.spawn(
            async move {
                let result = task.await;
                drop(permit);
                if result.is_err() {
                    token.cancel();
                }
                result
            }
            .in_current_span(),
        );
        true
    }

    /// Waits for every task and returns the first error
    ///
    /// A real failure takes precedence over the cancellation errors it caused. If no
    /// task failed but the scope was cancelled from outside, the group reports
    /// [`CbzError::Cancelled`].
    pub async fn wait(mut self) -> Result<()> {
        let mut first: Option<CbzError> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(CbzError::Cancelled),
            };

            if let Err(err) = result {
                self.token.cancel();
                first = match first {
                    None => Some(err),
                    Some(prev) if prev.is_cancelled() && !err.is_cancelled() => Some(err),
                    Some(prev) => Some(prev),
                };
            }
        }

        match first {
            Some(err) => Err(err),
            None if self.token.is_cancelled() => Err(CbzError::Cancelled),
            None => Ok(()),
        }
    }
}
