//! Shared per-request state handed to every stage

use crate::config::PipelineConfig;
use crate::sandbox::Sandbox;
use crate::{CbzError, Result};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a stage needs: the HTTP client, the request's sandbox, the pipeline
/// settings and the request's cancellation scope
#[derive(Clone)]
pub(crate) struct PipelineContext {
    pub client: Client,
    pub sandbox: Arc<Sandbox>,
    pub config: Arc<PipelineConfig>,
    pub token: CancellationToken,
}

impl PipelineContext {
    /// Runs `operation` unless the request is cancelled first
    ///
    /// On cancellation the operation is dropped, which aborts any in-flight network
    /// or file I/O it was waiting on.
    pub async fn cancellable<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CbzError::Cancelled),
            result = operation => result,
        }
    }

    /// Sends `value` downstream, giving up on cancellation
    ///
    /// A closed receiver means the consumer is gone, which only happens when the
    /// request is unwinding.
    pub async fn send<T>(&self, tx: &mpsc::Sender<T>, value: T) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CbzError::Cancelled),
            sent = tx.send(value) => sent.map_err(|_| CbzError::Cancelled),
        }
    }

    /// Receives the next value, or `None` once every sender is gone
    pub async fn recv<T>(&self, rx: &mut mpsc::Receiver<T>) -> Result<Option<T>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CbzError::Cancelled),
            value = rx.recv() => Ok(value),
        }
    }

    /// Cancels the request if `result` is a failure, then hands it back
    ///
    /// Stages call this before dropping their output senders so downstream never
    /// mistakes a failure for the end of its input.
    pub fn escalate<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !self.token.is_cancelled() {
                tracing::warn!("Cancelling request: {}", e);
            }
            self.token.cancel();
        }
        result
    }
}
