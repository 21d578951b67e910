//! The series archive as a byte stream
//!
//! The aggregator writes into one end of an in-memory pipe and [`SeriesStream`]
//! reads from the other. Once the writer's end is closed the stream waits for the
//! pipeline's outcome: success ends the stream, failure is yielded as a final error
//! item. Dropping the stream cancels the request.

use crate::{CbzError, Result};
use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::DuplexStream;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tokio_util::sync::DropGuard;

/// Byte stream of a series archive that is still being built
pub struct SeriesStream {
    reader: ReaderStream<DuplexStream>,
    outcome: Option<oneshot::Receiver<Result<()>>>,
    _cancel_on_drop: DropGuard,
}

impl SeriesStream {
    pub(crate) fn new(
        reader: DuplexStream,
        outcome: oneshot::Receiver<Result<()>>,
        cancel_on_drop: DropGuard,
    ) -> Self {
        Self {
            reader: ReaderStream::new(reader),
            outcome: Some(outcome),
            _cancel_on_drop: cancel_on_drop,
        }
    }
}

impl Stream for SeriesStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(&mut this.reader).poll_next(cx)) {
            Some(Ok(chunk)) => return Poll::Ready(Some(Ok(chunk))),
            Some(Err(e)) => {
                this.outcome = None;
                return Poll::Ready(Some(Err(CbzError::Io(e))));
            }
            None => {}
        }

        // Writer closed: the pipeline has finished or failed
        let result = ready!(Pin::new(outcome).poll(cx));
        this.outcome = None;

        match result {
            Ok(Ok(())) => Poll::Ready(None),
            Ok(Err(e)) => Poll::Ready(Some(Err(e))),
            Err(_) => Poll::Ready(Some(Err(CbzError::Cancelled))),
        }
    }
}
