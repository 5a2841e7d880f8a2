use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::stream::{FusedStream, Stream};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Span};

use crate::cancel::CancelFlag;
use crate::config::FailurePolicy;
use crate::engine::EngineInner;
use crate::types::EmbeddingVector;
use crate::EmbedError;

type ChunkResult = Result<Vec<EmbeddingVector>, EmbedError>;

/// Where an [`EmbeddingStream`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, nothing dispatched yet.
    Idle,
    /// A chunk is running on the blocking pool and nothing is buffered.
    Processing,
    /// Handing out buffered results of a finished chunk.
    Yielding,
    /// Every chunk was consumed.
    Done,
    /// Cancellation was observed and reported.
    Cancelled,
    /// A terminal error was reported.
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamState::Done | StreamState::Cancelled | StreamState::Failed
        )
    }
}

struct InFlight {
    len: usize,
    handle: JoinHandle<ChunkResult>,
}

/// Lazy, ordered, single-pass sequence of embeddings.
///
/// At most one chunk is computed ahead of the consumer: chunk `i + 1` is
/// dispatched once the first result of chunk `i` has been taken. Dropping
/// the stream detaches any running chunk; its result is discarded.
pub struct EmbeddingStream {
    engine: Arc<EngineInner>,
    chunks: VecDeque<Vec<String>>,
    ready: VecDeque<Result<EmbeddingVector, EmbedError>>,
    in_flight: Option<InFlight>,
    cancel: CancelFlag,
    state: StreamState,
    total_chunks: usize,
    span: Span,
}

impl EmbeddingStream {
    pub(crate) fn new(
        engine: Arc<EngineInner>,
        chunks: Vec<Vec<String>>,
        cancel: CancelFlag,
        span: Span,
    ) -> Self {
        let total_chunks = chunks.len();
        Self {
            engine,
            chunks: chunks.into(),
            ready: VecDeque::new(),
            in_flight: None,
            cancel,
            state: StreamState::Idle,
            total_chunks,
            span,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of chunks the input was split into.
    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    fn dispatch_next(&mut self) -> Result<(), EmbedError> {
        if self.chunks.is_empty() {
            return Ok(());
        }
        self.cancel.check()?;
        let pipeline = self.engine.pipeline()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EmbedError::Worker(e.to_string()))?;
        let Some(texts) = self.chunks.pop_front() else {
            return Ok(());
        };

        let len = texts.len();
        let cancel = self.cancel.clone();
        let handle = runtime.spawn_blocking(move || pipeline.embed_chunk(&texts, &cancel));
        debug!(
            chunk = self.total_chunks - self.chunks.len() - 1,
            items = len,
            "embed_chunk_dispatched"
        );
        self.in_flight = Some(InFlight { len, handle });
        Ok(())
    }

    /// Starts the next chunk early. A failure leaves the chunk queued and
    /// resurfaces once the buffer drains.
    fn prefetch(&mut self) {
        if self.in_flight.is_none() && self.dispatch_next().is_err() {
            debug!(queued = self.chunks.len(), "embed_prefetch_deferred");
        }
    }

    fn absorb(&mut self, len: usize, result: ChunkResult) -> Result<(), EmbedError> {
        match result {
            Ok(vectors) => {
                self.ready.extend(vectors.into_iter().map(Ok));
                Ok(())
            }
            Err(err) if err.is_chunk_recoverable() => {
                match self.engine.failure_policy() {
                    FailurePolicy::Report => {
                        warn!(items = len, error = %err, "embed_chunk_failed");
                        self.ready.extend(std::iter::repeat_n(err, len).map(Err));
                    }
                    FailurePolicy::Skip => {
                        warn!(items = len, error = %err, "embed_chunk_skipped");
                    }
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Ends the stream, reporting `err` as its last item.
    fn terminate(&mut self, err: EmbedError) -> Poll<Option<<Self as Stream>::Item>> {
        self.state = if matches!(err, EmbedError::Cancelled) {
            StreamState::Cancelled
        } else {
            StreamState::Failed
        };
        self.chunks.clear();
        self.ready.clear();
        self.in_flight = None;
        warn!(state = ?self.state, error = %err, "embed_stream_terminated");
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for EmbeddingStream {
    type Item = Result<EmbeddingVector, EmbedError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let span = this.span.clone();
        let _entered = span.enter();

        loop {
            if this.state.is_terminal() {
                return Poll::Ready(None);
            }
            if this.ready.is_empty() && this.in_flight.is_none() && this.chunks.is_empty() {
                this.state = StreamState::Done;
                debug!(chunks = this.total_chunks, "embed_stream_complete");
                return Poll::Ready(None);
            }
            if this.cancel.is_cancelled() {
                return this.terminate(EmbedError::Cancelled);
            }

            if let Some(item) = this.ready.pop_front() {
                this.prefetch();
                this.state = StreamState::Yielding;
                return Poll::Ready(Some(item));
            }

            if let Some(in_flight) = this.in_flight.as_mut() {
                let joined = match Pin::new(&mut in_flight.handle).poll(cx) {
                    Poll::Ready(joined) => joined,
                    Poll::Pending => {
                        this.state = StreamState::Processing;
                        return Poll::Pending;
                    }
                };
                let len = in_flight.len;
                this.in_flight = None;

                let result = match joined {
                    Ok(result) => result,
                    Err(join_err) => {
                        return this.terminate(EmbedError::Worker(join_err.to_string()));
                    }
                };
                if let Err(err) = this.absorb(len, result) {
                    return this.terminate(err);
                }
                continue;
            }

            if let Err(err) = this.dispatch_next() {
                return this.terminate(err);
            }
            this.state = StreamState::Processing;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.state.is_terminal() {
            return (0, Some(0));
        }
        let queued: usize = self.chunks.iter().map(Vec::len).sum();
        let in_flight = self.in_flight.as_ref().map_or(0, |f| f.len);
        // Cancellation or a terminal error can add one item and cut the rest.
        (0, Some(self.ready.len() + in_flight + queued + 1))
    }
}

impl FusedStream for EmbeddingStream {
    fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }
}

impl std::fmt::Debug for EmbeddingStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStream")
            .field("state", &self.state)
            .field("total_chunks", &self.total_chunks)
            .field("queued_chunks", &self.chunks.len())
            .field("buffered", &self.ready.len())
            .finish()
    }
}
