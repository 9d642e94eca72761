//! Async front end for a blocking `Pipe`.

use crate::config::StreamConfig;
use crate::error::StreamError;
use futures_core::Stream;
use kmsgpipe::{Clock, Credentials, MonotonicClock, Pipe, PipeConfig, PipeError, PipeStats};
use tokio::sync::Notify;

/// A message pipe usable from async tasks.
///
/// Wraps a [`Pipe`] and only ever calls its non-blocking operations, so no
/// executor thread is parked on the pipe's condition variables. Waiting
/// tasks are woken through `Notify`:
///
/// - `data` is signalled after every successful send,
/// - `space` after every receive, clear, expiry sweep or close.
///
/// Changes made through [`pipe()`](Self::pipe) by blocking threads are picked
/// up within [`StreamConfig::poll_interval`].
pub struct AsyncPipe<C = MonotonicClock> {
    pipe: Pipe<C>,
    data: Notify,
    space: Notify,
    config: StreamConfig,
}

impl AsyncPipe<MonotonicClock> {
    /// Creates an async pipe with the default stream configuration.
    pub fn new(config: PipeConfig) -> Result<Self, StreamError> {
        Ok(Self::from_pipe(Pipe::new(config)?, StreamConfig::default()))
    }
}

impl<C: Clock> AsyncPipe<C> {
    /// Wraps an existing pipe.
    pub fn from_pipe(pipe: Pipe<C>, config: StreamConfig) -> Self {
        Self {
            pipe,
            data: Notify::new(),
            space: Notify::new(),
            config,
        }
    }

    /// The underlying blocking pipe, for sharing with non-async threads.
    pub fn pipe(&self) -> &Pipe<C> {
        &self.pipe
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn message_count(&self) -> usize {
        self.pipe.message_count()
    }

    pub fn stats(&self) -> PipeStats {
        self.pipe.stats()
    }

    pub fn is_closed(&self) -> bool {
        self.pipe.is_closed()
    }

    // ---------------------------------------------------------------------
    // SEND
    // ---------------------------------------------------------------------

    /// Writes one message without waiting.
    ///
    /// Fails with `Full` if the ring has no free slot.
    pub fn try_send(&self, creds: Credentials, data: &[u8]) -> Result<usize, StreamError> {
        match self.pipe.try_send(creds, data) {
            Ok(n) => {
                self.data.notify_waiters();
                Ok(n)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes one message, waiting for a free slot.
    ///
    /// Oversized messages fail immediately.
    pub async fn send(&self, creds: Credentials, data: &[u8]) -> Result<usize, StreamError> {
        self.wait_on(&self.space, || match self.try_send(creds, data) {
            Err(StreamError::Full) => None,
            other => Some(other),
        })
        .await
    }

    // ---------------------------------------------------------------------
    // RECEIVE
    // ---------------------------------------------------------------------

    /// Takes the oldest message without waiting.
    ///
    /// Fails with `Empty` if there is nothing to read, or `Closed` once the
    /// pipe is closed and drained.
    pub fn try_recv(&self, creds: Credentials) -> Result<Vec<u8>, StreamError> {
        let mut buf = vec![0u8; self.pipe.data_size()];
        match self.pipe.try_recv(creds, &mut buf) {
            Ok(n) => {
                buf.truncate(n);
                self.space.notify_waiters();
                Ok(buf)
            }
            Err(PipeError::WouldBlock) => Err(StreamError::Empty),
            Err(e) => Err(e.into()),
        }
    }

    /// Takes the oldest message, waiting for one to arrive.
    pub async fn recv(&self, creds: Credentials) -> Result<Vec<u8>, StreamError> {
        self.wait_on(&self.data, || match self.try_recv(creds) {
            Err(StreamError::Empty) => None,
            other => Some(other),
        })
        .await
    }

    /// Stream of messages readable by `creds`.
    ///
    /// Ends once the pipe is closed and drained. Any other error is yielded
    /// once and then ends the stream; a message the reader may not take
    /// would otherwise be reported forever.
    pub fn messages(
        &self,
        creds: Credentials,
    ) -> impl Stream<Item = Result<Vec<u8>, StreamError>> + '_ {
        futures_util::stream::unfold(Some(self), move |state| async move {
            let pipe = state?;
            match pipe.recv(creds).await {
                Ok(msg) => Some((Ok(msg), Some(pipe))),
                Err(StreamError::Closed) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    // ---------------------------------------------------------------------
    // CONTROL
    // ---------------------------------------------------------------------

    /// Discards every message. Privileged.
    pub fn clear(&self, creds: Credentials) -> Result<usize, StreamError> {
        let n = self.pipe.clear(creds)?;
        self.space.notify_waiters();
        Ok(n)
    }

    /// Drops expired messages and wakes waiting senders if any were removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.pipe.cleanup_expired();
        if removed > 0 {
            self.space.notify_waiters();
        }
        removed
    }

    /// Closes the pipe and wakes every waiting task.
    pub fn close(&self) {
        self.pipe.close();
        self.data.notify_waiters();
        self.space.notify_waiters();
    }

    /// Retries `attempt` until it yields a result, sleeping on `notify`
    /// between tries.
    ///
    /// The `Notified` future is enabled before each attempt so a signal sent
    /// between the attempt and the await is not lost. The poll interval
    /// bounds the wait when a change bypasses this adapter.
    async fn wait_on<T>(
        &self,
        notify: &Notify,
        mut attempt: impl FnMut() -> Option<Result<T, StreamError>>,
    ) -> Result<T, StreamError> {
        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = attempt() {
                return result;
            }

            tokio::select! {
                () = &mut notified => {}
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

impl<C> std::fmt::Debug for AsyncPipe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPipe")
            .field("pipe", &self.pipe)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
