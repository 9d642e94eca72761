//! Error types for async pipe operations.

use kmsgpipe::{PipeError, RingError};
use thiserror::Error;

/// Errors that can occur in async pipe operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The pipe is full and cannot accept more messages.
    #[error("pipe is full")]
    Full,

    /// The pipe holds no messages.
    #[error("pipe is empty")]
    Empty,

    /// The pipe has been closed.
    #[error("pipe is closed")]
    Closed,

    /// The ring rejected the message or the reader.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// A privileged operation was requested by an unprivileged caller.
    #[error("operation requires privileged credentials")]
    PermissionDenied,
}

impl From<PipeError> for StreamError {
    fn from(err: PipeError) -> Self {
        match err {
            PipeError::Ring(RingError::BufferFull) => Self::Full,
            PipeError::Ring(RingError::NoData) => Self::Empty,
            PipeError::Ring(e) => Self::Ring(e),
            // Receive paths map these to `Empty` before converting.
            PipeError::WouldBlock | PipeError::Timeout => Self::Full,
            PipeError::Closed => Self::Closed,
            PipeError::PermissionDenied => Self::PermissionDenied,
        }
    }
}

impl StreamError {
    /// Returns `true` if this is a recoverable error (e.g., `Full`).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Full | Self::Empty => true,
            Self::Ring(e) => e.is_transient(),
            Self::Closed | Self::PermissionDenied => false,
        }
    }

    /// Returns `true` if this error indicates the pipe is permanently unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
