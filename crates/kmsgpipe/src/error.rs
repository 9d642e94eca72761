//! Error types for ring and pipe operations.

use thiserror::Error;

/// Errors reported by [`MessageRing`](crate::MessageRing) operations.
///
/// Every variant is a precondition violation the caller can act on: retry
/// after waiting, reject the request, or escalate. None of them leave the
/// ring partially modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// Bad geometry or storage passed to `init`, or an output buffer that
    /// cannot hold the message at the read cursor.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Payload is longer than the slot size.
    #[error("message of {len} bytes exceeds slot size of {max} bytes")]
    MessageTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Configured slot size.
        max: usize,
    },

    /// The slot at `head` still holds an unconsumed message.
    #[error("ring buffer is full")]
    BufferFull,

    /// The slot at `tail` holds no message.
    #[error("no message available")]
    NoData,

    /// The requester may not read the message at `tail`.
    #[error("access denied")]
    AccessDenied,
}

impl RingError {
    /// Returns `true` if waiting and retrying may succeed (`BufferFull`, `NoData`).
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BufferFull | Self::NoData)
    }

    /// The errno (positive) a driver layer would report for this error.
    #[cfg(unix)]
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => libc::EINVAL,
            Self::MessageTooLarge { .. } => libc::EMSGSIZE,
            Self::BufferFull => libc::ENOSPC,
            Self::NoData => libc::ENODATA,
            Self::AccessDenied => libc::EACCES,
        }
    }
}

/// Errors reported by the blocking [`Pipe`](crate::Pipe) layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipeError {
    /// The underlying ring rejected the operation.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// Non-blocking call found the ring full (send) or empty (recv).
    #[error("operation would block")]
    WouldBlock,

    /// The deadline passed before space or data became available.
    #[error("timed out waiting on the pipe")]
    Timeout,

    /// The pipe has been closed.
    #[error("pipe is closed")]
    Closed,

    /// A privileged operation was requested by an unprivileged caller.
    #[error("operation requires privileged credentials")]
    PermissionDenied,
}

impl PipeError {
    /// Returns `true` if this is a recoverable error (retry may succeed).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Ring(e) => e.is_transient(),
            Self::WouldBlock | Self::Timeout => true,
            Self::Closed | Self::PermissionDenied => false,
        }
    }

    /// Returns `true` if the pipe is permanently unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    #[cfg(unix)]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Ring(e) => e.errno(),
            Self::WouldBlock => libc::EAGAIN,
            Self::Timeout => libc::ETIMEDOUT,
            Self::Closed => libc::EPIPE,
            Self::PermissionDenied => libc::EPERM,
        }
    }
}
