//! kmsgpipe - Access-Controlled Message Pipe
//!
//! A bounded FIFO of discrete messages shared between local users. Every
//! message is stamped with its writer's uid/gid and a timestamp; a reader may
//! only consume the oldest message if it is root, the owner, or shares the
//! owner's group. Messages that sit in the pipe longer than the configured
//! expiry are dropped by a background reaper.
//!
//! # Layers
//!
//! - [`MessageRing`]: the single-threaded slot ring. Fixed-size slots,
//!   parallel record array, never overwrites. Works over borrowed or owned
//!   storage.
//! - [`Pipe`]: one lock around an [`OwnedRing`], blocking/non-blocking/timed
//!   send and receive, privileged control operations and statistics.
//! - [`Reaper`]: a thread that calls [`Pipe::cleanup_expired`] once per
//!   expiry interval.
//!
//! # Example
//!
//! ```
//! use kmsgpipe::{Credentials, Pipe, PipeConfig, RingConfig};
//! use std::sync::Arc;
//!
//! let pipe = Arc::new(Pipe::new(PipeConfig::new(RingConfig::new(8, 256))).unwrap());
//! let alice = Credentials::new(1000, 1000);
//!
//! pipe.send(alice, b"hello").unwrap();
//! assert_eq!(pipe.message_count(), 1);
//!
//! // Someone outside alice's uid and gid can't take her message.
//! let mut buf = [0u8; 256];
//! assert!(pipe.try_recv(Credentials::new(2000, 2000), &mut buf).is_err());
//!
//! let n = pipe.recv(alice, &mut buf).unwrap();
//! assert_eq!(&buf[..n], b"hello");
//! ```

mod clock;
mod config;
mod error;
mod invariants;
mod pipe;
mod reaper;
mod record;
mod ring;
mod stats;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::{
    PipeConfig, RingConfig, DEFAULT_EXPIRY, LARGE_MESSAGES_CONFIG, SMALL_MESSAGES_CONFIG,
};
pub use error::{PipeError, RingError};
pub use pipe::Pipe;
pub use reaper::Reaper;
pub use record::{Credentials, Gid, MessageRecord, Uid, MAX_DATA_SIZE, ROOT_UID};
pub use ring::{BorrowedRing, MessageRing, OwnedRing, RingState};
pub use stats::PipeStats;
