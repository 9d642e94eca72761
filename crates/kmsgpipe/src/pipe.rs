use crate::clock::{Clock, MonotonicClock};
use crate::record::Credentials;
use crate::ring::OwnedRing;
use crate::{PipeConfig, PipeError, PipeStats, RingError};
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

// =============================================================================
// LOCKING & WAKE-UP PROTOCOL
// =============================================================================
//
// One mutex guards the whole ring; every ring operation runs under it.
//
// **Writer:** lock → while full: wait on `writable` → push → unlock →
//   wake all `readable` waiters.
// **Reader:** lock → while empty: wait on `readable` → pop → unlock →
//   wake all `writable` waiters.
// **Expiry / clear:** lock → drop messages → unlock → wake `writable`.
//
// Waiters re-check their condition after every wake-up, so waking more
// threads than there are slots or messages is harmless. `close()` flips the
// flag while holding the lock so a waiter cannot miss it between its check
// and its wait.
//
// =============================================================================

/// Whole milliseconds of `expiry`, rejecting zero and anything past `u64::MAX`.
fn expiry_millis(expiry: Duration) -> Result<u64, PipeError> {
    match u64::try_from(expiry.as_millis()) {
        Ok(0) => Err(RingError::InvalidArgument("expiry must be at least 1ms").into()),
        Ok(ms) => Ok(ms),
        Err(_) => Err(RingError::InvalidArgument("expiry exceeds u64 milliseconds").into()),
    }
}

/// How long a send/recv is willing to wait for space or data.
#[derive(Debug, Clone, Copy)]
enum Wait {
    NonBlocking,
    Forever,
    Until(Instant),
}

/// A blocking, access-controlled message pipe over a [`MessageRing`](crate::MessageRing).
///
/// Writers block while the ring is full, readers block while it is empty.
/// Each message is stamped with the writer's credentials and the pipe's
/// clock; [`cleanup_expired`](Self::cleanup_expired) (or a
/// [`Reaper`](crate::Reaper)) drops messages older than the configured expiry.
///
/// `Pipe` is `Sync`; share it with `Arc`.
pub struct Pipe<C = MonotonicClock> {
    ring: Mutex<OwnedRing>,
    /// Readers park here until a push lands
    readable: Condvar,
    /// Writers park here until a slot frees up
    writable: Condvar,
    readers_waiting: CachePadded<AtomicUsize>,
    writers_waiting: CachePadded<AtomicUsize>,
    expiry_ms: AtomicU64,
    closed: AtomicBool,
    clock: C,
    capacity: usize,
    data_size: usize,
}

impl Pipe<MonotonicClock> {
    /// Creates a pipe stamped by a [`MonotonicClock`].
    pub fn new(config: PipeConfig) -> Result<Self, PipeError> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> Pipe<C> {
    /// Creates a pipe that stamps messages with `clock`.
    pub fn with_clock(config: PipeConfig, clock: C) -> Result<Self, PipeError> {
        config.validate()?;
        let ring = OwnedRing::with_config(config.ring)?;
        let expiry_ms = expiry_millis(config.expiry)?;

        log::info!(
            "message pipe created (capacity={}, data_size={}, expiry_ms={})",
            config.ring.capacity,
            config.ring.data_size,
            expiry_ms
        );

        Ok(Self {
            ring: Mutex::new(ring),
            readable: Condvar::new(),
            writable: Condvar::new(),
            readers_waiting: CachePadded::new(AtomicUsize::new(0)),
            writers_waiting: CachePadded::new(AtomicUsize::new(0)),
            expiry_ms: AtomicU64::new(expiry_ms),
            closed: AtomicBool::new(false),
            clock,
            capacity: config.ring.capacity,
            data_size: config.ring.data_size,
        })
    }

    // ---------------------------------------------------------------------
    // GEOMETRY & STATUS
    // ---------------------------------------------------------------------

    /// Number of message slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum bytes per message.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Number of live messages (takes the lock, O(capacity)).
    pub fn message_count(&self) -> usize {
        self.ring.lock().message_count()
    }

    /// Threads currently blocked in a receive.
    #[inline]
    pub fn readers_waiting(&self) -> usize {
        self.readers_waiting.load(Ordering::Relaxed)
    }

    /// Threads currently blocked in a send.
    #[inline]
    pub fn writers_waiting(&self) -> usize {
        self.writers_waiting.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current message expiry.
    pub fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms.load(Ordering::Relaxed))
    }

    /// Clock used to stamp messages.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Snapshot of geometry, occupancy, waiters and expiry.
    pub fn stats(&self) -> PipeStats {
        let message_count = self.message_count();
        PipeStats {
            capacity: self.capacity,
            data_size: self.data_size,
            message_count,
            readers_waiting: self.readers_waiting(),
            writers_waiting: self.writers_waiting(),
            expiry_ms: self.expiry_ms.load(Ordering::Relaxed),
        }
    }

    /// Runs `f` against the ring under the pipe's lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&OwnedRing) -> R) -> R {
        f(&*self.ring.lock())
    }

    // ---------------------------------------------------------------------
    // WRITER API
    // ---------------------------------------------------------------------

    /// Writes one message, blocking while the ring is full.
    ///
    /// An oversized message fails immediately instead of waiting for space
    /// it could never use.
    pub fn send(&self, creds: Credentials, data: &[u8]) -> Result<usize, PipeError> {
        self.send_with(creds, data, Wait::Forever)
    }

    /// Writes one message or fails with `WouldBlock` if the ring is full.
    pub fn try_send(&self, creds: Credentials, data: &[u8]) -> Result<usize, PipeError> {
        self.send_with(creds, data, Wait::NonBlocking)
    }

    /// Like [`send`](Self::send), giving up with `Timeout` after `timeout`.
    pub fn send_timeout(
        &self,
        creds: Credentials,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, PipeError> {
        self.send_with(creds, data, Wait::Until(Instant::now() + timeout))
    }

    fn send_with(&self, creds: Credentials, data: &[u8], wait: Wait) -> Result<usize, PipeError> {
        if data.len() > self.data_size {
            log::debug!(
                "rejected {} byte message from uid {} (slot size {})",
                data.len(),
                creds.uid,
                self.data_size
            );
            return Err(RingError::MessageTooLarge {
                len: data.len(),
                max: self.data_size,
            }
            .into());
        }

        let mut ring = self.ring.lock();
        loop {
            if self.is_closed() {
                return Err(PipeError::Closed);
            }
            if !ring.is_full() {
                break;
            }
            Self::park(&self.writable, &self.writers_waiting, &mut ring, wait)?;
        }

        let timestamp = self.clock.now_ms();
        let written = ring
            .push(data, creds.uid, creds.gid, timestamp)
            .inspect_err(|e| log::debug!("push from uid {} failed: {}", creds.uid, e))?;
        drop(ring);

        self.readable.notify_all();
        Ok(written)
    }

    // ---------------------------------------------------------------------
    // READER API
    // ---------------------------------------------------------------------

    /// Reads the oldest message into `out`, blocking while the pipe is empty.
    ///
    /// Fails with `AccessDenied` (without consuming) if the oldest message
    /// belongs to someone else. Once the pipe is closed, remaining messages
    /// are still delivered; `Closed` is returned when none are left.
    pub fn recv(&self, creds: Credentials, out: &mut [u8]) -> Result<usize, PipeError> {
        self.recv_with(creds, out, Wait::Forever)
    }

    /// Reads the oldest message or fails with `WouldBlock` if there is none.
    pub fn try_recv(&self, creds: Credentials, out: &mut [u8]) -> Result<usize, PipeError> {
        self.recv_with(creds, out, Wait::NonBlocking)
    }

    /// Like [`recv`](Self::recv), giving up with `Timeout` after `timeout`.
    pub fn recv_timeout(
        &self,
        creds: Credentials,
        out: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, PipeError> {
        self.recv_with(creds, out, Wait::Until(Instant::now() + timeout))
    }

    /// Blocking receive into a freshly allocated buffer.
    pub fn recv_message(&self, creds: Credentials) -> Result<Vec<u8>, PipeError> {
        let mut buf = vec![0u8; self.data_size];
        let n = self.recv(creds, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn recv_with(
        &self,
        creds: Credentials,
        out: &mut [u8],
        wait: Wait,
    ) -> Result<usize, PipeError> {
        let mut ring = self.ring.lock();
        loop {
            if !ring.is_empty() {
                break;
            }
            if self.is_closed() {
                return Err(PipeError::Closed);
            }
            Self::park(&self.readable, &self.readers_waiting, &mut ring, wait)?;
        }

        let read = ring
            .pop(out, creds.uid, creds.gid)
            .inspect_err(|e| log::debug!("pop by uid {} failed: {}", creds.uid, e))?;
        drop(ring);

        self.writable.notify_all();
        Ok(read)
    }

    /// Blocks on `cv` once, counting the caller in `waiting` while parked.
    ///
    /// Returns `WouldBlock` for non-blocking callers and `Timeout` once the
    /// deadline has passed; the caller re-checks its condition otherwise.
    fn park(
        cv: &Condvar,
        waiting: &AtomicUsize,
        ring: &mut MutexGuard<'_, OwnedRing>,
        wait: Wait,
    ) -> Result<(), PipeError> {
        match wait {
            Wait::NonBlocking => Err(PipeError::WouldBlock),
            Wait::Forever => {
                waiting.fetch_add(1, Ordering::Relaxed);
                cv.wait(ring);
                waiting.fetch_sub(1, Ordering::Relaxed);
                Ok(())
            }
            Wait::Until(deadline) => {
                if Instant::now() >= deadline {
                    return Err(PipeError::Timeout);
                }
                waiting.fetch_add(1, Ordering::Relaxed);
                cv.wait_until(ring, deadline);
                waiting.fetch_sub(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    // ---------------------------------------------------------------------
    // RETENTION & CONTROL
    // ---------------------------------------------------------------------

    /// Drops messages older than the expiry, measured on the pipe's clock.
    ///
    /// Returns the number removed; writers are woken if any were.
    pub fn cleanup_expired(&self) -> usize {
        let expiry_ms = self.expiry_ms.load(Ordering::Relaxed);
        let mut ring = self.ring.lock();
        let cutoff = self.clock.now_ms().saturating_sub(expiry_ms);
        let removed = ring.cleanup_expired(cutoff);
        drop(ring);

        if removed > 0 {
            log::debug!("expired {} messages (cutoff {})", removed, cutoff);
            self.writable.notify_all();
        }
        removed
    }

    /// Changes the message expiry. Privileged.
    pub fn set_expiry(&self, creds: Credentials, expiry: Duration) -> Result<(), PipeError> {
        if !creds.is_privileged() {
            return Err(PipeError::PermissionDenied);
        }
        let expiry_ms = expiry_millis(expiry)?;
        self.expiry_ms.store(expiry_ms, Ordering::Relaxed);
        log::info!("message expiry set to {} ms", expiry_ms);
        Ok(())
    }

    /// Discards every message. Privileged.
    ///
    /// Returns the number of messages discarded.
    pub fn clear(&self, creds: Credentials) -> Result<usize, PipeError> {
        if !creds.is_privileged() {
            return Err(PipeError::PermissionDenied);
        }
        let previous = self.ring.lock().clear();
        self.writable.notify_all();
        log::info!("pipe cleared ({} messages discarded)", previous);
        Ok(previous)
    }

    /// Closes the pipe and wakes every blocked sender and receiver.
    ///
    /// Sends fail with `Closed` from now on; receivers drain what is left.
    pub fn close(&self) {
        {
            let _ring = self.ring.lock();
            self.closed.store(true, Ordering::Release);
        }
        self.readable.notify_all();
        self.writable.notify_all();
    }
}

impl<C> std::fmt::Debug for Pipe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("capacity", &self.capacity)
            .field("data_size", &self.data_size)
            .field("expiry_ms", &self.expiry_ms.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
