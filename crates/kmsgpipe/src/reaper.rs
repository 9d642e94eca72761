//! Background expiry of old messages.
//!
//! A [`Reaper`] is a named thread that calls [`Pipe::cleanup_expired`] once
//! per expiry interval. It only holds a weak reference, so dropping the last
//! `Arc<Pipe>` ends it on its next wake-up; closing the pipe does too.

use crate::clock::Clock;
use crate::Pipe;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct ReaperShared {
    stopped: Mutex<bool>,
    wake: Condvar,
    sweeps: AtomicU64,
}

/// Handle to a running reaper thread.
///
/// Stops and joins the thread on [`stop`](Self::stop) or drop.
pub struct Reaper {
    shared: Arc<ReaperShared>,
    handle: Option<JoinHandle<()>>,
}

impl<C: Clock + 'static> Pipe<C> {
    /// Starts a thread that expires old messages every expiry interval.
    ///
    /// The interval is re-read before each sleep, so
    /// [`set_expiry`](Self::set_expiry) takes effect after the current one.
    pub fn spawn_reaper(self: &Arc<Self>) -> io::Result<Reaper> {
        let pipe = Arc::downgrade(self);
        let shared = Arc::new(ReaperShared::default());
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("kmsgpipe-reaper".into())
            .spawn(move || run(&pipe, &thread_shared))?;

        log::debug!("reaper started (interval {:?})", self.expiry());
        Ok(Reaper {
            shared,
            handle: Some(handle),
        })
    }
}

fn run<C: Clock>(pipe: &Weak<Pipe<C>>, shared: &ReaperShared) {
    loop {
        // The strong ref must not live across the sleep.
        let interval = match pipe.upgrade() {
            Some(p) if !p.is_closed() => p.expiry(),
            _ => break,
        };

        {
            let mut stopped = shared.stopped.lock();
            if !*stopped {
                shared.wake.wait_for(&mut stopped, interval);
            }
            if *stopped {
                break;
            }
        }

        let Some(pipe) = pipe.upgrade() else { break };
        let removed = pipe.cleanup_expired();
        shared.sweeps.fetch_add(1, Ordering::Relaxed);
        log::trace!("reaper sweep removed {} messages", removed);
    }
    log::debug!("reaper exiting");
}

impl Reaper {
    /// Number of sweeps completed so far.
    pub fn sweeps(&self) -> u64 {
        self.shared.sweeps.load(Ordering::Relaxed)
    }

    /// Whether the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signals the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.shared.stopped.lock() = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("reaper thread panicked");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Reaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaper")
            .field("sweeps", &self.sweeps())
            .field("finished", &self.is_finished())
            .finish()
    }
}
