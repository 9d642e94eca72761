//! Expiry sweeps on the tokio runtime.

use crate::error::StreamError;
use crate::pipe::AsyncPipe;
use kmsgpipe::{Clock, RingError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Spawns a task that calls [`AsyncPipe::cleanup_expired`] every `every`.
///
/// The task holds a weak reference and exits once the pipe is closed or the
/// last `Arc` is dropped. Abort the handle to stop it sooner.
///
/// Fails with `InvalidArgument` if `every` is zero.
pub fn spawn_reaper<C: Clock + 'static>(
    pipe: &Arc<AsyncPipe<C>>,
    every: Duration,
) -> Result<JoinHandle<()>, StreamError> {
    if every.is_zero() {
        return Err(RingError::InvalidArgument("reaper interval must be non-zero").into());
    }
    let pipe = Arc::downgrade(pipe);

    Ok(tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(pipe) = pipe.upgrade() else { break };
            if pipe.is_closed() {
                break;
            }
            let removed = pipe.cleanup_expired();
            log::trace!("async reaper sweep removed {} messages", removed);
        }
        log::debug!("async reaper exiting");
    }))
}
