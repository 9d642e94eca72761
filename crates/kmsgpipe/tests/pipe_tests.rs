//! Multi-threaded tests for the blocking pipe and its reaper.

use kmsgpipe::{Credentials, ManualClock, Pipe, PipeConfig, PipeError, RingConfig, RingError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const ALICE: Credentials = Credentials::new(1000, 1000);
const BOB: Credentials = Credentials::new(1001, 1001);

fn pipe(capacity: usize, data_size: usize) -> Arc<Pipe> {
    Arc::new(Pipe::new(PipeConfig::new(RingConfig::new(capacity, data_size))).unwrap())
}

/// Polls `cond` for up to five seconds.
fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_blocked_reader_wakes_on_send() {
    let pipe = pipe(4, 32);

    let reader = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || pipe.recv_message(ALICE))
    };

    assert!(eventually(|| pipe.readers_waiting() == 1));
    pipe.send(ALICE, b"wake up").unwrap();

    assert_eq!(reader.join().unwrap().unwrap(), b"wake up");
    assert_eq!(pipe.readers_waiting(), 0);
}

#[test]
fn test_blocked_writer_wakes_on_recv() {
    let pipe = pipe(1, 32);
    pipe.send(ALICE, b"first").unwrap();

    let writer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || pipe.send(ALICE, b"second"))
    };

    assert!(eventually(|| pipe.writers_waiting() == 1));
    assert_eq!(pipe.stats().writers_waiting, 1);
    assert_eq!(pipe.recv_message(ALICE).unwrap(), b"first");

    assert_eq!(writer.join().unwrap(), Ok(6));
    assert_eq!(pipe.recv_message(ALICE).unwrap(), b"second");
}

#[test]
fn test_blocked_writer_wakes_on_clear() {
    let pipe = pipe(1, 8);
    pipe.send(ALICE, b"x").unwrap();

    let writer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || pipe.send(BOB, b"y"))
    };

    assert!(eventually(|| pipe.writers_waiting() == 1));
    assert_eq!(pipe.clear(Credentials::ROOT), Ok(1));
    assert_eq!(writer.join().unwrap(), Ok(1));
    assert_eq!(pipe.message_count(), 1);
}

#[test]
fn test_blocked_writer_wakes_on_expiry() {
    let clock = Arc::new(ManualClock::new(0));
    let config = PipeConfig::new(RingConfig::new(1, 8)).with_expiry(Duration::from_millis(10));
    let pipe = Arc::new(Pipe::with_clock(config, Arc::clone(&clock)).unwrap());
    pipe.send(ALICE, b"stale").unwrap();

    let writer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || pipe.send(ALICE, b"fresh"))
    };

    assert!(eventually(|| pipe.writers_waiting() == 1));
    clock.set(50);
    assert_eq!(pipe.cleanup_expired(), 1);

    assert_eq!(writer.join().unwrap(), Ok(5));
    assert_eq!(pipe.recv_message(ALICE).unwrap(), b"fresh");
}

#[test]
fn test_close_wakes_blocked_threads() {
    let empty = pipe(1, 8);
    let full = pipe(1, 8);
    full.send(ALICE, b"x").unwrap();

    let reader = {
        let pipe = Arc::clone(&empty);
        thread::spawn(move || pipe.recv_message(ALICE))
    };
    let writer = {
        let pipe = Arc::clone(&full);
        thread::spawn(move || pipe.send(ALICE, b"y"))
    };

    assert!(eventually(|| empty.readers_waiting() == 1));
    assert!(eventually(|| full.writers_waiting() == 1));
    empty.close();
    full.close();

    assert_eq!(reader.join().unwrap(), Err(PipeError::Closed));
    assert_eq!(writer.join().unwrap(), Err(PipeError::Closed));
    // The message queued before close is still readable.
    assert_eq!(full.recv_message(ALICE).unwrap(), b"x");
}

#[test]
fn test_denied_reader_does_not_block() {
    let pipe = pipe(2, 8);
    pipe.send(ALICE, b"mine").unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(
        pipe.recv(BOB, &mut buf),
        Err(PipeError::Ring(RingError::AccessDenied))
    );
    assert_eq!(pipe.message_count(), 1);
}

#[test]
fn test_many_writers_one_reader_per_writer_fifo() {
    const WRITERS: u32 = 4;
    const PER_WRITER: u32 = 500;
    let pipe = pipe(8, 8);

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                for seq in 0..PER_WRITER {
                    let mut msg = [0u8; 8];
                    msg[..4].copy_from_slice(&w.to_le_bytes());
                    msg[4..].copy_from_slice(&seq.to_le_bytes());
                    pipe.send(Credentials::new(w + 1, 42), &msg).unwrap();
                }
            })
        })
        .collect();

    // Same gid as every writer.
    let reader = Credentials::new(9999, 42);
    let mut next = vec![0u32; WRITERS as usize];
    let mut buf = [0u8; 8];
    for _ in 0..WRITERS * PER_WRITER {
        assert_eq!(pipe.recv(reader, &mut buf), Ok(8));
        let w = u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
        let seq = u32::from_le_bytes(buf[4..].try_into().unwrap());
        assert_eq!(seq, next[w], "writer {} out of order", w);
        next[w] += 1;
    }

    for h in writers {
        h.join().unwrap();
    }
    assert!(next.iter().all(|&n| n == PER_WRITER));
    assert_eq!(pipe.message_count(), 0);
}

#[test]
fn test_many_readers_receive_each_message_once() {
    const READERS: usize = 4;
    const TOTAL: u32 = 2000;
    let pipe = pipe(4, 4);

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                let mut seen = Vec::new();
                let mut buf = [0u8; 4];
                while let Ok(n) = pipe.recv(Credentials::ROOT, &mut buf) {
                    assert_eq!(n, 4);
                    seen.push(u32::from_le_bytes(buf));
                }
                seen
            })
        })
        .collect();

    for i in 0..TOTAL {
        pipe.send(ALICE, &i.to_le_bytes()).unwrap();
    }
    assert!(eventually(|| pipe.message_count() == 0));
    pipe.close();

    let mut all: Vec<u32> = readers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..TOTAL).collect::<Vec<_>>());
}

#[test]
fn test_reaper_frees_space_for_blocked_writer() {
    let clock = Arc::new(ManualClock::new(0));
    let config = PipeConfig::new(RingConfig::new(2, 8)).with_expiry(Duration::from_millis(5));
    let pipe = Arc::new(Pipe::with_clock(config, Arc::clone(&clock)).unwrap());
    pipe.send(ALICE, b"a").unwrap();
    pipe.send(ALICE, b"b").unwrap();

    let reaper = pipe.spawn_reaper().unwrap();
    let writer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || pipe.send(ALICE, b"c"))
    };

    assert!(eventually(|| pipe.writers_waiting() == 1));
    clock.set(1_000);

    assert_eq!(writer.join().unwrap(), Ok(1));
    assert!(eventually(|| pipe.message_count() == 1));
    reaper.stop();
}

#[test]
fn test_set_expiry_reaches_running_reaper() {
    let clock = Arc::new(ManualClock::new(0));
    let config = PipeConfig::new(RingConfig::new(2, 8)).with_expiry(Duration::from_secs(3600));
    let pipe = Arc::new(Pipe::with_clock(config, Arc::clone(&clock)).unwrap());

    pipe.set_expiry(Credentials::ROOT, Duration::from_millis(5)).unwrap();
    let reaper = pipe.spawn_reaper().unwrap();

    pipe.send(ALICE, b"old").unwrap();
    clock.set(100);
    assert!(eventually(|| pipe.message_count() == 0));
    drop(reaper);
}
