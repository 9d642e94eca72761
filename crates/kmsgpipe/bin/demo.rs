//! Walkthrough of the kmsgpipe API.
//!
//! Run with: `cargo run -p kmsgpipe --bin demo`

use kmsgpipe::{
    Credentials, ManualClock, MessageRing, MessageRecord, Pipe, PipeConfig, PipeError, RingConfig,
    RingError,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ALICE: Credentials = Credentials::new(1000, 100);
const BOB: Credentials = Credentials::new(1001, 200);
const CAROL: Credentials = Credentials::new(1002, 100);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== kmsgpipe Demo ===\n");

    demo_borrowed_ring()?;
    demo_access_control()?;
    demo_blocking_threads()?;
    demo_expiry()?;
    demo_control_operations()?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: The bare ring over caller-provided storage
fn demo_borrowed_ring() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 1: Borrowed Ring ---");

    let mut payload = [0u8; 4 * 32];
    let mut records = [MessageRecord::EMPTY; 4];
    let mut ring = MessageRing::init(4, 32, &mut payload[..], &mut records[..])?;

    for (i, word) in ["alpha", "beta", "gamma", "delta"].iter().enumerate() {
        ring.push(word.as_bytes(), ALICE.uid, ALICE.gid, i as u64)?;
    }
    println!("  Pushed 4 messages, state = {:?}", ring.state());

    match ring.push(b"epsilon", ALICE.uid, ALICE.gid, 4) {
        Err(RingError::BufferFull) => println!("  Fifth push rejected: ring full (no overwrite)"),
        other => println!("  Unexpected: {:?}", other),
    }

    let mut out = [0u8; 32];
    let n = ring.pop(&mut out, ALICE.uid, ALICE.gid)?;
    println!("  Popped: {}", String::from_utf8_lossy(&out[..n]));
    println!("  Remaining: {}", ring.message_count());
    println!("  ✓ Borrowed ring complete\n");
    Ok(())
}

/// Demo 2: Owner, group and root access
fn demo_access_control() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 2: Access Control ---");

    let pipe = Pipe::new(PipeConfig::new(RingConfig::new(4, 64)))?;
    pipe.send(ALICE, b"for alice's group")?;

    let mut buf = [0u8; 64];
    match pipe.try_recv(BOB, &mut buf) {
        Err(PipeError::Ring(RingError::AccessDenied)) => {
            println!("  Bob (other uid and gid) denied, message stays queued")
        }
        other => println!("  Unexpected: {:?}", other),
    }

    // Carol shares alice's group.
    let n = pipe.try_recv(CAROL, &mut buf)?;
    println!("  Carol (same gid) read: {}", String::from_utf8_lossy(&buf[..n]));
    println!("  ✓ Access control complete\n");
    Ok(())
}

/// Demo 3: Writers block on a full pipe until a reader drains it
fn demo_blocking_threads() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 3: Blocking Readers and Writers ---");

    let pipe = Arc::new(Pipe::new(PipeConfig::new(RingConfig::new(2, 32)))?);

    let writer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || -> Result<(), PipeError> {
            for i in 0..6u32 {
                pipe.send(ALICE, format!("msg-{}", i).as_bytes())?;
            }
            pipe.close();
            Ok(())
        })
    };

    let mut received = 0;
    loop {
        match pipe.recv_message(ALICE) {
            Ok(msg) => {
                received += 1;
                println!("  Received: {}", String::from_utf8_lossy(&msg));
                thread::sleep(Duration::from_millis(5));
            }
            Err(PipeError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    writer.join().map_err(|_| "writer panicked")??;
    println!("  {} messages through a 2-slot pipe", received);
    println!("  ✓ Blocking complete\n");
    Ok(())
}

/// Demo 4: Expiry driven by a manual clock
fn demo_expiry() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 4: Message Expiry ---");

    let clock = Arc::new(ManualClock::new(0));
    let config = PipeConfig::new(RingConfig::new(8, 32)).with_expiry(Duration::from_millis(100));
    let pipe = Pipe::with_clock(config, Arc::clone(&clock))?;

    for t in [0, 40, 80, 120] {
        clock.set(t);
        pipe.send(ALICE, format!("t={}", t).as_bytes())?;
    }
    println!("  Queued 4 messages at t=0,40,80,120");

    clock.set(170);
    let removed = pipe.cleanup_expired();
    println!("  At t=170 (cutoff 70): expired {}, {} left", removed, pipe.message_count());
    println!("  ✓ Expiry complete\n");
    Ok(())
}

/// Demo 5: Privileged controls and statistics
fn demo_control_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 5: Control Operations ---");

    let pipe = Pipe::new(PipeConfig::default())?;
    pipe.send(ALICE, b"one")?;
    pipe.send(BOB, b"two")?;

    if let Err(e) = pipe.clear(ALICE) {
        println!("  Unprivileged clear rejected: {}", e);
    }
    pipe.set_expiry(Credentials::ROOT, Duration::from_secs(30))?;

    print!("{}", pipe.stats());
    println!("  Root cleared {} messages", pipe.clear(Credentials::ROOT)?);
    println!("  ✓ Control operations complete");
    Ok(())
}
