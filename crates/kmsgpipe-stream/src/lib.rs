//! Async adapters for kmsgpipe
//!
//! [`AsyncPipe`] puts a tokio-friendly face on a [`kmsgpipe::Pipe`]: sends
//! wait for a free slot and receives wait for a message without parking an
//! executor thread. Messages can also be consumed as a [`futures_core::Stream`].
//!
//! # Features
//!
//! - **Hybrid waiting**: event-driven via `Notify` + configurable poll interval as safety net
//! - **Shared with threads**: the inner blocking pipe stays usable from plain threads
//! - **Async expiry**: [`spawn_reaper`] sweeps expired messages on the runtime
//!
//! # Example
//!
//! ```
//! use kmsgpipe::{Credentials, PipeConfig, RingConfig};
//! use kmsgpipe_stream::{AsyncPipe, StreamExt};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipe = Arc::new(AsyncPipe::new(PipeConfig::new(RingConfig::new(4, 64))).unwrap());
//!     let user = Credentials::new(1000, 1000);
//!
//!     let writer = {
//!         let pipe = Arc::clone(&pipe);
//!         tokio::spawn(async move {
//!             for word in ["one", "two", "three"] {
//!                 pipe.send(user, word.as_bytes()).await.unwrap();
//!             }
//!             pipe.close();
//!         })
//!     };
//!
//!     let messages = pipe.messages(user);
//!     tokio::pin!(messages);
//!     while let Some(msg) = messages.next().await {
//!         println!("Received: {}", String::from_utf8_lossy(&msg.unwrap()));
//!     }
//!     writer.await.unwrap();
//! }
//! ```

mod config;
mod error;
mod pipe;
mod reaper;

pub use config::StreamConfig;
pub use error::StreamError;
pub use pipe::AsyncPipe;
pub use reaper::spawn_reaper;

// Re-export useful stream combinators
pub use tokio_stream::StreamExt;
