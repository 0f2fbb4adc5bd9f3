//! # streammatch-rs
//!
//! A stream-based asynchronous output matching service. Producers push
//! outputs tagged with a stream id; consumers long-poll to receive them.
//! Each active stream is backed by one bounded in-memory buffer that hands
//! entries to waiting consumers in real time, buffering when none is
//! waiting.
//!
//! The overflow discipline is chosen per write: circular overwrite drops
//! the oldest entry to admit the newest, bounded blocking waits up to a
//! caller-supplied window and then fails. Capacity 0 with bounded blocking
//! degenerates to a synchronous rendezvous. Stopping a stream wakes every
//! parked producer and consumer and unlinks the buffer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use streammatch_rs::{ServerConfig, StreamRegistry, StreamServer, StreamService};
//!
//! #[tokio::main]
//! async fn main() -> streammatch_rs::Result<()> {
//!     let registry = Arc::new(StreamRegistry::new());
//!     let service = StreamService::new(registry);
//!     let server = StreamServer::new(ServerConfig::default(), service);
//!     server.run().await
//! }
//! ```
//!
//! Requests that opt into durability route through a pluggable
//! [`PersistenceAdapter`](service::PersistenceAdapter) instead of the
//! in-memory buffer; no adapter ships with the core.

pub mod error;
pub mod registry;
pub mod server;
pub mod service;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{
    BufferError, BufferStats, RegistryConfig, StreamBuffer, StreamEntry, StreamRegistry, WriteMode,
};
pub use server::{ServerConfig, StreamServer};
pub use service::{
    PersistenceAdapter, ReceiveRequest, ReceiveResponse, SendRequest, ServiceConfig, ServiceError,
    StreamService,
};
pub use stats::ServiceStats;
