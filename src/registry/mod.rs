//! Stream registry and per-stream matching buffers
//!
//! The registry maps stream ids to bounded buffers and manages their
//! lifecycle; each buffer matches producers to consumers in real time.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<StreamRegistry>
//!                  ┌───────────────────────────┐
//!                  │ streams: HashMap<String,  │
//!                  │   Arc<StreamBuffer> {     │
//!                  │     queue (≤ capacity),   │
//!                  │     parked receivers,     │
//!                  │   }                       │
//!                  │ >                         │
//!                  └─────────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            │                   │                   │
//!            ▼                   ▼                   ▼
//!       [Producer]          [Consumer]          [Consumer]
//!       buffer.send()       buffer.receive()    buffer.receive()
//!            │                   ▲                   ▲
//!            └── hand-off / queue ┴───────────────────┘
//! ```
//!
//! Buffers are created lazily on the first send or receive that names a
//! stream; the capacity supplied on that first touch is sticky. `stop()`
//! wakes every parked caller and unlinks the buffer through a hook, so
//! ownership stays unidirectional (the registry owns buffers, buffers
//! never reference the registry).

pub mod buffer;
pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use buffer::{BufferStats, StreamBuffer, WriteMode};
pub use config::RegistryConfig;
pub use entry::StreamEntry;
pub use error::BufferError;
pub use store::StreamRegistry;
