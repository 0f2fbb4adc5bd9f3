//! Persistence adapter seam
//!
//! Requests may opt into durable storage instead of the in-memory buffer.
//! The service calls through this narrow contract; the storage model behind
//! it (database driver, TTL enforcement, cursor encoding) is entirely the
//! adapter's business and no adapter ships with the core.

use std::time::Duration;

use async_trait::async_trait;

use crate::registry::StreamEntry;

/// One durable entry plus the cursor for the read after it
#[derive(Debug, Clone)]
pub struct PersistedEntry {
    /// The stored entry
    pub entry: StreamEntry,
    /// Opaque cursor to pass back on the next read
    pub next_resume_token: String,
}

/// Error type for persistence operations
#[derive(Debug, Clone)]
pub enum PersistenceError {
    /// A durable request arrived but no adapter is configured
    NotConfigured,
    /// The adapter's backend failed
    Backend(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::NotConfigured => {
                write!(f, "no persistence adapter is configured")
            }
            PersistenceError::Backend(detail) => write!(f, "persistence backend: {}", detail),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Durable storage contract for opt-in persistent streams
///
/// Appended entries keep their per-stream order. A `None` resume token (or
/// an empty one) means "from the beginning"; anything else is an opaque
/// cursor previously handed out by `read`.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Durably append one entry to a stream
    async fn append(
        &self,
        stream_id: &str,
        entry: &StreamEntry,
        ttl: Duration,
    ) -> Result<(), PersistenceError>;

    /// Read the next entry at the cursor, waiting up to the window
    ///
    /// Returns `Ok(None)` when nothing became readable within the window.
    async fn read(
        &self,
        stream_id: &str,
        resume_token: Option<&str>,
        window: Duration,
    ) -> Result<Option<PersistedEntry>, PersistenceError>;
}
