//! Stream registry implementation
//!
//! The process-wide mapping from stream id to its buffer. Buffers are
//! created lazily on first touch and unlinked when they stop.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use super::buffer::{BufferStats, StreamBuffer};
use super::config::RegistryConfig;

/// Process-wide registry of active streams
///
/// The map lock is held only for the duration of an insert, lookup, or
/// remove; buffer operations happen outside it. First-touch creation is
/// linearizable: concurrent callers with the same stream id always see the
/// same buffer.
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, Arc<StreamBuffer>>>,

    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the buffer for a stream, creating it on first touch
    ///
    /// `capacity` is consulted only when this call creates the buffer;
    /// a live stream's capacity is sticky and later values are ignored.
    pub fn get_or_create(self: &Arc<Self>, stream_id: &str, capacity: usize) -> Arc<StreamBuffer> {
        if let Some(buffer) = self.read_streams().get(stream_id) {
            return Arc::clone(buffer);
        }

        let mut streams = self.write_streams();
        // Re-check: another caller may have created it while we upgraded
        if let Some(buffer) = streams.get(stream_id) {
            return Arc::clone(buffer);
        }

        let buffer = Arc::new(StreamBuffer::new(
            capacity,
            self.config.max_circular_iterations,
        ));

        // The stop path unlinks through this hook, so the buffer never
        // holds the registry; remove-if-same keeps a stopped buffer from
        // evicting a successor created under the same id.
        let registry: Weak<StreamRegistry> = Arc::downgrade(self);
        let hook_stream_id = stream_id.to_string();
        let hook_buffer_id = buffer.buffer_id();
        buffer.set_stop_hook(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove_if_same(&hook_stream_id, hook_buffer_id);
            }
        }));

        streams.insert(stream_id.to_string(), Arc::clone(&buffer));
        tracing::info!(
            stream = %stream_id,
            capacity = capacity,
            "Stream buffer created"
        );

        buffer
    }

    /// Return the buffer for a stream without creating one
    pub fn lookup(&self, stream_id: &str) -> Option<Arc<StreamBuffer>> {
        self.read_streams().get(stream_id).map(Arc::clone)
    }

    /// Stop a stream and unlink it
    ///
    /// Returns false if no such stream is active.
    pub fn stop_stream(&self, stream_id: &str) -> bool {
        // Clone out of the map first: the stop hook re-enters the map lock
        let buffer = self.lookup(stream_id);
        match buffer {
            Some(buffer) => {
                buffer.stop();
                tracing::info!(stream = %stream_id, "Stream stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every active stream
    ///
    /// Used on graceful shutdown to release all parked producers and
    /// consumers.
    pub fn stop_all(&self) {
        let buffers: Vec<Arc<StreamBuffer>> =
            self.read_streams().values().map(Arc::clone).collect();
        let count = buffers.len();
        for buffer in buffers {
            buffer.stop();
        }
        if count > 0 {
            tracing::info!(streams = count, "All streams stopped");
        }
    }

    /// Number of active streams
    pub fn stream_count(&self) -> usize {
        self.read_streams().len()
    }

    /// Counters and occupancy for one stream
    pub fn stream_stats(&self, stream_id: &str) -> Option<BufferStats> {
        self.lookup(stream_id).map(|buffer| buffer.stats())
    }

    fn remove_if_same(&self, stream_id: &str, buffer_id: u64) {
        let mut streams = self.write_streams();
        if let Some(existing) = streams.get(stream_id) {
            if existing.buffer_id() == buffer_id {
                streams.remove(stream_id);
                tracing::info!(stream = %stream_id, "Stream unlinked from registry");
            }
        }
    }

    fn read_streams(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<StreamBuffer>>> {
        match self.streams.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_streams(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<StreamBuffer>>> {
        match self.streams.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
