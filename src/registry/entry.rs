//! Stream entry type
//!
//! This module defines the unit of transport: one output produced for a
//! stream, as handed from a producer to exactly one consumer.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single output entry flowing through a stream
///
/// Entries are immutable after construction. The payload is an opaque JSON
/// document; the buffer never inspects it.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    /// Producer-assigned identifier, used by callers for deduplication
    pub output_uuid: Uuid,

    /// Opaque output payload
    pub output: serde_json::Value,

    /// Wall-clock instant of production
    ///
    /// Per-stream delivery order is the enqueue order, not this timestamp.
    pub timestamp: DateTime<Utc>,
}

impl StreamEntry {
    /// Create an entry stamped with the current time
    pub fn new(output_uuid: Uuid, output: serde_json::Value) -> Self {
        Self {
            output_uuid,
            output,
            timestamp: Utc::now(),
        }
    }

    /// Create an entry with an explicit timestamp
    ///
    /// Used by replay paths where the production instant is already known.
    pub fn with_timestamp(
        output_uuid: Uuid,
        output: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            output_uuid,
            output,
            timestamp,
        }
    }
}
