//! Buffer error types
//!
//! The non-`ok` outcomes of stream buffer operations.

/// Error type for buffer send/receive operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer was stopped before or during the call
    Stopped,
    /// A bounded-blocking send found no space within its window
    WriteTimeout,
    /// A receive found no entry within its window
    ReceiveTimeout,
    /// Circular overwrite needs at least one slot to overwrite into
    ZeroCapacityCircular,
    /// Drop-oldest retries exceeded the configured iteration cap
    OverflowExhausted,
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Stopped => write!(f, "stream is stopped"),
            BufferError::WriteTimeout => write!(f, "timeout waiting for stream space"),
            BufferError::ReceiveTimeout => write!(f, "timeout waiting for a stream entry"),
            BufferError::ZeroCapacityCircular => {
                write!(f, "zero capacity circular buffer is not allowed")
            }
            BufferError::OverflowExhausted => {
                write!(f, "buffer still full after repeatedly removing oldest entry")
            }
        }
    }
}

impl std::error::Error for BufferError {}
