//! Matching service façade and persistence seam
//!
//! The façade sits between the request surface and the registry: it
//! resolves each request's persistence policy, routes it to the right
//! stream buffer, and classifies the outcome. Durable requests go through
//! the pluggable [`PersistenceAdapter`] instead.

pub mod error;
pub mod matcher;
pub mod persistence;

pub use error::ServiceError;
pub use matcher::{ReceiveRequest, ReceiveResponse, SendRequest, ServiceConfig, StreamService};
pub use persistence::{PersistedEntry, PersistenceAdapter, PersistenceError};
