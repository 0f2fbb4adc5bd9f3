//! Observability counters

pub mod metrics;

pub use metrics::ServiceStats;
