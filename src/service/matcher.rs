//! Matching service façade
//!
//! Stateless orchestration between the request surface and the per-stream
//! buffers: resolves the persistence policy, sizes buffers on first touch,
//! derives the write discipline, and classifies outcomes.

use std::sync::Arc;
use std::time::Duration;

use crate::registry::{StreamEntry, StreamRegistry, WriteMode};
use crate::stats::ServiceStats;

use super::error::ServiceError;
use super::persistence::PersistenceAdapter;

/// Configuration for the matching service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Receive window applied when the request does not name one
    pub default_receive_timeout: Duration,

    /// Retention applied to durable writes when the request does not name
    /// one
    pub default_db_ttl: Duration,

    /// Upper bound on any caller-supplied wait window
    pub max_poll_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_receive_timeout: Duration::from_secs(30),
            default_db_ttl: Duration::from_secs(86_400),
            max_poll_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl ServiceConfig {
    /// Set the default receive window
    pub fn default_receive_timeout(mut self, window: Duration) -> Self {
        self.default_receive_timeout = window;
        self
    }

    /// Set the default durable retention
    pub fn default_db_ttl(mut self, ttl: Duration) -> Self {
        self.default_db_ttl = ttl;
        self
    }

    /// Set the cap on caller-supplied wait windows
    pub fn max_poll_timeout(mut self, cap: Duration) -> Self {
        self.max_poll_timeout = cap;
        self
    }
}

/// One producer push
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Producer-assigned output identifier
    pub output_uuid: uuid::Uuid,
    /// Target stream
    pub stream_id: String,
    /// Opaque output payload
    pub output: serde_json::Value,
    /// Buffer capacity, consulted only on first touch of the stream
    pub in_memory_stream_size: Option<usize>,
    /// Positive value selects bounded blocking for this write
    pub blocking_write_timeout_seconds: Option<i64>,
    /// Route to the persistence adapter instead of the in-memory buffer
    pub write_to_db: bool,
    /// Durable retention override
    pub db_ttl_seconds: Option<u64>,
}

/// One consumer long-poll
#[derive(Debug, Clone)]
pub struct ReceiveRequest {
    /// Source stream
    pub stream_id: String,
    /// Long-poll window
    pub timeout_seconds: Option<u64>,
    /// Read from the persistence adapter instead of the in-memory buffer
    pub read_from_db: bool,
    /// Replay cursor, meaningful only with `read_from_db`
    pub db_resume_token: Option<String>,
}

/// A matched output on its way back to a consumer
#[derive(Debug, Clone)]
pub struct ReceiveResponse {
    /// The delivered entry
    pub entry: StreamEntry,
    /// Cursor for the next durable read, absent for in-memory delivery
    pub db_resume_token: Option<String>,
}

/// The matching façade invoked by the request surface
///
/// Holds the registry and the optional persistence adapter; per-request
/// state lives entirely on the call stack, so one instance serves every
/// request concurrently.
pub struct StreamService {
    registry: Arc<StreamRegistry>,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    config: ServiceConfig,
    stats: ServiceStats,
}

impl StreamService {
    /// Create a service over the given registry with default configuration
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self::with_config(registry, ServiceConfig::default())
    }

    /// Create a service with custom configuration
    pub fn with_config(registry: Arc<StreamRegistry>, config: ServiceConfig) -> Self {
        Self {
            registry,
            persistence: None,
            config,
            stats: ServiceStats::new(),
        }
    }

    /// Attach a persistence adapter for durable requests
    pub fn with_persistence(mut self, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        self.persistence = Some(adapter);
        self
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get the service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get the service counters
    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// Push one output into a stream
    pub async fn send(&self, req: SendRequest) -> Result<(), ServiceError> {
        if req.stream_id.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "streamId must be non-empty".to_string(),
            ));
        }

        let entry = StreamEntry::new(req.output_uuid, req.output);

        if req.write_to_db {
            return self.send_durable(&req.stream_id, entry, req.db_ttl_seconds).await;
        }

        let capacity = req
            .in_memory_stream_size
            .unwrap_or(self.registry.config().default_capacity);
        let buffer = self.registry.get_or_create(&req.stream_id, capacity);

        let mode = match req.blocking_write_timeout_seconds {
            Some(secs) if secs > 0 => {
                WriteMode::Blocking(self.clamp_window(Duration::from_secs(secs as u64)))
            }
            _ => WriteMode::Circular,
        };

        match buffer.send(entry, mode).await {
            Ok(()) => {
                self.stats.record_send();
                tracing::debug!(
                    stream = %req.stream_id,
                    output_uuid = %req.output_uuid,
                    mode = ?mode,
                    "Output accepted"
                );
                Ok(())
            }
            Err(err) => {
                self.note_failure(&err);
                tracing::debug!(
                    stream = %req.stream_id,
                    output_uuid = %req.output_uuid,
                    error = %err,
                    "Send failed"
                );
                Err(err.into())
            }
        }
    }

    async fn send_durable(
        &self,
        stream_id: &str,
        entry: StreamEntry,
        ttl_seconds: Option<u64>,
    ) -> Result<(), ServiceError> {
        let adapter = self
            .persistence
            .as_ref()
            .ok_or(super::persistence::PersistenceError::NotConfigured)?;
        let ttl = ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.config.default_db_ttl);

        adapter.append(stream_id, &entry, ttl).await?;
        self.stats.record_send();
        tracing::debug!(
            stream = %stream_id,
            output_uuid = %entry.output_uuid,
            ttl_secs = ttl.as_secs(),
            "Output persisted"
        );

        // Best-effort live copy for consumers already matched to the
        // stream. Durability already won; failures here are swallowed, and
        // a lookup (not a create) keeps durable-only streams from leaking
        // empty buffers.
        if let Some(buffer) = self.registry.lookup(stream_id) {
            if let Err(err) = buffer.send(entry, WriteMode::Circular).await {
                tracing::debug!(stream = %stream_id, error = %err, "Live copy skipped");
            }
        }

        Ok(())
    }

    /// Long-poll one output from a stream
    pub async fn receive(&self, req: ReceiveRequest) -> Result<ReceiveResponse, ServiceError> {
        if req.stream_id.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "streamId must be non-empty".to_string(),
            ));
        }

        let window = self.clamp_window(
            req.timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(self.config.default_receive_timeout),
        );

        if req.read_from_db {
            return self
                .receive_durable(&req.stream_id, req.db_resume_token.as_deref(), window)
                .await;
        }

        // Consumer-first arrival creates an empty buffer and parks in it
        // until a producer appears
        let buffer = self
            .registry
            .get_or_create(&req.stream_id, self.registry.config().default_capacity);

        match buffer.receive(window).await {
            Ok(entry) => {
                self.stats.record_receive();
                tracing::debug!(
                    stream = %req.stream_id,
                    output_uuid = %entry.output_uuid,
                    "Output delivered"
                );
                Ok(ReceiveResponse {
                    entry,
                    db_resume_token: None,
                })
            }
            Err(err) => {
                self.note_failure(&err);
                Err(err.into())
            }
        }
    }

    async fn receive_durable(
        &self,
        stream_id: &str,
        resume_token: Option<&str>,
        window: Duration,
    ) -> Result<ReceiveResponse, ServiceError> {
        let adapter = self
            .persistence
            .as_ref()
            .ok_or(super::persistence::PersistenceError::NotConfigured)?;
        // An empty token means "from the beginning"
        let token = resume_token.filter(|t| !t.is_empty());

        match adapter.read(stream_id, token, window).await? {
            Some(persisted) => {
                self.stats.record_receive();
                Ok(ReceiveResponse {
                    entry: persisted.entry,
                    db_resume_token: Some(persisted.next_resume_token),
                })
            }
            None => {
                self.stats.record_receive_timeout();
                Err(crate::registry::BufferError::ReceiveTimeout.into())
            }
        }
    }

    /// Stop one stream, waking its parked producers and consumers
    pub fn stop_stream(&self, stream_id: &str) -> bool {
        self.registry.stop_stream(stream_id)
    }

    /// Stop every active stream
    pub fn stop_all(&self) {
        self.registry.stop_all();
    }

    fn clamp_window(&self, window: Duration) -> Duration {
        window.min(self.config.max_poll_timeout)
    }

    fn note_failure(&self, err: &crate::registry::BufferError) {
        use crate::registry::BufferError;
        match err {
            BufferError::WriteTimeout => self.stats.record_send_timeout(),
            BufferError::ReceiveTimeout => self.stats.record_receive_timeout(),
            BufferError::Stopped => self.stats.record_stopped_hit(),
            BufferError::ZeroCapacityCircular | BufferError::OverflowExhausted => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::registry::BufferError;
    use crate::service::persistence::{PersistedEntry, PersistenceError};

    use super::*;

    fn send_req(stream_id: &str) -> SendRequest {
        SendRequest {
            output_uuid: Uuid::new_v4(),
            stream_id: stream_id.to_string(),
            output: serde_json::json!({"step": 1}),
            in_memory_stream_size: None,
            blocking_write_timeout_seconds: None,
            write_to_db: false,
            db_ttl_seconds: None,
        }
    }

    fn receive_req(stream_id: &str, timeout_seconds: u64) -> ReceiveRequest {
        ReceiveRequest {
            stream_id: stream_id.to_string(),
            timeout_seconds: Some(timeout_seconds),
            read_from_db: false,
            db_resume_token: None,
        }
    }

    fn service() -> StreamService {
        StreamService::new(Arc::new(StreamRegistry::new()))
    }

    /// Adapter double: in-memory per-stream log with index-based cursors.
    #[derive(Default)]
    struct RecordingAdapter {
        logs: Mutex<HashMap<String, Vec<(StreamEntry, Duration)>>>,
        fail: bool,
    }

    #[async_trait]
    impl PersistenceAdapter for RecordingAdapter {
        async fn append(
            &self,
            stream_id: &str,
            entry: &StreamEntry,
            ttl: Duration,
        ) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Backend("append refused".to_string()));
            }
            self.logs
                .lock()
                .unwrap()
                .entry(stream_id.to_string())
                .or_default()
                .push((entry.clone(), ttl));
            Ok(())
        }

        async fn read(
            &self,
            stream_id: &str,
            resume_token: Option<&str>,
            _window: Duration,
        ) -> Result<Option<PersistedEntry>, PersistenceError> {
            let index: usize = match resume_token {
                Some(token) => token
                    .parse()
                    .map_err(|_| PersistenceError::Backend("bad cursor".to_string()))?,
                None => 0,
            };
            let logs = self.logs.lock().unwrap();
            let log = match logs.get(stream_id) {
                Some(log) => log,
                None => return Ok(None),
            };
            Ok(log.get(index).map(|(entry, _)| PersistedEntry {
                entry: entry.clone(),
                next_resume_token: (index + 1).to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn test_send_then_receive_roundtrip() {
        let service = service();
        let req = send_req("s1");
        let uuid = req.output_uuid;

        service.send(req).await.unwrap();
        let resp = service.receive(receive_req("s1", 1)).await.unwrap();

        assert_eq!(resp.entry.output_uuid, uuid);
        assert!(resp.db_resume_token.is_none());
        assert_eq!(service.stats().sends(), 1);
        assert_eq!(service.stats().receives(), 1);
    }

    #[tokio::test]
    async fn test_consumer_first_parks_until_producer() {
        let service = Arc::new(service());

        let consumer = Arc::clone(&service);
        let receive_task =
            tokio::spawn(async move { consumer.receive(receive_req("s1", 5)).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        service.send(send_req("s1")).await.unwrap();

        let resp = receive_task.await.unwrap().unwrap();
        assert_eq!(resp.entry.output["step"], 1);
    }

    #[tokio::test]
    async fn test_empty_stream_id_is_invalid() {
        let service = service();

        let result = service.send(send_req("")).await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));

        let result = service.receive(receive_req("", 1)).await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_first_touch_capacity_applies() {
        let service = service();
        let mut req = send_req("s1");
        req.in_memory_stream_size = Some(7);

        service.send(req).await.unwrap();

        let buffer = service.registry().lookup("s1").unwrap();
        assert_eq!(buffer.capacity(), 7);
    }

    #[tokio::test]
    async fn test_zero_capacity_circular_maps_to_invalid_request() {
        let service = service();
        let mut req = send_req("s1");
        req.in_memory_stream_size = Some(0);

        let result = service.send(req).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Stream(BufferError::ZeroCapacityCircular)
        ));
        assert_eq!(err.kind(), "invalid-request");
    }

    #[tokio::test]
    async fn test_blocking_write_timeout_selects_blocking_mode() {
        let service = service();
        let mut first = send_req("s1");
        first.in_memory_stream_size = Some(1);
        service.send(first).await.unwrap();

        // Full buffer plus a one-second blocking window: waiting-timeout
        let mut second = send_req("s1");
        second.blocking_write_timeout_seconds = Some(1);
        let started = std::time::Instant::now();
        let result = service.send(second).await;

        assert!(matches!(
            result,
            Err(ServiceError::Stream(BufferError::WriteTimeout))
        ));
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(service.stats().send_timeouts(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_write_timeout_is_circular() {
        let service = service();
        let mut first = send_req("s1");
        first.in_memory_stream_size = Some(1);
        service.send(first).await.unwrap();

        // Zero and negative windows mean circular overwrite: accepted
        for timeout in [Some(0), Some(-5), None] {
            let mut req = send_req("s1");
            req.blocking_write_timeout_seconds = timeout;
            service.send(req).await.unwrap();
        }

        let stats = service.registry().stream_stats("s1").unwrap();
        assert_eq!(stats.entries_dropped, 3);
    }

    #[tokio::test]
    async fn test_receive_timeout_on_quiet_stream() {
        let service = service();

        let result = service.receive(receive_req("quiet", 1)).await;

        assert!(matches!(
            result,
            Err(ServiceError::Stream(BufferError::ReceiveTimeout))
        ));
        assert_eq!(service.stats().receive_timeouts(), 1);
    }

    #[tokio::test]
    async fn test_stopped_stream_surfaces_stopped() {
        let service = Arc::new(service());
        service.send(send_req("s1")).await.unwrap();

        let consumer = Arc::clone(&service);
        let receive_task = tokio::spawn(async move {
            // Drain the queued entry, then park
            consumer.receive(receive_req("s1", 5)).await.unwrap();
            consumer.receive(receive_req("s1", 5)).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(service.stop_stream("s1"));

        let result = receive_task.await.unwrap();
        assert!(matches!(
            result,
            Err(ServiceError::Stream(BufferError::Stopped))
        ));
        assert_eq!(service.stats().stopped_hits(), 1);
    }

    #[tokio::test]
    async fn test_durable_send_requires_adapter() {
        let service = service();
        let mut req = send_req("s1");
        req.write_to_db = true;

        let result = service.send(req).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Persistence(PersistenceError::NotConfigured)
        ));
        assert_eq!(err.kind(), "persistence-error");
        // Nothing leaked into the in-memory side
        assert_eq!(service.registry().stream_count(), 0);
    }

    #[tokio::test]
    async fn test_durable_send_appends_with_default_ttl() {
        let adapter = Arc::new(RecordingAdapter::default());
        let service = service().with_persistence(Arc::clone(&adapter) as Arc<dyn PersistenceAdapter>);

        let mut req = send_req("s1");
        req.write_to_db = true;
        service.send(req).await.unwrap();

        let logs = adapter.logs.lock().unwrap();
        let log = logs.get("s1").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, Duration::from_secs(86_400));
        // Durable-only streams do not create buffers
        assert_eq!(service.registry().stream_count(), 0);
    }

    #[tokio::test]
    async fn test_durable_send_honors_ttl_override() {
        let adapter = Arc::new(RecordingAdapter::default());
        let service = service().with_persistence(Arc::clone(&adapter) as Arc<dyn PersistenceAdapter>);

        let mut req = send_req("s1");
        req.write_to_db = true;
        req.db_ttl_seconds = Some(60);
        service.send(req).await.unwrap();

        let logs = adapter.logs.lock().unwrap();
        assert_eq!(logs.get("s1").unwrap()[0].1, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_durable_send_publishes_live_copy_to_existing_buffer() {
        let adapter = Arc::new(RecordingAdapter::default());
        let service = service().with_persistence(Arc::clone(&adapter) as Arc<dyn PersistenceAdapter>);

        // A prior in-memory touch created the buffer
        service.registry().get_or_create("s1", 10);

        let mut req = send_req("s1");
        req.write_to_db = true;
        service.send(req).await.unwrap();

        // The durable write also landed a live copy
        let resp = service.receive(receive_req("s1", 1)).await.unwrap();
        assert_eq!(resp.entry.output["step"], 1);
    }

    #[tokio::test]
    async fn test_durable_read_chains_resume_tokens() {
        let adapter = Arc::new(RecordingAdapter::default());
        let service = service().with_persistence(Arc::clone(&adapter) as Arc<dyn PersistenceAdapter>);

        for _ in 0..2 {
            let mut req = send_req("s1");
            req.write_to_db = true;
            service.send(req).await.unwrap();
        }

        let mut req = receive_req("s1", 1);
        req.read_from_db = true;
        let first = service.receive(req.clone()).await.unwrap();
        let first_token = first.db_resume_token.clone().unwrap();

        req.db_resume_token = Some(first_token);
        let second = service.receive(req.clone()).await.unwrap();
        assert_ne!(first.entry.output_uuid, second.entry.output_uuid);

        // Past the end of the log: receive-timeout outcome
        req.db_resume_token = second.db_resume_token.clone();
        let result = service.receive(req).await;
        assert!(matches!(
            result,
            Err(ServiceError::Stream(BufferError::ReceiveTimeout))
        ));
    }

    #[tokio::test]
    async fn test_durable_read_empty_token_means_beginning() {
        let adapter = Arc::new(RecordingAdapter::default());
        let service = service().with_persistence(Arc::clone(&adapter) as Arc<dyn PersistenceAdapter>);

        let mut send = send_req("s1");
        send.write_to_db = true;
        let uuid = send.output_uuid;
        service.send(send).await.unwrap();

        let mut req = receive_req("s1", 1);
        req.read_from_db = true;
        req.db_resume_token = Some(String::new());
        let resp = service.receive(req).await.unwrap();

        assert_eq!(resp.entry.output_uuid, uuid);
    }

    #[tokio::test]
    async fn test_durable_backend_failure_surfaces() {
        let adapter = Arc::new(RecordingAdapter {
            fail: true,
            ..Default::default()
        });
        let service = service().with_persistence(adapter);

        let mut req = send_req("s1");
        req.write_to_db = true;
        let result = service.send(req).await;

        assert!(matches!(
            result,
            Err(ServiceError::Persistence(PersistenceError::Backend(_)))
        ));
    }

    #[tokio::test]
    async fn test_window_clamping() {
        let config = ServiceConfig::default().max_poll_timeout(Duration::from_secs(10));
        let service = StreamService::with_config(Arc::new(StreamRegistry::new()), config);

        assert_eq!(
            service.clamp_window(Duration::from_secs(3600)),
            Duration::from_secs(10)
        );
        assert_eq!(
            service.clamp_window(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::default();

        assert_eq!(config.default_receive_timeout, Duration::from_secs(30));
        assert_eq!(config.default_db_ttl, Duration::from_secs(86_400));
        assert_eq!(config.max_poll_timeout, Duration::from_secs(86_400));
    }

    #[test]
    fn test_service_config_builders() {
        let config = ServiceConfig::default()
            .default_receive_timeout(Duration::from_secs(5))
            .default_db_ttl(Duration::from_secs(120))
            .max_poll_timeout(Duration::from_secs(60));

        assert_eq!(config.default_receive_timeout, Duration::from_secs(5));
        assert_eq!(config.default_db_ttl, Duration::from_secs(120));
        assert_eq!(config.max_poll_timeout, Duration::from_secs(60));
    }
}
