//! HTTP routes and wire types
//!
//! Two endpoints over the matching façade: producers POST outputs, and
//! consumers long-poll with GET. The façade classifies outcomes; this layer
//! owns only the wire shapes and the status-code table.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::service::{ReceiveRequest, SendRequest, ServiceError, StreamService};

/// Build the API router over a shared service
pub fn router(service: Arc<StreamService>) -> Router {
    Router::new()
        .route("/api/v1/streams/send", post(send_output))
        .route("/api/v1/streams/receive", get(receive_output))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Wire body for a producer push
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    output_uuid: Uuid,
    stream_id: String,
    output: serde_json::Value,
    #[serde(default)]
    in_memory_stream_size: Option<usize>,
    #[serde(default)]
    blocking_write_timeout_seconds: Option<i64>,
    #[serde(default, rename = "writeToDB")]
    write_to_db: bool,
    #[serde(default, rename = "dbTTLSeconds")]
    db_ttl_seconds: Option<u64>,
}

/// Wire query for a consumer long-poll
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveParams {
    stream_id: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default, rename = "readFromDB")]
    read_from_db: bool,
    #[serde(default)]
    db_resume_token: Option<String>,
}

/// Wire body for a delivered output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveBody {
    output_uuid: Uuid,
    output: serde_json::Value,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_resume_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Caller-visible failure: a status code plus a stable kind label
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid-request",
            message,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        use crate::registry::BufferError;

        let status = match &err {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Stream(BufferError::ZeroCapacityCircular) => StatusCode::BAD_REQUEST,
            ServiceError::Stream(BufferError::WriteTimeout)
            | ServiceError::Stream(BufferError::ReceiveTimeout) => StatusCode::FAILED_DEPENDENCY,
            ServiceError::Stream(BufferError::Stopped)
            | ServiceError::Stream(BufferError::OverflowExhausted)
            | ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

async fn send_output(
    State(service): State<Arc<StreamService>>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    service
        .send(SendRequest {
            output_uuid: body.output_uuid,
            stream_id: body.stream_id,
            output: body.output,
            in_memory_stream_size: body.in_memory_stream_size,
            blocking_write_timeout_seconds: body.blocking_write_timeout_seconds,
            write_to_db: body.write_to_db,
            db_ttl_seconds: body.db_ttl_seconds,
        })
        .await?;

    Ok(StatusCode::OK)
}

async fn receive_output(
    State(service): State<Arc<StreamService>>,
    params: Result<Query<ReceiveParams>, QueryRejection>,
) -> Result<Json<ReceiveBody>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let response = service
        .receive(ReceiveRequest {
            stream_id: params.stream_id,
            timeout_seconds: params.timeout_seconds,
            read_from_db: params.read_from_db,
            db_resume_token: params.db_resume_token,
        })
        .await?;

    Ok(Json(ReceiveBody {
        output_uuid: response.entry.output_uuid,
        output: response.entry.output,
        timestamp: response.entry.timestamp,
        db_resume_token: response.db_resume_token,
    }))
}
