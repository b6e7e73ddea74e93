//! Error responses.
//!
//! # Responsibilities
//! - Define the problem document returned for every failed request
//! - Let handlers fail with [`AppError`] without knowing the response format
//! - Map faults and panics into problem documents stamped with the node id
//!
//! # Design Decisions
//! - `AppError` only marks the response with a [`Fault`]; the error handler stage
//!   renders it, so the format lives in one place
//! - 5xx details are hidden unless explicitly exposed; 4xx details are always shown
//! - Content type is `application/problem+json`

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::http::request::CorrelationId;
use crate::security::RateLimitError;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Structured error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemResponse {
    pub status: u16,
    pub title: String,
    pub detail: String,
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProblemResponse {
    pub fn new(status: StatusCode, detail: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            detail: detail.into(),
            node_id: node_id.into(),
            trace_id: None,
            extensions: Map::new(),
        }
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: Option<&CorrelationId>) -> Self {
        self.trace_id = trace_id.map(|id| id.as_str().to_string());
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match serde_json::to_vec(&self) {
            Ok(body) => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON))],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize problem response");
                status.into_response()
            }
        }
    }
}

/// Marker left on a response by a failed handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub status: StatusCode,
    pub message: String,
}

/// Errors handlers and stages may return.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error("request did not complete within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::RateLimit(RateLimitError::QueueClosed) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RateLimit(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = status.into_response();
        response.extensions_mut().insert(Fault {
            status,
            message: self.to_string(),
        });
        response
    }
}

/// Turns faults into problem documents for this node.
#[derive(Debug, Clone)]
pub struct ErrorMapper {
    node_id: String,
    expose_details: bool,
}

impl ErrorMapper {
    pub fn new(node_id: impl Into<String>, expose_details: bool) -> Self {
        Self {
            node_id: node_id.into(),
            expose_details,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Problem document for a given status, without fault semantics.
    pub fn problem(
        &self,
        status: StatusCode,
        detail: impl Into<String>,
        trace_id: Option<&CorrelationId>,
    ) -> ProblemResponse {
        ProblemResponse::new(status, detail, self.node_id.clone()).with_trace_id(trace_id)
    }

    pub fn map(&self, fault: &Fault, trace_id: Option<&CorrelationId>) -> ProblemResponse {
        let detail = if fault.status.is_server_error() && !self.expose_details {
            "An unexpected error occurred.".to_string()
        } else {
            fault.message.clone()
        };
        self.problem(fault.status, detail, trace_id)
    }

    pub fn map_panic(&self, message: &str, trace_id: Option<&CorrelationId>) -> ProblemResponse {
        self.map(
            &Fault {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: message.to_string(),
            },
            trace_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_wire_shape() {
        let problem = ProblemResponse::new(StatusCode::TOO_MANY_REQUESTS, "slow down", "node-a")
            .with_trace_id(Some(&CorrelationId::new("req-1")))
            .with_extension("retryAfter", 3);

        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(value["status"], 429);
        assert_eq!(value["title"], "Too Many Requests");
        assert_eq!(value["detail"], "slow down");
        assert_eq!(value["nodeId"], "node-a");
        assert_eq!(value["traceId"], "req-1");
        assert_eq!(value["retryAfter"], 3);
    }

    #[test]
    fn test_app_error_marks_response() {
        let response = AppError::BadRequest("missing field".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let fault = response.extensions().get::<Fault>().unwrap();
        assert_eq!(fault.message, "missing field");
    }

    #[test]
    fn test_server_error_details_hidden_by_default() {
        let fault = Fault {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "db password rejected".into(),
        };

        let hidden = ErrorMapper::new("node-a", false).map(&fault, None);
        assert_eq!(hidden.status, 500);
        assert!(!hidden.detail.contains("password"));
        assert_eq!(hidden.node_id, "node-a");

        let exposed = ErrorMapper::new("node-a", true).map(&fault, None);
        assert_eq!(exposed.detail, "db password rejected");
    }

    #[test]
    fn test_client_error_details_always_shown() {
        let fault = Fault {
            status: StatusCode::NOT_FOUND,
            message: "no such order".into(),
        };
        let problem = ErrorMapper::new("node-a", false).map(&fault, None);
        assert_eq!(problem.detail, "no such order");
        assert_eq!(problem.title, "Not Found");
    }

    #[tokio::test]
    async fn test_problem_content_type() {
        let response = ProblemResponse::new(StatusCode::BAD_REQUEST, "x", "n").into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_JSON);
    }
}
