use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use llgate::GateError;
use llgate_protocol::ErrorResponse;
use thiserror::Error;

/// Failures returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	Gate(#[from] GateError),

	/// The backend was known but the forwarded request failed.
	#[error("upstream request failed: {0}")]
	Upstream(#[from] reqwest::Error),
}

impl ApiError {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Gate(GateError::BackendNotReady) => StatusCode::SERVICE_UNAVAILABLE,
			Self::Gate(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Upstream(_) => StatusCode::BAD_GATEWAY,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		match self {
			Self::Gate(GateError::BackendNotReady) => (status, "backend not ready").into_response(),
			other => (status, Json(ErrorResponse::new(other.to_string()))).into_response(),
		}
	}
}
