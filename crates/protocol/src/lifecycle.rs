//! Bodies for `/launch`, `/status` and error responses.

use serde::{Deserialize, Serialize};

/// Response to `POST /launch`.
///
/// `job_id` is `null` when the gateway runs against a fixed backend URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
	pub job_id: Option<String>,
}

/// Response to `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
	pub job_id: Option<String>,
	/// The backend endpoint has been located and requests may be proxied.
	pub running: bool,
	/// A connectivity probe against the endpoint has succeeded.
	pub connected: bool,
}

impl StatusResponse {
	/// Status reported for a session with no record.
	pub fn inactive() -> Self {
		Self {
			job_id: None,
			running: false,
			connected: false,
		}
	}
}

/// JSON error body returned with 5xx lifecycle failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
}

impl ErrorResponse {
	pub fn new(message: impl Into<String>) -> Self {
		Self { error: message.into() }
	}
}
