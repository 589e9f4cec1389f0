//! Session lifecycle handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use llgate_protocol::{LaunchResponse, StatusResponse};

use crate::app::AppState;
use crate::error::ApiError;
use crate::session::SessionId;

pub async fn launch(State(state): State<AppState>, Extension(session): Extension<SessionId>) -> Result<Json<LaunchResponse>, ApiError> {
	let job = state.gate.launch(session.as_str()).await?;
	Ok(Json(LaunchResponse {
		job_id: job.map(|job| job.to_string()),
	}))
}

pub async fn keepalive(State(state): State<AppState>, Extension(session): Extension<SessionId>) -> StatusCode {
	state.gate.keepalive(session.as_str()).await;
	StatusCode::OK
}

pub async fn end(State(state): State<AppState>, Extension(session): Extension<SessionId>) -> StatusCode {
	state.gate.end(session.as_str()).await;
	StatusCode::OK
}

pub async fn status(State(state): State<AppState>, Extension(session): Extension<SessionId>) -> Json<StatusResponse> {
	let body = match state.gate.status(session.as_str()).await {
		Some(snapshot) => StatusResponse {
			job_id: snapshot.job.as_ref().map(ToString::to_string),
			running: snapshot.running(),
			connected: snapshot.connected,
		},
		None => StatusResponse::inactive(),
	};
	Json(body)
}

pub async fn health() -> &'static str {
	"ok"
}
