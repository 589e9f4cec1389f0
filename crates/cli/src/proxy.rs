//! Forwarding of `/api/*` to the session's backend.

use axum::Extension;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::{self, HeaderName};
use axum::response::Response;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::error::ApiError;
use crate::session::SessionId;

/// Mount prefix removed before forwarding.
pub const API_PREFIX: &str = "/api";

const HOP_BY_HOP: [&str; 8] = [
	"connection",
	"keep-alive",
	"proxy-authenticate",
	"proxy-authorization",
	"te",
	"trailer",
	"transfer-encoding",
	"upgrade",
];

pub async fn forward(State(state): State<AppState>, Extension(session): Extension<SessionId>, request: Request) -> Result<Response, ApiError> {
	let endpoint = state.gate.route(session.as_str()).await?;

	let (parts, body) = request.into_parts();
	let path = upstream_path(parts.uri.path());
	let target = endpoint.forward_url(path, parts.uri.query());

	let mut headers = parts.headers;
	strip_hop_by_hop(&mut headers);
	headers.remove(header::HOST);

	debug!(target = "llgate.proxy", session = session.as_str(), method = %parts.method, %target, "forwarding");
	let upstream = state
		.client
		.request(parts.method, &target)
		.headers(headers)
		.body(reqwest::Body::wrap_stream(body.into_data_stream()))
		.send()
		.await
		.map_err(|err| {
			warn!(target = "llgate.proxy", session = session.as_str(), %target, error = %err, "upstream request failed");
			ApiError::Upstream(err)
		})?;

	let status = upstream.status();
	let mut response_headers = upstream.headers().clone();
	strip_hop_by_hop(&mut response_headers);

	let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
	*response.status_mut() = status;
	*response.headers_mut() = response_headers;
	Ok(response)
}

/// Request path as the backend should see it.
pub fn upstream_path(path: &str) -> &str {
	match path.strip_prefix(API_PREFIX) {
		Some("") => "/",
		Some(rest) if rest.starts_with('/') => rest,
		_ => path,
	}
}

/// Removes connection-scoped headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
	let named: Vec<HeaderName> = headers
		.get_all(header::CONNECTION)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
		.collect();
	for name in &named {
		headers.remove(name);
	}
	for name in HOP_BY_HOP {
		headers.remove(name);
	}
}
