//! Session identity for incoming requests.
//!
//! A client names its session with the `x-session-id` header or the
//! `llgate.sid` cookie. Requests carrying neither get a fresh id, returned in
//! a `Set-Cookie` that lives as long as the idle timeout.

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::trace;
use uuid::Uuid;

use crate::app::AppState;

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_COOKIE: &str = "llgate.sid";

const MAX_SESSION_ID_LEN: usize = 128;

/// Session key attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Resolves the caller's session from headers, if it supplied a usable one.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
	let from_header = headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok()).map(str::trim);
	let from_cookie = || {
		headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.flat_map(|value| value.split(';'))
			.filter_map(|pair| pair.trim().split_once('='))
			.find(|(name, _)| *name == SESSION_COOKIE)
			.map(|(_, value)| value.trim())
	};
	from_header
		.filter(|id| is_valid_id(id))
		.or_else(|| from_cookie().filter(|id| is_valid_id(id)))
		.map(|id| SessionId(id.to_string()))
}

fn is_valid_id(id: &str) -> bool {
	!id.is_empty() && id.len() <= MAX_SESSION_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Middleware attaching a [`SessionId`] and minting one when absent.
pub async fn assign_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
	let (session, minted) = match session_from_headers(request.headers()) {
		Some(session) => (session, false),
		None => (SessionId(Uuid::new_v4().to_string()), true),
	};
	request.extensions_mut().insert(session.clone());

	let mut response = next.run(request).await;
	if minted {
		trace!(target = "llgate.session", session = session.as_str(), "minted session id");
		let cookie = format!(
			"{SESSION_COOKIE}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
			session.as_str(),
			state.cookie_path,
			state.session_ttl.as_secs()
		);
		if let Ok(value) = HeaderValue::from_str(&cookie) {
			response.headers_mut().append(SET_COOKIE, value);
		}
	}
	response
}
