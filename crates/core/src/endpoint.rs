use std::fmt;

use url::Url;

use crate::error::{GateError, Result};

/// Base URL at which a session's inference backend answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	url: Url,
}

impl Endpoint {
	/// Builds `http://host:port/` for a node reported by the scheduler.
	///
	/// Rejects hosts that would not survive URL parsing intact, such as
	/// placeholder output containing path separators.
	pub fn from_host_port(host: &str, port: u16) -> Result<Self> {
		let raw = format!("http://{host}:{port}/");
		if !host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')) {
			return Err(GateError::InvalidEndpoint(raw));
		}
		let url = Url::parse(&raw).map_err(|_| GateError::InvalidEndpoint(raw.clone()))?;
		let host_matches = url.host_str().is_some_and(|parsed| parsed.eq_ignore_ascii_case(host));
		if !host_matches || url.port_or_known_default() != Some(port) || url.path() != "/" {
			return Err(GateError::InvalidEndpoint(raw));
		}
		Ok(Self { url })
	}

	/// Parses a statically configured backend URL.
	pub fn parse(raw: &str) -> Result<Self> {
		let url = Url::parse(raw).map_err(|_| GateError::InvalidEndpoint(raw.to_string()))?;
		if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
			return Err(GateError::InvalidEndpoint(raw.to_string()));
		}
		Ok(Self { url })
	}

	pub fn host(&self) -> &str {
		self.url.host_str().unwrap_or_default()
	}

	pub fn port(&self) -> u16 {
		self.url.port_or_known_default().unwrap_or(80)
	}

	/// Joins a request path (leading `/`) and optional query onto the base URL.
	///
	/// The base path is kept, so `http://h:8000/v1` + `/chat` yields
	/// `http://h:8000/v1/chat`.
	pub fn forward_url(&self, path: &str, query: Option<&str>) -> String {
		let base = self.url.as_str().trim_end_matches('/');
		let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
		match query {
			Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
			_ => format!("{base}{path}"),
		}
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.url.as_str().trim_end_matches('/'))
	}
}
