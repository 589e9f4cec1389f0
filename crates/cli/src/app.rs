use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::middleware;
use axum::routing::{any, get, post};
use llgate::Orchestrator;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::ServerConfig;
use crate::{proxy, routes, session};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
	pub gate: Orchestrator,
	pub client: reqwest::Client,
	/// `Path` attribute for minted session cookies.
	pub cookie_path: Arc<str>,
	pub session_ttl: Duration,
}

impl AppState {
	pub fn new(gate: Orchestrator, base_uri: &str) -> Result<Self, reqwest::Error> {
		let client = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build()?;
		let session_ttl = gate.config().session_timeout;
		Ok(Self {
			gate,
			client,
			cookie_path: Arc::from(base_uri),
			session_ttl,
		})
	}
}

/// Builds the full router, nested under `base_uri` unless it is `/`.
pub fn router(state: AppState, base_uri: &str) -> Router {
	let routes = Router::new()
		.route("/launch", post(routes::launch))
		.route("/keepalive", post(routes::keepalive))
		.route("/end", post(routes::end))
		.route("/status", get(routes::status))
		.route(proxy::API_PREFIX, any(proxy::forward))
		// `{*path}` needs at least one character, so the bare trailing slash gets its own route.
		.route("/api/", any(proxy::forward))
		.route("/api/{*path}", any(proxy::forward))
		.layer(middleware::from_fn_with_state(state.clone(), session::assign_session))
		.route("/health", get(routes::health))
		.with_state(state);

	if base_uri == "/" { routes } else { Router::new().nest(base_uri, routes) }
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
	let gate = Orchestrator::new(config.gate.clone()).context("invalid gateway configuration")?;
	let state = AppState::new(gate.clone(), &config.base_uri).context("failed to build HTTP client")?;
	let app = router(state, &config.base_uri);

	let listener = TcpListener::bind(config.listen)
		.await
		.with_context(|| format!("failed to bind {}", config.listen))?;
	info!(target = "llgate.server", addr = %config.listen, base_uri = %config.base_uri, "gateway listening");

	let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

	let closed = gate.shutdown().await;
	info!(target = "llgate.server", sessions = closed, "gateway stopped");
	served.context("server error")
}

async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};
		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				tokio::select! {
					_ = tokio::signal::ctrl_c() => {}
					_ = sigterm.recv() => {}
				}
			}
			Err(err) => {
				warn!(target = "llgate.server", error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C only");
				let _ = tokio::signal::ctrl_c().await;
			}
		}
	}
	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
	}
	info!(target = "llgate.server", "shutdown requested");
}
