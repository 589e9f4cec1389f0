//! Endpoint discovery for submitted jobs.
//!
//! Discovery is split into a pure state machine ([`advance`]) and sources of
//! [`Signal`]s ([`JobLocator`] implementations, plus probe results). The
//! orchestrator's driver owns the loop and the timing.
//!
//! ```text
//! Submitted --Placed(host)--> Scheduled --Placed(host, port)--> Located --Probed(true)--> Ready
//!     \________________________Placed(host, port)_____________/
//! ```

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::scheduler::{JobId, Scheduler};

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*HOST=(\S+)\s*$").expect("HOST_RE should compile"));
static PORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*PORT=(\d+)\s*$").expect("PORT_RE should compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryState {
	Submitted,
	/// Placed on a node whose serving port is not known yet.
	Scheduled { host: String },
	/// Endpoint known; connectivity unconfirmed.
	Located(Endpoint),
	Ready(Endpoint),
}

impl DiscoveryState {
	pub fn endpoint(&self) -> Option<&Endpoint> {
		match self {
			Self::Located(endpoint) | Self::Ready(endpoint) => Some(endpoint),
			Self::Submitted | Self::Scheduled { .. } => None,
		}
	}

	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Ready(_))
	}
}

/// One observation fed into [`advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
	/// Not placed yet, or the source had nothing usable.
	Queued,
	Placed { host: String, port: Option<u16> },
	Probed(bool),
}

/// Pure discovery transition.
///
/// Endpoints are never lost once located: placement signals after `Located`
/// are ignored, and a failed probe keeps the state where it is.
pub fn advance(state: DiscoveryState, signal: Signal) -> DiscoveryState {
	match (state, signal) {
		(DiscoveryState::Submitted | DiscoveryState::Scheduled { .. }, Signal::Placed { host, port: Some(port) }) => {
			match Endpoint::from_host_port(&host, port) {
				Ok(endpoint) => DiscoveryState::Located(endpoint),
				Err(_) => DiscoveryState::Scheduled { host },
			}
		}
		(DiscoveryState::Submitted | DiscoveryState::Scheduled { .. }, Signal::Placed { host, port: None }) => DiscoveryState::Scheduled { host },
		(DiscoveryState::Located(endpoint), Signal::Probed(true)) => DiscoveryState::Ready(endpoint),
		(state, _) => state,
	}
}

/// Source of placement signals for a job.
#[async_trait]
pub trait JobLocator: Send + Sync {
	/// Single discovery attempt. Never fails: anything unusable is [`Signal::Queued`].
	async fn locate(&self, job: &JobId) -> Signal;
}

/// Asks the scheduler which node runs the job; the port is fixed by config.
pub struct SchedulerLocator {
	scheduler: Arc<dyn Scheduler>,
	port: u16,
}

impl SchedulerLocator {
	pub fn new(scheduler: Arc<dyn Scheduler>, port: u16) -> Self {
		Self { scheduler, port }
	}
}

#[async_trait]
impl JobLocator for SchedulerLocator {
	async fn locate(&self, job: &JobId) -> Signal {
		match self.scheduler.query_node(job).await {
			Ok(Some(host)) => Signal::Placed { host, port: Some(self.port) },
			Ok(None) => Signal::Queued,
			Err(err) => {
				debug!(target = "llgate.discovery", job = %job, error = %err, "node query failed");
				Signal::Queued
			}
		}
	}
}

/// Reads `HOST=` / `PORT=` lines from a file the job writes once its server starts.
#[derive(Debug, Clone)]
pub struct StatusFileLocator {
	template: String,
}

impl StatusFileLocator {
	/// `template` names the artifact, with `%j` replaced by the job id.
	pub fn new(template: impl Into<String>) -> Self {
		Self { template: template.into() }
	}

	pub fn path_for(&self, job: &JobId) -> PathBuf {
		PathBuf::from(self.template.replace("%j", job.as_str()))
	}
}

#[async_trait]
impl JobLocator for StatusFileLocator {
	async fn locate(&self, job: &JobId) -> Signal {
		let path = self.path_for(job);
		match tokio::fs::read_to_string(&path).await {
			Ok(contents) => parse_status(&contents),
			Err(err) => {
				trace!(target = "llgate.discovery", path = %path.display(), error = %err, "status file not readable yet");
				Signal::Queued
			}
		}
	}
}

/// Parses a status artifact. A file with a host but no port yet is a partial write.
pub fn parse_status(contents: &str) -> Signal {
	let Some(host) = HOST_RE.captures(contents).and_then(|c| c.get(1)) else {
		return Signal::Queued;
	};
	let port = PORT_RE
		.captures(contents)
		.and_then(|c| c.get(1))
		.and_then(|p| p.as_str().parse::<u16>().ok());
	Signal::Placed {
		host: host.as_str().to_string(),
		port,
	}
}
