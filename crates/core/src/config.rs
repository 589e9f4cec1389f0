//! Orchestrator configuration.
//!
//! Values arrive already parsed from the binary's CLI layer; this module only
//! holds them and checks the few combinations that cannot work.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::{GateError, Result};

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Re-probe cadence once the node is known. Only `connected` waits on it;
/// proxying opens as soon as the endpoint is published, so a backend that
/// starts listening just after a failed probe reports `connected` up to this
/// long later.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_BACKEND_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct GateConfig {
	/// Inactivity after which a session's job is cancelled.
	pub session_timeout: Duration,
	pub poll_interval: Duration,
	pub probe_interval: Duration,
	/// Upper bound on a single connectivity probe.
	pub probe_timeout: Duration,
	pub idle_refresh: IdleRefresh,
	pub backend: BackendMode,
}

impl Default for GateConfig {
	fn default() -> Self {
		Self {
			session_timeout: DEFAULT_SESSION_TIMEOUT,
			poll_interval: DEFAULT_POLL_INTERVAL,
			probe_interval: DEFAULT_PROBE_INTERVAL,
			probe_timeout: DEFAULT_PROBE_TIMEOUT,
			idle_refresh: IdleRefresh::default(),
			backend: BackendMode::Slurm(SlurmSettings::default()),
		}
	}
}

impl GateConfig {
	pub fn validate(&self) -> Result<()> {
		for (name, value) in [
			("session timeout", self.session_timeout),
			("poll interval", self.poll_interval),
			("probe interval", self.probe_interval),
			("probe timeout", self.probe_timeout),
		] {
			if value.is_zero() {
				return Err(GateError::Config(format!("{name} must be greater than zero")));
			}
		}
		if let BackendMode::Slurm(settings) = &self.backend {
			if settings.backend_port == 0 {
				return Err(GateError::Config("backend port must be non-zero".into()));
			}
			if let Some(template) = &settings.status_file {
				if !template.contains("%j") {
					return Err(GateError::Config(format!("status file template `{template}` has no %j placeholder")));
				}
			}
		}
		Ok(())
	}
}

/// Where session backends come from.
#[derive(Debug, Clone)]
pub enum BackendMode {
	/// One shared, pre-existing backend; nothing is launched or discovered.
	Static(Endpoint),
	/// One batch job per session.
	Slurm(SlurmSettings),
}

#[derive(Debug, Clone)]
pub struct SlurmSettings {
	/// Batch script handed to `sbatch`.
	pub script: PathBuf,
	pub partition: String,
	pub gpu_type: String,
	/// Passed through to the inference server as `LLAMA_ARGS`.
	pub backend_args: String,
	/// Port the job's server listens on, exported as `PORT`.
	pub backend_port: u16,
	/// Status artifact path with `%j` standing for the job id.
	///
	/// When unset, the node is discovered through `squeue`.
	pub status_file: Option<String>,
	pub commands: SlurmCommands,
}

impl Default for SlurmSettings {
	fn default() -> Self {
		Self {
			script: PathBuf::from("scripts/run_llama.sh"),
			partition: "gpu".into(),
			gpu_type: "gpu:1".into(),
			backend_args: String::new(),
			backend_port: DEFAULT_BACKEND_PORT,
			status_file: None,
			commands: SlurmCommands::default(),
		}
	}
}

/// Scheduler program names, resolved through `PATH` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmCommands {
	pub sbatch: String,
	pub squeue: String,
	pub scancel: String,
}

impl Default for SlurmCommands {
	fn default() -> Self {
		Self {
			sbatch: "sbatch".into(),
			squeue: "squeue".into(),
			scancel: "scancel".into(),
		}
	}
}

/// Whether proxied API traffic counts as session activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdleRefresh {
	/// Only lifecycle calls re-arm the idle timer.
	Never,
	/// Requests that are actually forwarded re-arm the timer.
	#[default]
	WhenReady,
	/// Any request for an active session re-arms the timer, including ones
	/// rejected as not ready.
	Always,
}

impl IdleRefresh {
	pub fn refreshes(self, ready: bool) -> bool {
		match self {
			Self::Never => false,
			Self::WhenReady => ready,
			Self::Always => true,
		}
	}
}

impl FromStr for IdleRefresh {
	type Err = GateError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"never" => Ok(Self::Never),
			"ready" | "when-ready" => Ok(Self::WhenReady),
			"always" => Ok(Self::Always),
			other => Err(GateError::Config(format!("unknown idle refresh policy `{other}` (expected ready, always or never)"))),
		}
	}
}

impl fmt::Display for IdleRefresh {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Never => "never",
			Self::WhenReady => "ready",
			Self::Always => "always",
		})
	}
}
