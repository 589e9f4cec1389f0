use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use llgate::{BackendMode, Endpoint, GateConfig, GateError, IdleRefresh, SlurmCommands, SlurmSettings};

#[derive(Parser, Debug)]
#[command(name = "llgate")]
#[command(about = "Per-session SLURM inference backends behind one HTTP gateway")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Also append log lines to this file
	#[arg(long, value_name = "FILE", env = "LLGATE_LOG_FILE")]
	pub log_file: Option<PathBuf>,

	#[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
	pub bind: IpAddr,

	#[arg(short, long, env = "PORT", default_value_t = 3000)]
	pub port: u16,

	/// Path prefix every route is mounted under
	#[arg(long, env = "PASSENGER_BASE_URI", default_value = "/")]
	pub base_uri: String,

	/// Shared backend URL; skips job launch and discovery entirely
	#[arg(long, env = "LLAMA_SERVER_URL", value_name = "URL")]
	pub backend_url: Option<String>,

	/// Port the launched inference server listens on
	#[arg(long, env = "LLAMA_SERVER_PORT", default_value_t = llgate::config::DEFAULT_BACKEND_PORT)]
	pub backend_port: u16,

	#[arg(long, env = "SLURM_PARTITION", default_value = "gpu")]
	pub partition: String,

	#[arg(long, env = "GPU_TYPE", default_value = "gpu:1")]
	pub gpu_type: String,

	/// Extra arguments for the inference server
	#[arg(long, env = "LLAMA_ARGS", default_value = "", allow_hyphen_values = true)]
	pub backend_args: String,

	/// Seconds of inactivity before a session's job is cancelled
	#[arg(long, env = "SESSION_TIMEOUT", value_name = "SECS", default_value_t = 600)]
	pub session_timeout: u64,

	#[arg(long, env = "LLAMA_JOB_SCRIPT", default_value = "scripts/run_llama.sh")]
	pub job_script: PathBuf,

	/// Status file written by the job, with %j standing for the job id
	#[arg(long, env = "LLAMA_STATUS_FILE", value_name = "TEMPLATE")]
	pub status_file: Option<String>,

	#[arg(long, env = "POLL_INTERVAL_SECS", value_name = "SECS", default_value_t = 5)]
	pub poll_interval: u64,

	#[arg(long, env = "PROBE_INTERVAL_SECS", value_name = "SECS", default_value_t = 15)]
	pub probe_interval: u64,

	#[arg(long, env = "PROBE_TIMEOUT_MS", value_name = "MS", default_value_t = 2000)]
	pub probe_timeout_ms: u64,

	/// Which proxied requests count as activity: ready, always or never
	#[arg(long, env = "PROXY_EXTENDS_IDLE", default_value = "ready")]
	pub proxy_extends_idle: IdleRefresh,

	#[arg(long, env = "SBATCH_BIN", default_value = "sbatch")]
	pub sbatch: String,

	#[arg(long, env = "SQUEUE_BIN", default_value = "squeue")]
	pub squeue: String,

	#[arg(long, env = "SCANCEL_BIN", default_value = "scancel")]
	pub scancel: String,
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub listen: SocketAddr,
	pub base_uri: String,
	pub gate: GateConfig,
}

impl Cli {
	pub fn into_config(self) -> Result<ServerConfig, GateError> {
		let backend = match self.backend_url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
			Some(url) => BackendMode::Static(Endpoint::parse(url)?),
			None => BackendMode::Slurm(SlurmSettings {
				script: self.job_script,
				partition: self.partition,
				gpu_type: self.gpu_type,
				backend_args: self.backend_args,
				backend_port: self.backend_port,
				status_file: self.status_file.filter(|template| !template.trim().is_empty()),
				commands: SlurmCommands {
					sbatch: self.sbatch,
					squeue: self.squeue,
					scancel: self.scancel,
				},
			}),
		};

		let gate = GateConfig {
			session_timeout: Duration::from_secs(self.session_timeout),
			poll_interval: Duration::from_secs(self.poll_interval),
			probe_interval: Duration::from_secs(self.probe_interval),
			probe_timeout: Duration::from_millis(self.probe_timeout_ms),
			idle_refresh: self.proxy_extends_idle,
			backend,
		};
		gate.validate()?;

		Ok(ServerConfig {
			listen: SocketAddr::new(self.bind, self.port),
			base_uri: normalize_base_uri(&self.base_uri),
			gate,
		})
	}
}

/// Canonical mount prefix: leading slash, no trailing slash, `/` for root.
pub fn normalize_base_uri(raw: &str) -> String {
	let trimmed = raw.trim().trim_matches('/');
	if trimmed.is_empty() { "/".to_string() } else { format!("/{trimmed}") }
}
