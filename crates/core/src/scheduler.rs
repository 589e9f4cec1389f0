//! Batch scheduler adapter: job submission, node lookup and cancellation.

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use llgate_runtime::{CommandRunner, CommandSpec};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SlurmSettings;
use crate::error::{GateError, Result};

static SUBMITTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Submitted batch job (\d+)").expect("SUBMITTED_RE should compile"));

/// Opaque identifier assigned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Operations the orchestrator needs from a batch scheduler.
#[async_trait]
pub trait Scheduler: Send + Sync {
	/// Submits one backend job. Never retried by callers.
	async fn submit(&self) -> Result<JobId>;

	/// Node the job is running on, or `None` while it is still queued.
	async fn query_node(&self, job: &JobId) -> Result<Option<String>>;

	async fn cancel(&self, job: &JobId) -> Result<()>;
}

/// Extracts the job id from `sbatch` stdout.
pub fn parse_submission(stdout: &str) -> Option<JobId> {
	SUBMITTED_RE.captures(stdout).and_then(|caps| caps.get(1)).map(|id| JobId::new(id.as_str()))
}

/// [`Scheduler`] driving the SLURM command line tools.
pub struct SlurmScheduler {
	runner: Arc<dyn CommandRunner>,
	settings: SlurmSettings,
}

impl SlurmScheduler {
	pub fn new(runner: Arc<dyn CommandRunner>, settings: SlurmSettings) -> Self {
		Self { runner, settings }
	}

	/// `sbatch` ignores `SLURM_PARTITION`/`GPU_TYPE`, so they also go on the command line,
	/// where they override any `#SBATCH` directive in the script.
	fn submit_command(&self) -> CommandSpec {
		let s = &self.settings;
		let mut spec = CommandSpec::new(&s.commands.sbatch);
		if !s.partition.is_empty() {
			spec = spec.arg(format!("--partition={}", s.partition));
		}
		if !s.gpu_type.is_empty() {
			spec = spec.arg(format!("--gres={}", s.gpu_type));
		}
		spec.arg(s.script.display().to_string())
			.env("SLURM_PARTITION", &s.partition)
			.env("GPU_TYPE", &s.gpu_type)
			.env("LLAMA_ARGS", &s.backend_args)
			.env("PORT", s.backend_port.to_string())
	}

	fn query_command(&self, job: &JobId) -> CommandSpec {
		CommandSpec::new(&self.settings.commands.squeue).args(["-j", job.as_str(), "-h", "-o", "%B"])
	}

	fn cancel_command(&self, job: &JobId) -> CommandSpec {
		CommandSpec::new(&self.settings.commands.scancel).arg(job.as_str())
	}
}

#[async_trait]
impl Scheduler for SlurmScheduler {
	async fn submit(&self) -> Result<JobId> {
		let spec = self.submit_command();
		let output = self
			.runner
			.run(&spec)
			.await
			.map_err(|err| GateError::SubmissionFailed(format!("failed to run {}: {err}", spec.program)))?;

		if !output.stderr.trim().is_empty() {
			warn!(target = "llgate.scheduler", stderr = %output.stderr.trim(), "sbatch wrote to stderr");
		}
		if !output.success() {
			let code = output.code.map_or_else(|| "signal".to_string(), |c| c.to_string());
			return Err(GateError::SubmissionFailed(format!("{} exited with {code}", spec.program)));
		}
		parse_submission(&output.stdout).ok_or_else(|| GateError::SubmissionFailed("unable to parse sbatch output".into()))
	}

	async fn query_node(&self, job: &JobId) -> Result<Option<String>> {
		let spec = self.query_command(job);
		let output = self.runner.run(&spec).await.map_err(|err| GateError::Scheduler {
			command: spec.to_string(),
			reason: err.to_string(),
		})?;
		if !output.success() {
			debug!(target = "llgate.scheduler", job = %job, code = ?output.code, "squeue returned non-zero");
			return Err(GateError::Scheduler {
				command: spec.to_string(),
				reason: output.stderr.trim().to_string(),
			});
		}
		let node = output.stdout.trim();
		Ok((!node.is_empty()).then(|| node.to_string()))
	}

	async fn cancel(&self, job: &JobId) -> Result<()> {
		let spec = self.cancel_command(job);
		let output = self.runner.run(&spec).await.map_err(|err| GateError::Scheduler {
			command: spec.to_string(),
			reason: err.to_string(),
		})?;
		if output.success() {
			Ok(())
		} else {
			Err(GateError::Scheduler {
				command: spec.to_string(),
				reason: output.stderr.trim().to_string(),
			})
		}
	}
}
