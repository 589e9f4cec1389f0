//! External command execution shared by scheduler adapters.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::trace;

/// A fully described external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
	pub program: String,
	pub args: Vec<String>,
	/// Variables added on top of the inherited environment.
	pub env: Vec<(String, String)>,
}

impl CommandSpec {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			env: Vec::new(),
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.push((key.into(), value.into()));
		self
	}

	/// Returns the value of an added environment variable.
	pub fn env_value(&self, key: &str) -> Option<&str> {
		self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}
}

impl fmt::Display for CommandSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.program)?;
		for arg in &self.args {
			write!(f, " {arg}")?;
		}
		Ok(())
	}
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	/// Exit code; `None` when the process was killed by a signal.
	pub code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	/// Successful output carrying `stdout`.
	pub fn ok(stdout: impl Into<String>) -> Self {
		Self {
			code: Some(0),
			stdout: stdout.into(),
			stderr: String::new(),
		}
	}

	/// Failed output with exit `code` and `stderr`.
	pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
		Self {
			code: Some(code),
			stdout: String::new(),
			stderr: stderr.into(),
		}
	}

	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

/// Runs external commands to completion.
///
/// Spawn failures surface as `Err`; a process that ran and exited non-zero is
/// an `Ok` output whose [`CommandOutput::success`] is false.
#[async_trait]
pub trait CommandRunner: Send + Sync {
	async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
	async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
		trace!(target = "llgate.process", command = %spec, "spawning");
		let output = tokio::process::Command::new(&spec.program)
			.args(&spec.args)
			.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
			.stdin(Stdio::null())
			.output()
			.await?;

		Ok(CommandOutput {
			code: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}
}
