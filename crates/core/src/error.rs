use thiserror::Error;

/// Errors surfaced by the session orchestrator.
///
/// Discovery and probing never produce errors: an unplaced job or an
/// unreachable endpoint is a "not yet" signal handled inside the driver.
#[derive(Debug, Error)]
pub enum GateError {
	#[error("job submission failed: {0}")]
	SubmissionFailed(String),

	/// No endpoint is known for the session yet.
	#[error("backend not ready")]
	BackendNotReady,

	#[error("`{command}` failed: {reason}")]
	Scheduler { command: String, reason: String },

	#[error("invalid endpoint `{0}`")]
	InvalidEndpoint(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	/// The session was ended while its launch was in flight.
	#[error("session ended before launch completed")]
	SessionClosed,

	#[error("background task failed: {0}")]
	Task(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
