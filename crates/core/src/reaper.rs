//! Idle timers and session teardown.

use std::sync::Arc;
use std::time::Duration;

use llgate_runtime::TaskGauge;
use tracing::{debug, info, warn};

use crate::registry::{SessionEntry, SessionRecord, SessionRegistry};
use crate::scheduler::Scheduler;

/// Why a session is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
	/// The idle timer armed with this sequence number fired.
	Idle(u64),
	Ended,
	Shutdown,
}

pub struct Reaper {
	registry: Arc<SessionRegistry>,
	scheduler: Option<Arc<dyn Scheduler>>,
	gauge: TaskGauge,
	timeout: Duration,
}

impl Reaper {
	pub fn new(registry: Arc<SessionRegistry>, scheduler: Option<Arc<dyn Scheduler>>, gauge: TaskGauge, timeout: Duration) -> Self {
		Self {
			registry,
			scheduler,
			gauge,
			timeout,
		}
	}

	/// Restarts the session's idle countdown. The caller holds the entry lock.
	pub fn arm(self: &Arc<Self>, entry: &Arc<SessionEntry>, record: &mut SessionRecord) {
		record.idle_seq += 1;
		let seq = record.idle_seq;
		let reaper = Arc::clone(self);
		let entry = Arc::clone(entry);
		let timeout = self.timeout;
		record.idle = Some(self.gauge.spawn("idle", async move {
			tokio::time::sleep(timeout).await;
			reaper.teardown(&entry, Cause::Idle(seq)).await;
		}));
	}

	/// Closes the session, drops its background tasks and cancels its job.
	///
	/// Returns `false` when the record was already closed or, for an idle
	/// cause, when the timer has since been re-armed.
	pub async fn teardown(&self, entry: &Arc<SessionEntry>, cause: Cause) -> bool {
		let mut closed = {
			let mut record = entry.lock().await;
			if record.closed {
				return false;
			}
			if let Cause::Idle(seq) = cause {
				if seq != record.idle_seq {
					debug!(target = "llgate.session", session = entry.id(), seq, "superseded idle timer ignored");
					return false;
				}
			}
			// Removed under the lock so nobody can look up a closed entry afterwards.
			self.registry.remove(entry.id(), entry);
			record.close()
		};

		// Dropping our own handle would abort this task before the job is cancelled.
		match (cause, closed.idle.take()) {
			(Cause::Idle(_), Some(idle)) => idle.release(),
			(_, idle) => drop(idle),
		}
		drop(closed.poll.take());
		drop(closed.probe.take());

		debug!(target = "llgate.session", session = entry.id(), ?cause, "session closed");
		let (Some(job), Some(scheduler)) = (closed.job, self.scheduler.clone()) else {
			return true;
		};

		// Detached so a caller dropping this future cannot interrupt the cancel.
		let session = entry.id().to_string();
		let cancel = tokio::spawn(async move {
			match scheduler.cancel(&job).await {
				Ok(()) => info!(target = "llgate.session", %session, %job, "cancelled job"),
				Err(err) => warn!(target = "llgate.session", %session, %job, error = %err, "job cancellation failed"),
			}
		});
		if let Err(err) = cancel.await {
			warn!(target = "llgate.session", session = entry.id(), error = %err, "cancel task did not complete");
		}
		true
	}
}
