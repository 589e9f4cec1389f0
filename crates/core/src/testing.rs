//! Scripted doubles for the scheduler and prober seams.
//!
//! Both fakes replay a script of results and repeat the last entry once the
//! script runs out, so "empty, empty, node01" keeps answering `node01`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::endpoint::Endpoint;
use crate::error::{GateError, Result};
use crate::probe::Prober;
use crate::scheduler::{JobId, Scheduler};

struct Script<T: Clone> {
	pending: VecDeque<T>,
	last: T,
}

impl<T: Clone> Script<T> {
	fn new(items: impl IntoIterator<Item = T>, fallback: T) -> Self {
		Self {
			pending: items.into_iter().collect(),
			last: fallback,
		}
	}

	fn next(&mut self) -> T {
		if let Some(item) = self.pending.pop_front() {
			self.last = item;
		}
		self.last.clone()
	}
}

/// In-memory [`Scheduler`] that counts every call.
pub struct FakeScheduler {
	nodes: Mutex<Script<Option<String>>>,
	submit_delay: Duration,
	cancel_delay: Duration,
	submit_error: Option<String>,
	cancel_error: Option<String>,
	submits: AtomicUsize,
	queries: AtomicUsize,
	cancelled: Mutex<Vec<JobId>>,
}

impl Default for FakeScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeScheduler {
	/// A scheduler whose jobs never leave the queue.
	pub fn new() -> Self {
		Self {
			nodes: Mutex::new(Script::new([], None)),
			submit_delay: Duration::ZERO,
			cancel_delay: Duration::ZERO,
			submit_error: None,
			cancel_error: None,
			submits: AtomicUsize::new(0),
			queries: AtomicUsize::new(0),
			cancelled: Mutex::new(Vec::new()),
		}
	}

	/// Successive `query_node` answers.
	pub fn with_nodes<I, S>(self, nodes: I) -> Self
	where
		I: IntoIterator<Item = Option<S>>,
		S: Into<String>,
	{
		let nodes = nodes.into_iter().map(|node| node.map(Into::into));
		Self {
			nodes: Mutex::new(Script::new(nodes, None)),
			..self
		}
	}

	/// Makes `submit` take `delay` before answering.
	pub fn with_submit_delay(self, delay: Duration) -> Self {
		Self { submit_delay: delay, ..self }
	}

	/// Makes `cancel` take `delay` after recording the call.
	pub fn with_cancel_delay(self, delay: Duration) -> Self {
		Self { cancel_delay: delay, ..self }
	}

	pub fn failing_submit(self, reason: impl Into<String>) -> Self {
		Self {
			submit_error: Some(reason.into()),
			..self
		}
	}

	pub fn failing_cancel(self, reason: impl Into<String>) -> Self {
		Self {
			cancel_error: Some(reason.into()),
			..self
		}
	}

	pub fn submits(&self) -> usize {
		self.submits.load(Ordering::SeqCst)
	}

	pub fn queries(&self) -> usize {
		self.queries.load(Ordering::SeqCst)
	}

	pub fn cancels(&self) -> usize {
		self.cancelled.lock().len()
	}

	pub fn cancelled(&self) -> Vec<JobId> {
		self.cancelled.lock().clone()
	}
}

#[async_trait]
impl Scheduler for FakeScheduler {
	async fn submit(&self) -> Result<JobId> {
		if !self.submit_delay.is_zero() {
			tokio::time::sleep(self.submit_delay).await;
		}
		let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
		match &self.submit_error {
			Some(reason) => Err(GateError::SubmissionFailed(reason.clone())),
			None => Ok(JobId::new((1000 + n).to_string())),
		}
	}

	async fn query_node(&self, _job: &JobId) -> Result<Option<String>> {
		self.queries.fetch_add(1, Ordering::SeqCst);
		Ok(self.nodes.lock().next())
	}

	async fn cancel(&self, job: &JobId) -> Result<()> {
		self.cancelled.lock().push(job.clone());
		if !self.cancel_delay.is_zero() {
			tokio::time::sleep(self.cancel_delay).await;
		}
		match &self.cancel_error {
			Some(reason) => Err(GateError::Scheduler {
				command: format!("scancel {job}"),
				reason: reason.clone(),
			}),
			None => Ok(()),
		}
	}
}

/// [`Prober`] replaying scripted reachability results.
pub struct FakeProber {
	results: Mutex<Script<bool>>,
	probes: AtomicUsize,
}

impl FakeProber {
	pub fn new(results: impl IntoIterator<Item = bool>) -> Self {
		Self {
			results: Mutex::new(Script::new(results, false)),
			probes: AtomicUsize::new(0),
		}
	}

	/// Every probe succeeds.
	pub fn reachable() -> Self {
		Self::new([true])
	}

	pub fn probes(&self) -> usize {
		self.probes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Prober for FakeProber {
	async fn probe(&self, _endpoint: &Endpoint) -> bool {
		self.probes.fetch_add(1, Ordering::SeqCst);
		self.results.lock().next()
	}
}
