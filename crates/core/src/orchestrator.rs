//! Session lifecycle facade used by the HTTP layer.
//!
//! Every operation resolves the session's registry entry, takes its record
//! lock briefly, and works on the record. Only `launch` waits on the scheduler,
//! and it does so under the entry's separate launch lock. Background work (idle timer, discovery, probing) runs
//! in [`OwnedTask`]s stored on the record, so closing a record stops all of it.

use std::sync::Arc;

use llgate_runtime::{OwnedTask, SystemRunner, TaskGauge};
use tokio::sync::MutexGuard;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{BackendMode, GateConfig};
use crate::endpoint::Endpoint;
use crate::error::{GateError, Result};
use crate::locator::{DiscoveryState, JobLocator, SchedulerLocator, Signal, StatusFileLocator, advance};
use crate::probe::{Prober, TcpProber};
use crate::reaper::{Cause, Reaper};
use crate::registry::{SessionEntry, SessionRecord, SessionRegistry};
use crate::scheduler::{JobId, Scheduler, SlurmScheduler};

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
	pub job: Option<JobId>,
	pub endpoint: Option<Endpoint>,
	pub connected: bool,
	/// Discovery is still polling for the job's node.
	pub discovering: bool,
	pub idle_armed: bool,
}

impl SessionSnapshot {
	fn of(record: &SessionRecord) -> Self {
		Self {
			job: record.job.clone(),
			endpoint: record.endpoint.clone(),
			connected: record.connected,
			discovering: record.poll.as_ref().is_some_and(|task| !task.is_finished()),
			idle_armed: record.idle.as_ref().is_some_and(|task| !task.is_finished()),
		}
	}

	/// Proxying is possible.
	pub fn running(&self) -> bool {
		self.endpoint.is_some()
	}
}

enum Backend {
	Static(Endpoint),
	Scheduled {
		scheduler: Arc<dyn Scheduler>,
		locator: Arc<dyn JobLocator>,
	},
}

struct Inner {
	config: GateConfig,
	registry: Arc<SessionRegistry>,
	reaper: Arc<Reaper>,
	backend: Backend,
	prober: Arc<dyn Prober>,
	gauge: TaskGauge,
}

#[derive(Clone)]
pub struct Orchestrator {
	inner: Arc<Inner>,
}

impl Orchestrator {
	/// Builds an orchestrator talking to the real scheduler tools.
	pub fn new(config: GateConfig) -> Result<Self> {
		let prober: Arc<dyn Prober> = Arc::new(TcpProber::new(config.probe_timeout));
		let backend = match &config.backend {
			BackendMode::Static(endpoint) => Backend::Static(endpoint.clone()),
			BackendMode::Slurm(settings) => {
				let scheduler: Arc<dyn Scheduler> = Arc::new(SlurmScheduler::new(Arc::new(SystemRunner), settings.clone()));
				let locator: Arc<dyn JobLocator> = match &settings.status_file {
					Some(template) => Arc::new(StatusFileLocator::new(template.clone())),
					None => Arc::new(SchedulerLocator::new(Arc::clone(&scheduler), settings.backend_port)),
				};
				Backend::Scheduled { scheduler, locator }
			}
		};
		Self::assemble(config, backend, prober)
	}

	/// Builds a scheduled-mode orchestrator around the given collaborators.
	///
	/// `config.backend` is ignored; the node port comes from `port`.
	pub fn with_scheduler(config: GateConfig, scheduler: Arc<dyn Scheduler>, port: u16, prober: Arc<dyn Prober>) -> Result<Self> {
		let locator: Arc<dyn JobLocator> = Arc::new(SchedulerLocator::new(Arc::clone(&scheduler), port));
		Self::with_locator(config, scheduler, locator, prober)
	}

	pub fn with_locator(config: GateConfig, scheduler: Arc<dyn Scheduler>, locator: Arc<dyn JobLocator>, prober: Arc<dyn Prober>) -> Result<Self> {
		Self::assemble(config, Backend::Scheduled { scheduler, locator }, prober)
	}

	/// Builds a bypass-mode orchestrator sharing one backend.
	pub fn with_static(config: GateConfig, endpoint: Endpoint, prober: Arc<dyn Prober>) -> Result<Self> {
		Self::assemble(config, Backend::Static(endpoint), prober)
	}

	fn assemble(config: GateConfig, backend: Backend, prober: Arc<dyn Prober>) -> Result<Self> {
		config.validate()?;
		let registry = Arc::new(SessionRegistry::new());
		let gauge = TaskGauge::new();
		let scheduler = match &backend {
			Backend::Scheduled { scheduler, .. } => Some(Arc::clone(scheduler)),
			Backend::Static(_) => None,
		};
		let reaper = Arc::new(Reaper::new(Arc::clone(&registry), scheduler, gauge.clone(), config.session_timeout));
		Ok(Self {
			inner: Arc::new(Inner {
				config,
				registry,
				reaper,
				backend,
				prober,
				gauge,
			}),
		})
	}

	pub fn config(&self) -> &GateConfig {
		&self.inner.config
	}

	/// Ensures the session has a backend, submitting a job on first use.
	///
	/// Repeated and concurrent calls return the first call's job. `Ok(None)`
	/// means bypass mode. The work runs on its own task so a caller that goes
	/// away mid-submission cannot leave a submitted job unrecorded.
	pub async fn launch(&self, session: &str) -> Result<Option<JobId>> {
		let inner = Arc::clone(&self.inner);
		let session = session.to_string();
		tokio::spawn(async move { inner.launch(&session).await })
			.await
			.map_err(|err| GateError::Task(err.to_string()))?
	}

	/// Re-arms the idle timer. Returns `false` when the session has no record.
	pub async fn keepalive(&self, session: &str) -> bool {
		let Some(entry) = self.inner.registry.get(session) else {
			return false;
		};
		let mut record = entry.lock().await;
		if record.closed {
			return false;
		}
		self.inner.reaper.arm(&entry, &mut record);
		true
	}

	/// Tears the session down now. Returns `false` if there was nothing to end.
	pub async fn end(&self, session: &str) -> bool {
		match self.inner.registry.get(session) {
			Some(entry) => self.inner.reaper.teardown(&entry, Cause::Ended).await,
			None => false,
		}
	}

	pub async fn status(&self, session: &str) -> Option<SessionSnapshot> {
		let entry = self.inner.registry.get(session)?;
		let record = entry.lock().await;
		(!record.closed).then(|| SessionSnapshot::of(&record))
	}

	/// Endpoint to forward a proxied request to.
	///
	/// Applies the configured idle refresh policy as a side effect.
	pub async fn route(&self, session: &str) -> Result<Endpoint> {
		let entry = self.inner.registry.get(session).ok_or(GateError::BackendNotReady)?;
		let mut record = entry.lock().await;
		if record.closed {
			return Err(GateError::BackendNotReady);
		}
		let endpoint = record.endpoint.clone();
		if self.inner.config.idle_refresh.refreshes(endpoint.is_some()) {
			self.inner.reaper.arm(&entry, &mut record);
		}
		endpoint.ok_or(GateError::BackendNotReady)
	}

	/// Tears down every session. Returns how many were closed.
	pub async fn shutdown(&self) -> usize {
		let mut closed = 0;
		for entry in self.inner.registry.entries() {
			if self.inner.reaper.teardown(&entry, Cause::Shutdown).await {
				closed += 1;
			}
		}
		info!(target = "llgate.session", closed, "all sessions torn down");
		closed
	}

	pub fn session_count(&self) -> usize {
		self.inner.registry.len()
	}

	/// Background session tasks (idle, discovery, probe) still alive.
	pub fn live_tasks(&self) -> usize {
		self.inner.gauge.live()
	}
}

impl Inner {
	async fn launch(self: &Arc<Self>, session: &str) -> Result<Option<JobId>> {
		loop {
			let (entry, _) = self.registry.get_or_create(session);
			let _launching = entry.begin_launch().await;
			let mut record = entry.lock().await;
			if record.closed {
				// Torn down while we waited; the next lookup yields a fresh entry.
				continue;
			}
			if record.is_launched() {
				self.reaper.arm(&entry, &mut record);
				return Ok(record.job.clone());
			}

			let scheduler = match &self.backend {
				Backend::Static(endpoint) => {
					record.publish_endpoint(endpoint.clone());
					self.reaper.arm(&entry, &mut record);
					record.probe = Some(self.spawn_probe(&entry, endpoint.clone()));
					info!(target = "llgate.session", session, %endpoint, "using static backend");
					return Ok(None);
				}
				Backend::Scheduled { scheduler, .. } => Arc::clone(scheduler),
			};

			// Status, keepalive and proxy lookups must not queue behind sbatch.
			drop(record);
			let submitted = scheduler.submit().await;
			let record = entry.lock().await;
			return self.settle_submission(&entry, record, scheduler.as_ref(), submitted).await;
		}
	}

	async fn settle_submission(
		self: &Arc<Self>,
		entry: &Arc<SessionEntry>,
		mut record: MutexGuard<'_, SessionRecord>,
		scheduler: &dyn Scheduler,
		submitted: Result<JobId>,
	) -> Result<Option<JobId>> {
		let session = entry.id();
		match submitted {
			Ok(job) if record.closed => {
				drop(record);
				warn!(target = "llgate.session", session, %job, "session ended during submission; cancelling job");
				if let Err(err) = scheduler.cancel(&job).await {
					warn!(target = "llgate.session", session, %job, error = %err, "job cancellation failed");
				}
				Err(GateError::SessionClosed)
			}
			Ok(job) => {
				info!(target = "llgate.session", session, %job, "launched job");
				record.job = Some(job.clone());
				self.reaper.arm(entry, &mut record);
				record.poll = Some(self.spawn_discovery(entry, job.clone()));
				Ok(Some(job))
			}
			Err(err) => {
				warn!(target = "llgate.scheduler", session, error = %err, "job submission failed");
				if !record.closed {
					drop(record.close());
					self.registry.remove(session, entry);
				}
				Err(err)
			}
		}
	}

	fn spawn_discovery(self: &Arc<Self>, entry: &Arc<SessionEntry>, job: JobId) -> OwnedTask {
		let inner = Arc::clone(self);
		let entry = Arc::clone(entry);
		self.gauge.spawn("discovery", async move { inner.discover(entry, job).await })
	}

	fn spawn_probe(self: &Arc<Self>, entry: &Arc<SessionEntry>, endpoint: Endpoint) -> OwnedTask {
		let inner = Arc::clone(self);
		let entry = Arc::clone(entry);
		self.gauge.spawn("probe", async move { inner.confirm(entry, endpoint).await })
	}

	/// Polls the locator until the job has an endpoint, then hands over to probing.
	async fn discover(self: Arc<Self>, entry: Arc<SessionEntry>, job: JobId) {
		let Backend::Scheduled { locator, .. } = &self.backend else {
			return;
		};
		let mut state = DiscoveryState::Submitted;
		let mut ticker = tokio::time::interval(self.config.poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let endpoint = loop {
			ticker.tick().await;
			let signal = locator.locate(&job).await;
			let next = advance(state.clone(), signal);
			if next != state {
				debug!(target = "llgate.discovery", session = entry.id(), %job, state = ?next, "discovery advanced");
			}
			state = next;
			if let Some(endpoint) = state.endpoint() {
				break endpoint.clone();
			}
		};

		let mut record = entry.lock().await;
		if !record.publish_endpoint(endpoint.clone()) {
			return;
		}
		info!(target = "llgate.discovery", session = entry.id(), %job, node = endpoint.host(), %endpoint, "job running on node");
		record.probe = Some(self.spawn_probe(&entry, endpoint));
		if let Some(poll) = record.poll.take() {
			poll.release();
		}
	}

	/// Probes until the endpoint accepts a connection, then marks the session connected.
	async fn confirm(self: Arc<Self>, entry: Arc<SessionEntry>, endpoint: Endpoint) {
		let mut state = DiscoveryState::Located(endpoint.clone());
		let mut ticker = tokio::time::interval(self.config.probe_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		while !state.is_ready() {
			ticker.tick().await;
			let reachable = self.prober.probe(&endpoint).await;
			if !reachable {
				debug!(target = "llgate.discovery", session = entry.id(), %endpoint, "backend not accepting connections yet");
			}
			state = advance(state, Signal::Probed(reachable));
		}

		let mut record = entry.lock().await;
		if record.closed {
			return;
		}
		record.connected = true;
		if let Some(probe) = record.probe.take() {
			probe.release();
		}
		info!(target = "llgate.discovery", session = entry.id(), %endpoint, "backend reachable");
	}
}
