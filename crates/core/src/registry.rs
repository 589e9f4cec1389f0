//! Session table.
//!
//! The table itself sits behind a synchronous lock that is never held across
//! an await. Each entry carries two async locks: the record lock, held only
//! for short state changes, and the launch lock, held across job submission
//! so concurrent launches of one session submit a single job. Status and
//! proxy lookups take the record lock only and never wait on `sbatch`.

use std::collections::HashMap;
use std::sync::Arc;

use llgate_runtime::OwnedTask;
use parking_lot::Mutex;
use tokio::sync::MutexGuard;

use crate::endpoint::Endpoint;
use crate::scheduler::JobId;

#[derive(Debug, Default)]
pub struct SessionRegistry {
	entries: Mutex<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the session's entry, inserting an empty one if absent.
	///
	/// The flag is `true` when this call created the entry.
	pub fn get_or_create(&self, session: &str) -> (Arc<SessionEntry>, bool) {
		let mut entries = self.entries.lock();
		if let Some(entry) = entries.get(session) {
			return (Arc::clone(entry), false);
		}
		let entry = Arc::new(SessionEntry::new(session));
		entries.insert(session.to_string(), Arc::clone(&entry));
		(entry, true)
	}

	pub fn get(&self, session: &str) -> Option<Arc<SessionEntry>> {
		self.entries.lock().get(session).cloned()
	}

	/// Removes `entry` if it is still the one registered under `session`.
	///
	/// A stale holder of an old entry can never evict a newer one.
	pub fn remove(&self, session: &str, entry: &Arc<SessionEntry>) -> bool {
		let mut entries = self.entries.lock();
		match entries.get(session) {
			Some(current) if Arc::ptr_eq(current, entry) => {
				entries.remove(session);
				true
			}
			_ => false,
		}
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Snapshot of every registered entry.
	pub fn entries(&self) -> Vec<Arc<SessionEntry>> {
		self.entries.lock().values().cloned().collect()
	}
}

#[derive(Debug)]
pub struct SessionEntry {
	id: String,
	launching: tokio::sync::Mutex<()>,
	record: tokio::sync::Mutex<SessionRecord>,
}

impl SessionEntry {
	fn new(id: &str) -> Self {
		Self {
			id: id.to_string(),
			launching: tokio::sync::Mutex::new(()),
			record: tokio::sync::Mutex::new(SessionRecord::default()),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub async fn lock(&self) -> MutexGuard<'_, SessionRecord> {
		self.record.lock().await
	}

	/// Serializes launches of this session. The record lock may be taken
	/// while this is held, never the other way round.
	pub async fn begin_launch(&self) -> MutexGuard<'_, ()> {
		self.launching.lock().await
	}
}

/// Mutable per-session state. Only reachable through [`SessionEntry::lock`].
#[derive(Debug, Default)]
pub struct SessionRecord {
	pub(crate) job: Option<JobId>,
	pub(crate) endpoint: Option<Endpoint>,
	pub(crate) connected: bool,
	/// Set once teardown has begun; every later callback is a no-op.
	pub(crate) closed: bool,
	pub(crate) idle: Option<OwnedTask>,
	/// Bumped on every re-arm so a superseded timer can tell it is stale.
	pub(crate) idle_seq: u64,
	pub(crate) poll: Option<OwnedTask>,
	pub(crate) probe: Option<OwnedTask>,
}

impl SessionRecord {
	pub fn endpoint(&self) -> Option<&Endpoint> {
		self.endpoint.as_ref()
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}

	/// A job was submitted or a static endpoint assigned.
	pub fn is_launched(&self) -> bool {
		self.job.is_some() || self.endpoint.is_some()
	}

	/// Records the endpoint if none is known yet. Returns whether it was set.
	pub(crate) fn publish_endpoint(&mut self, endpoint: Endpoint) -> bool {
		if self.closed || self.endpoint.is_some() {
			return false;
		}
		self.endpoint = Some(endpoint);
		true
	}

	/// Marks the record closed and hands back everything teardown must dispose of.
	pub(crate) fn close(&mut self) -> ClosedRecord {
		self.closed = true;
		ClosedRecord {
			job: self.job.clone(),
			idle: self.idle.take(),
			poll: self.poll.take(),
			probe: self.probe.take(),
		}
	}
}

#[derive(Debug)]
pub(crate) struct ClosedRecord {
	pub job: Option<JobId>,
	pub idle: Option<OwnedTask>,
	pub poll: Option<OwnedTask>,
	pub probe: Option<OwnedTask>,
}
