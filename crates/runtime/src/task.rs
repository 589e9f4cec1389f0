//! Owned background task handles.
//!
//! An [`OwnedTask`] aborts its task when dropped, so storing one in an
//! `Option` slot gives "cancel the previous before arming the next" for free:
//! assigning a new handle drops the old one. Every task spawned through a
//! [`TaskGauge`] is counted until its future is dropped, whether it finished
//! or was aborted.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::AbortHandle;

/// Counts tasks whose futures are still alive.
#[derive(Debug, Clone, Default)]
pub struct TaskGauge {
	live: Arc<AtomicUsize>,
}

impl TaskGauge {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of spawned tasks that have neither completed nor been torn down.
	pub fn live(&self) -> usize {
		self.live.load(Ordering::SeqCst)
	}

	/// Spawns `future` on the current runtime and returns its owning handle.
	pub fn spawn<F>(&self, name: &'static str, future: F) -> OwnedTask
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let guard = LiveGuard::enter(Arc::clone(&self.live));
		let handle = tokio::spawn(async move {
			let _guard = guard;
			future.await;
		});
		OwnedTask {
			name,
			handle: Some(handle.abort_handle()),
		}
	}
}

struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
	fn enter(live: Arc<AtomicUsize>) -> Self {
		live.fetch_add(1, Ordering::SeqCst);
		Self(live)
	}
}

impl Drop for LiveGuard {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Abort-on-drop handle to a spawned task.
pub struct OwnedTask {
	name: &'static str,
	handle: Option<AbortHandle>,
}

impl OwnedTask {
	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn is_finished(&self) -> bool {
		self.handle.as_ref().is_none_or(AbortHandle::is_finished)
	}

	/// Gives up ownership without aborting.
	///
	/// Used by a task that clears its own slot on its way out; dropping the
	/// handle there would abort the caller mid-flight.
	pub fn release(mut self) {
		self.handle.take();
	}
}

impl Drop for OwnedTask {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}
}

impl fmt::Debug for OwnedTask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OwnedTask")
			.field("name", &self.name)
			.field("finished", &self.is_finished())
			.finish()
	}
}
