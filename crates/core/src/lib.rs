//! Session-scoped orchestration of batch-scheduled inference backends.
//!
//! Each client session gets at most one scheduler job. The [`Orchestrator`]
//! submits it on first launch, discovers the node it lands on, probes the
//! backend until it accepts connections, and cancels the job once the session
//! ends or goes idle.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod locator;
pub mod orchestrator;
pub mod probe;
pub mod reaper;
pub mod registry;
pub mod scheduler;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{BackendMode, GateConfig, IdleRefresh, SlurmCommands, SlurmSettings};
pub use endpoint::Endpoint;
pub use error::{GateError, Result};
pub use locator::{DiscoveryState, JobLocator, SchedulerLocator, Signal, StatusFileLocator, advance};
pub use orchestrator::{Orchestrator, SessionSnapshot};
pub use probe::{Prober, TcpProber};
pub use registry::{SessionEntry, SessionRecord, SessionRegistry};
pub use scheduler::{JobId, Scheduler, SlurmScheduler, parse_submission};
