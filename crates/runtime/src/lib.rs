//! Runtime plumbing shared by the orchestrator and the HTTP server.
//!
//! Nothing in here knows about sessions or schedulers: it runs external
//! commands, checks TCP reachability, and owns background tasks.

pub mod net;
pub mod process;
pub mod task;

pub use net::tcp_reachable;
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use task::{OwnedTask, TaskGauge};
