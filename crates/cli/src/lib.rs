//! HTTP surface of the gateway: lifecycle routes, the `/api` proxy, session
//! identity, configuration parsing and logging setup.

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod routes;
pub mod session;

pub use app::{AppState, router, serve};
pub use cli::{Cli, ServerConfig};
pub use error::ApiError;
