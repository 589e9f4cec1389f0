use std::time::Duration;

use async_trait::async_trait;
use llgate_runtime::tcp_reachable;

use crate::endpoint::Endpoint;

/// Checks whether an endpoint accepts connections.
#[async_trait]
pub trait Prober: Send + Sync {
	async fn probe(&self, endpoint: &Endpoint) -> bool;
}

/// One bounded TCP connect per probe.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
	timeout: Duration,
}

impl TcpProber {
	pub fn new(timeout: Duration) -> Self {
		Self { timeout }
	}
}

#[async_trait]
impl Prober for TcpProber {
	async fn probe(&self, endpoint: &Endpoint) -> bool {
		tcp_reachable(endpoint.host(), endpoint.port(), self.timeout).await
	}
}
