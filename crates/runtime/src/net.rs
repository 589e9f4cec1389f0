//! Socket reachability helpers.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::trace;

/// Returns `true` when a TCP connection to `host:port` completes within `timeout`.
///
/// Refusals, resolution failures and timeouts all read as `false`.
pub async fn tcp_reachable(host: &str, port: u16, timeout: Duration) -> bool {
	match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
		Ok(Ok(_stream)) => true,
		Ok(Err(err)) => {
			trace!(target = "llgate.net", host, port, error = %err, "connect failed");
			false
		}
		Err(_) => {
			trace!(target = "llgate.net", host, port, ?timeout, "connect timed out");
			false
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn listening_port_is_reachable() {
		let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(tcp_reachable("127.0.0.1", port, Duration::from_millis(500)).await);
	}

	#[tokio::test]
	async fn closed_port_is_unreachable() {
		let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);
		assert!(!tcp_reachable("127.0.0.1", port, Duration::from_millis(500)).await);
	}

	#[tokio::test]
	async fn unresolvable_host_is_unreachable() {
		assert!(!tcp_reachable("no-such-node.invalid", 8000, Duration::from_millis(500)).await);
	}
}
