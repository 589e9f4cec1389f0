use std::sync::Arc;
use std::time::Duration;

use llgate::testing::{FakeProber, FakeScheduler};
use llgate::{GateConfig, JobLocator, Orchestrator, StatusFileLocator};

fn config() -> GateConfig {
	GateConfig {
		poll_interval: Duration::from_secs(5),
		probe_interval: Duration::from_secs(2),
		..GateConfig::default()
	}
}

#[tokio::test(start_paused = true)]
async fn discovery_converges_and_stops_polling() {
	let scheduler = Arc::new(FakeScheduler::new().with_nodes([None, None, Some("node01")]));
	let prober = Arc::new(FakeProber::new([false, true]));
	let gate = Orchestrator::with_scheduler(config(), scheduler.clone(), 8000, prober.clone()).unwrap();

	gate.launch("s1").await.unwrap();

	// Queries at 0s and 5s come back empty.
	tokio::time::sleep(Duration::from_secs(6)).await;
	let status = gate.status("s1").await.unwrap();
	assert!(!status.running());
	assert!(status.discovering);
	assert_eq!(scheduler.queries(), 2);

	// Third query at 10s places the job; the immediate probe fails.
	tokio::time::sleep(Duration::from_secs(5)).await;
	let status = gate.status("s1").await.unwrap();
	assert_eq!(status.endpoint.as_ref().map(ToString::to_string).as_deref(), Some("http://node01:8000"));
	assert!(!status.connected);
	assert!(!status.discovering);
	assert_eq!(gate.route("s1").await.unwrap().host(), "node01");

	// Re-probe at 12s succeeds.
	tokio::time::sleep(Duration::from_secs(2)).await;
	let status = gate.status("s1").await.unwrap();
	assert!(status.connected);
	assert_eq!(prober.probes(), 2);

	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(scheduler.queries(), 3);
	assert_eq!(prober.probes(), 2);
	assert_eq!(gate.live_tasks(), 1, "only the idle timer remains");
}

#[tokio::test(start_paused = true)]
async fn default_probe_interval_delays_only_connected() {
	let scheduler = Arc::new(FakeScheduler::new().with_nodes([None, None, Some("node01")]));
	let prober = Arc::new(FakeProber::new([false, true]));
	let gate = Orchestrator::with_scheduler(GateConfig::default(), scheduler.clone(), 8000, prober.clone()).unwrap();
	gate.launch("s1").await.unwrap();

	// Placed on the third poll at 10s: proxying opens, the first probe fails.
	tokio::time::sleep(Duration::from_secs(11)).await;
	let status = gate.status("s1").await.unwrap();
	assert!(status.running());
	assert!(!status.connected);

	tokio::time::sleep(Duration::from_secs(13)).await;
	assert!(!gate.status("s1").await.unwrap().connected);

	// Re-probe at 25s.
	tokio::time::sleep(Duration::from_secs(2)).await;
	assert!(gate.status("s1").await.unwrap().connected);
	assert_eq!(prober.probes(), 2);
}

#[tokio::test(start_paused = true)]
async fn placeholder_node_output_keeps_polling() {
	let scheduler = Arc::new(FakeScheduler::new().with_nodes([Some("n/a"), Some("gpu02")]));
	let gate = Orchestrator::with_scheduler(config(), scheduler.clone(), 8000, Arc::new(FakeProber::reachable())).unwrap();

	gate.launch("s1").await.unwrap();
	tokio::time::sleep(Duration::from_secs(1)).await;
	assert!(!gate.status("s1").await.unwrap().running());

	tokio::time::sleep(Duration::from_secs(5)).await;
	let status = gate.status("s1").await.unwrap();
	assert_eq!(status.endpoint.map(|e| e.host().to_string()).as_deref(), Some("gpu02"));
}

#[tokio::test]
async fn status_file_discovery_uses_artifact_host_and_port() {
	let dir = tempfile::tempdir().unwrap();
	let template = dir.path().join("llama-%j.status").display().to_string();
	let locator = StatusFileLocator::new(template);

	let scheduler = Arc::new(FakeScheduler::new());
	let config = GateConfig {
		poll_interval: Duration::from_millis(20),
		probe_interval: Duration::from_millis(20),
		..GateConfig::default()
	};
	let gate = Orchestrator::with_locator(config, scheduler.clone(), Arc::new(locator.clone()), Arc::new(FakeProber::reachable())).unwrap();

	let job = gate.launch("s1").await.unwrap().unwrap();
	tokio::time::sleep(Duration::from_millis(60)).await;
	assert!(!gate.status("s1").await.unwrap().running());

	std::fs::write(locator.path_for(&job), "HOST=gpu11\nPORT=8042\n").unwrap();

	let mut connected = None;
	for _ in 0..100 {
		tokio::time::sleep(Duration::from_millis(20)).await;
		let status = gate.status("s1").await.unwrap();
		if status.connected {
			connected = status.endpoint;
			break;
		}
	}
	assert_eq!(connected.map(|e| e.to_string()).as_deref(), Some("http://gpu11:8042"));
	assert_eq!(scheduler.queries(), 0, "artifact discovery never asks the scheduler");
	assert!(gate.end("s1").await);
}

#[tokio::test]
async fn status_locator_is_queued_until_file_appears() {
	let dir = tempfile::tempdir().unwrap();
	let locator = StatusFileLocator::new(dir.path().join("%j.out").display().to_string());
	let job = llgate::JobId::new("77");
	assert_eq!(locator.locate(&job).await, llgate::Signal::Queued);
}
