use std::sync::Arc;
use std::time::Duration;

use llgate::testing::{FakeProber, FakeScheduler};
use llgate::{Endpoint, GateConfig, GateError, IdleRefresh, Orchestrator};

fn config(timeout: Duration) -> GateConfig {
	GateConfig {
		session_timeout: timeout,
		poll_interval: Duration::from_secs(5),
		probe_interval: Duration::from_secs(2),
		..GateConfig::default()
	}
}

fn gate(config: GateConfig, scheduler: &Arc<FakeScheduler>) -> Orchestrator {
	Orchestrator::with_scheduler(config, scheduler.clone(), 8000, Arc::new(FakeProber::reachable())).unwrap()
}

async fn settle() {
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}
}

#[tokio::test(start_paused = true)]
async fn concurrent_launches_submit_one_job() {
	let scheduler = Arc::new(FakeScheduler::new().with_submit_delay(Duration::from_millis(200)));
	let gate = gate(config(Duration::from_secs(600)), &scheduler);

	let (first, second) = tokio::join!(gate.launch("s1"), gate.launch("s1"));
	let first = first.unwrap();
	let second = second.unwrap();

	assert!(first.is_some());
	assert_eq!(first, second);
	assert_eq!(scheduler.submits(), 1);

	let again = gate.launch("s1").await.unwrap();
	assert_eq!(again, first);
	assert_eq!(scheduler.submits(), 1);
	assert_eq!(gate.session_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn sessions_get_separate_jobs() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(600)), &scheduler);

	let a = gate.launch("a").await.unwrap();
	let b = gate.launch("b").await.unwrap();
	assert_ne!(a, b);
	assert_eq!(scheduler.submits(), 2);
}

#[tokio::test(start_paused = true)]
async fn idle_session_is_cancelled_and_removed() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(1)), &scheduler);

	let job = gate.launch("s1").await.unwrap().unwrap();
	tokio::time::sleep(Duration::from_millis(1500)).await;
	settle().await;

	assert_eq!(scheduler.cancelled(), vec![job]);
	assert_eq!(gate.session_count(), 0);
	assert!(gate.status("s1").await.is_none());
	assert_eq!(gate.live_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn keepalive_extends_session_life() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(1)), &scheduler);
	gate.launch("s1").await.unwrap();

	for _ in 0..6 {
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert!(gate.keepalive("s1").await);
	}
	assert_eq!(scheduler.cancels(), 0);
	assert!(gate.status("s1").await.is_some());

	tokio::time::sleep(Duration::from_millis(1100)).await;
	settle().await;
	assert_eq!(scheduler.cancels(), 1);
	assert!(!gate.keepalive("s1").await);
}

#[tokio::test(start_paused = true)]
async fn relaunch_rearms_idle_timer() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(1)), &scheduler);
	gate.launch("s1").await.unwrap();

	tokio::time::sleep(Duration::from_millis(800)).await;
	gate.launch("s1").await.unwrap();
	tokio::time::sleep(Duration::from_millis(800)).await;
	assert_eq!(scheduler.cancels(), 0);
	assert_eq!(scheduler.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn end_racing_fired_timer_cancels_once() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(1)), &scheduler);
	gate.launch("s1").await.unwrap();

	tokio::time::sleep(Duration::from_secs(1)).await;
	gate.end("s1").await;
	gate.end("s1").await;
	tokio::time::sleep(Duration::from_secs(5)).await;
	settle().await;

	assert_eq!(scheduler.cancels(), 1);
	assert_eq!(gate.session_count(), 0);
	assert_eq!(gate.live_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn end_during_idle_teardown_cancels_once() {
	let scheduler = Arc::new(FakeScheduler::new().with_cancel_delay(Duration::from_secs(2)));
	let gate = gate(config(Duration::from_secs(1)), &scheduler);
	let job = gate.launch("s1").await.unwrap().unwrap();

	// The timer fired at 1s and its teardown is now waiting on scancel.
	tokio::time::sleep(Duration::from_millis(1100)).await;
	assert_eq!(scheduler.cancels(), 1);

	let (first, second) = tokio::join!(gate.end("s1"), gate.end("s1"));
	assert!(!first && !second);
	assert!(gate.status("s1").await.is_none());

	tokio::time::sleep(Duration::from_secs(5)).await;
	settle().await;
	assert_eq!(scheduler.cancelled(), vec![job]);
	assert_eq!(gate.session_count(), 0);
	assert_eq!(gate.live_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_passing_during_end_cancels_once() {
	let scheduler = Arc::new(FakeScheduler::new().with_cancel_delay(Duration::from_secs(2)));
	let gate = gate(config(Duration::from_secs(1)), &scheduler);
	gate.launch("s1").await.unwrap();

	tokio::time::sleep(Duration::from_millis(900)).await;
	// The idle deadline passes while end is still waiting on scancel.
	let (ended, ()) = tokio::join!(gate.end("s1"), tokio::time::sleep(Duration::from_millis(500)));
	assert!(ended);

	tokio::time::sleep(Duration::from_secs(5)).await;
	settle().await;
	assert_eq!(scheduler.cancels(), 1);
	assert_eq!(gate.session_count(), 0);
	assert_eq!(gate.live_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn end_stops_all_session_tasks() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(600)), &scheduler);
	let job = gate.launch("s1").await.unwrap().unwrap();
	settle().await;
	assert_eq!(gate.live_tasks(), 2, "idle timer and discovery poller");
	let status = gate.status("s1").await.unwrap();
	assert!(status.idle_armed && status.discovering);

	assert!(gate.end("s1").await);
	settle().await;
	assert_eq!(gate.live_tasks(), 0);
	assert_eq!(scheduler.cancelled(), vec![job]);

	let queries = scheduler.queries();
	tokio::time::sleep(Duration::from_secs(30)).await;
	assert_eq!(scheduler.queries(), queries);
	assert!(!gate.end("s1").await);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_leaves_no_record() {
	let scheduler = Arc::new(FakeScheduler::new().failing_submit("sbatch failed"));
	let gate = gate(config(Duration::from_secs(600)), &scheduler);

	let err = gate.launch("s1").await.unwrap_err();
	assert!(matches!(err, GateError::SubmissionFailed(_)));
	assert_eq!(gate.session_count(), 0);
	assert_eq!(gate.live_tasks(), 0);
	assert!(gate.status("s1").await.is_none());

	// No retry inside the orchestrator; the next launch submits again.
	assert!(gate.launch("s1").await.is_err());
	assert_eq!(scheduler.submits(), 2);
}

#[tokio::test(start_paused = true)]
async fn lookups_answer_while_submission_is_pending() {
	let scheduler = Arc::new(FakeScheduler::new().with_submit_delay(Duration::from_secs(30)));
	let gate = gate(config(Duration::from_secs(600)), &scheduler);
	let launch = tokio::spawn({
		let gate = gate.clone();
		async move { gate.launch("s1").await }
	});
	settle().await;

	let quick = Duration::from_millis(10);
	let routed = tokio::time::timeout(quick, gate.route("s1")).await.expect("route waited on sbatch");
	assert!(matches!(routed, Err(GateError::BackendNotReady)));
	let status = tokio::time::timeout(quick, gate.status("s1")).await.expect("status waited on sbatch").unwrap();
	assert_eq!(status.job, None);
	assert!(!status.running());
	assert!(tokio::time::timeout(quick, gate.keepalive("s1")).await.expect("keepalive waited on sbatch"));

	let job = launch.await.unwrap().unwrap();
	assert!(job.is_some());
	assert_eq!(gate.status("s1").await.unwrap().job, job);
	assert_eq!(scheduler.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn end_during_submission_cancels_the_late_job() {
	let scheduler = Arc::new(FakeScheduler::new().with_submit_delay(Duration::from_secs(30)));
	let gate = gate(config(Duration::from_secs(600)), &scheduler);
	let launch = tokio::spawn({
		let gate = gate.clone();
		async move { gate.launch("s1").await }
	});
	settle().await;

	assert!(gate.end("s1").await);
	assert_eq!(gate.session_count(), 0);

	let err = launch.await.unwrap().unwrap_err();
	assert!(matches!(err, GateError::SessionClosed));
	assert_eq!(scheduler.cancelled(), vec![llgate::JobId::new("1001")]);
	assert_eq!(gate.session_count(), 0);
	assert_eq!(gate.live_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_cancel_still_removes_record() {
	let scheduler = Arc::new(FakeScheduler::new().failing_cancel("Invalid job id specified"));
	let gate = gate(config(Duration::from_secs(600)), &scheduler);
	gate.launch("s1").await.unwrap();

	assert!(gate.end("s1").await);
	assert_eq!(scheduler.cancels(), 1);
	assert_eq!(gate.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn route_without_endpoint_is_not_ready() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(600)), &scheduler);

	assert!(matches!(gate.route("nobody").await, Err(GateError::BackendNotReady)));

	gate.launch("s1").await.unwrap();
	assert!(matches!(gate.route("s1").await, Err(GateError::BackendNotReady)));
}

#[tokio::test(start_paused = true)]
async fn not_ready_requests_do_not_extend_by_default() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(1)), &scheduler);
	gate.launch("s1").await.unwrap();

	for _ in 0..3 {
		tokio::time::sleep(Duration::from_millis(400)).await;
		let _ = gate.route("s1").await;
	}
	settle().await;
	assert_eq!(scheduler.cancels(), 1);
}

#[tokio::test(start_paused = true)]
async fn always_policy_extends_on_not_ready_requests() {
	let scheduler = Arc::new(FakeScheduler::new());
	let config = GateConfig {
		idle_refresh: IdleRefresh::Always,
		..config(Duration::from_secs(1))
	};
	let gate = gate(config, &scheduler);
	gate.launch("s1").await.unwrap();

	for _ in 0..6 {
		tokio::time::sleep(Duration::from_millis(400)).await;
		assert!(gate.route("s1").await.is_err());
	}
	assert_eq!(scheduler.cancels(), 0);
}

#[tokio::test(start_paused = true)]
async fn static_backend_skips_scheduler() {
	let endpoint = Endpoint::parse("http://shared-backend:8080").unwrap();
	let gate = Orchestrator::with_static(config(Duration::from_secs(600)), endpoint.clone(), Arc::new(FakeProber::reachable())).unwrap();

	assert_eq!(gate.launch("s1").await.unwrap(), None);
	settle().await;

	let status = gate.status("s1").await.unwrap();
	assert!(status.running());
	assert!(status.connected);
	assert_eq!(status.job, None);
	assert_eq!(gate.route("s1").await.unwrap(), endpoint);

	assert!(gate.end("s1").await);
	settle().await;
	assert_eq!(gate.live_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_tears_down_every_session() {
	let scheduler = Arc::new(FakeScheduler::new());
	let gate = gate(config(Duration::from_secs(600)), &scheduler);
	gate.launch("a").await.unwrap();
	gate.launch("b").await.unwrap();

	assert_eq!(gate.shutdown().await, 2);
	settle().await;
	assert_eq!(scheduler.cancels(), 2);
	assert_eq!(gate.session_count(), 0);
	assert_eq!(gate.live_tasks(), 0);
}
