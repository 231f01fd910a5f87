use async_trait::async_trait;
use domain::{Connection, ManualClock, Tag, TagSample, TagValueType};
use scada_protocol::{
    ConnectionPlan, ConnectionPoller, PollEventHandler, PollingScheduler, ProtocolError,
    SimulatedConnector, SimulatedController,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingHandler {
    samples: Mutex<Vec<TagSample>>,
    unreadable: Mutex<Vec<String>>,
    cycles: Mutex<Vec<String>>,
}

impl RecordingHandler {
    fn value_of(&self, tag: &str) -> Option<f64> {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.tag_name == tag)
            .map(|s| s.value)
    }
}

#[async_trait]
impl PollEventHandler for RecordingHandler {
    async fn handle_sample(&self, sample: TagSample) {
        self.samples.lock().unwrap().push(sample);
    }

    async fn handle_unreadable(&self, _connection: &str, tag_names: &[String], _error: &ProtocolError) {
        self.unreadable.lock().unwrap().extend(tag_names.iter().cloned());
    }

    async fn cycle_complete(&self, connection: &str) {
        self.cycles.lock().unwrap().push(connection.to_string());
    }
}

fn connection(name: &str, poll_interval_ms: u64) -> Connection {
    Connection {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port: 502,
        poll_interval_ms,
    }
}

fn tag(name: &str, connection: &str, address: u16) -> Tag {
    Tag {
        name: name.to_string(),
        address,
        value_type: TagValueType::Float32,
        unit: String::new(),
        connection_name: connection.to_string(),
        deadband: 0.0,
        enabled: true,
    }
}

fn poller(
    plan: ConnectionPlan,
    controller: &SimulatedController,
    handler: Arc<RecordingHandler>,
) -> ConnectionPoller {
    let connector = SimulatedConnector::new().with_controller(&plan.connection.name, controller.clone());
    ConnectionPoller::new(
        plan,
        Arc::new(connector),
        handler,
        Arc::new(ManualClock::new(1_000)),
    )
}

#[tokio::test]
async fn poll_reads_grouped_spans_and_decodes_values() {
    let controller = SimulatedController::new();
    controller.set_float32(0, 9.0);
    controller.set_float32(4, 1.5);
    controller.set_float32(200, -3.25);
    let tags = vec![tag("a", "plc", 0), tag("b", "plc", 4), tag("c", "plc", 200)];
    let handler = Arc::new(RecordingHandler::default());
    let mut poller = poller(
        ConnectionPlan::build(connection("plc", 1000), &tags),
        &controller,
        handler.clone(),
    );

    let report = poller.poll_once().await;

    assert!(report.connected);
    assert_eq!(report.spans_read, 2);
    assert_eq!(report.samples, 3);
    assert_eq!(controller.read_log(), vec![(0, 6), (200, 2)]);
    assert_eq!(handler.value_of("a"), Some(9.0));
    assert_eq!(handler.value_of("b"), Some(1.5));
    assert_eq!(handler.value_of("c"), Some(-3.25));
    assert_eq!(handler.samples.lock().unwrap()[0].ts_ms, 1_000);
    assert_eq!(handler.cycles.lock().unwrap().as_slice(), ["plc"]);
}

#[tokio::test]
async fn failed_span_skips_only_its_tags() {
    let controller = SimulatedController::new();
    controller.set_float32(0, 1.0);
    controller.set_float32(300, 2.0);
    controller.fail_reads_at(0);
    let tags = vec![tag("a", "plc", 0), tag("b", "plc", 300)];
    let handler = Arc::new(RecordingHandler::default());
    let mut poller = poller(
        ConnectionPlan::build(connection("plc", 1000), &tags),
        &controller,
        handler.clone(),
    );

    let report = poller.poll_once().await;

    assert_eq!(report.spans_failed, 1);
    assert_eq!(report.spans_read, 1);
    assert_eq!(handler.value_of("a"), None);
    assert_eq!(handler.value_of("b"), Some(2.0));
    assert_eq!(handler.unreadable.lock().unwrap().as_slice(), ["a"]);
}

#[tokio::test]
async fn disabled_and_foreign_tags_are_not_polled() {
    let mut disabled = tag("off", "plc", 10);
    disabled.enabled = false;
    let tags = vec![tag("a", "plc", 0), disabled, tag("other", "plc2", 0)];
    let plan = ConnectionPlan::build(connection("plc", 1000), &tags);
    assert_eq!(plan.spans.len(), 1);
    assert_eq!(plan.spans[0].tag_names(), vec!["a"]);
}

#[tokio::test]
async fn offline_controller_is_retried_next_cycle() {
    let controller = SimulatedController::new();
    controller.set_float32(0, 4.0);
    controller.set_offline(true);
    let tags = vec![tag("a", "plc", 0)];
    let handler = Arc::new(RecordingHandler::default());
    let mut poller = poller(
        ConnectionPlan::build(connection("plc", 1000), &tags),
        &controller,
        handler.clone(),
    );

    let first = poller.poll_once().await;
    assert!(!first.connected);
    assert_eq!(handler.unreadable.lock().unwrap().as_slice(), ["a"]);

    controller.set_offline(false);
    let second = poller.poll_once().await;
    assert!(second.connected);
    assert_eq!(handler.value_of("a"), Some(4.0));
}

#[tokio::test]
async fn transport_loss_mid_cycle_marks_remaining_spans() {
    let controller = SimulatedController::new();
    let tags = vec![tag("a", "plc", 0), tag("b", "plc", 300)];
    let handler = Arc::new(RecordingHandler::default());
    let mut poller = poller(
        ConnectionPlan::build(connection("plc", 1000), &tags),
        &controller,
        handler.clone(),
    );
    poller.poll_once().await;

    controller.set_offline(true);
    let report = poller.poll_once().await;
    assert_eq!(report.spans_failed, 2);
    let unreadable = handler.unreadable.lock().unwrap().clone();
    assert_eq!(unreadable, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn scheduler_polls_each_connection_on_its_own_interval() {
    let fast = SimulatedController::new();
    let slow = SimulatedController::new();
    fast.set_float32(0, 1.0);
    slow.set_float32(0, 2.0);
    let connector = SimulatedConnector::new()
        .with_controller("fast", fast.clone())
        .with_controller("slow", slow.clone());
    let tags = vec![tag("f", "fast", 0), tag("s", "slow", 0)];
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = PollingScheduler::new(
        &[connection("fast", 100), connection("slow", 1000)],
        &tags,
        Arc::new(connector),
        handler.clone(),
    );

    let cancel = CancellationToken::new();
    let tasks = scheduler.spawn(cancel.clone());
    tokio::time::sleep(Duration::from_millis(950)).await;
    cancel.cancel();
    for task in tasks {
        task.await.unwrap();
    }

    let fast_reads = fast.read_log().len();
    let slow_reads = slow.read_log().len();
    assert!(fast_reads >= 9, "fast polled {fast_reads} times");
    assert_eq!(slow_reads, 1);
}
