use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use iot_classifier::channel::inbound_channel;
use iot_classifier::config::PipelineConfig;
use iot_classifier::error::ConnectError;
use iot_classifier::models::ConnectionState::{self, *};
use iot_classifier::transport::{ConnectionSupervisor, Link, LinkEvent};
use rumqttc::QoS;
use tokio::sync::watch;
use tokio::time::{timeout, Duration, Instant};

const BACKOFF: Duration = Duration::from_secs(3);

enum Step {
    Event(Result<LinkEvent, ConnectError>),
    /// Never answers, like a broker that accepted TCP but sends no CONNACK
    Hang,
}

/// Broker session that replays a fixed script, then goes quiet
struct ScriptedLink {
    script: VecDeque<Step>,
    subscriptions: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl ScriptedLink {
    fn new(script: Vec<Step>) -> (Self, Arc<Mutex<Vec<(String, Instant)>>>) {
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        (
            ScriptedLink {
                script: script.into(),
                subscriptions: Arc::clone(&subscriptions),
            },
            subscriptions,
        )
    }
}

impl Link for ScriptedLink {
    async fn poll(&mut self) -> Result<LinkEvent, ConnectError> {
        // Let observers see every state change
        tokio::task::yield_now().await;

        match self.script.pop_front() {
            Some(Step::Event(result)) => result,
            Some(Step::Hang) | None => std::future::pending().await,
        }
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), ConnectError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((topic.to_string(), Instant::now()));
        Ok(())
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        reconnect_backoff: BACKOFF,
        connect_timeout: Duration::from_secs(10),
        ..PipelineConfig::default()
    }
}

/// Collect state changes until `count` states have been seen
fn observe(mut rx: watch::Receiver<ConnectionState>, count: usize) -> tokio::task::JoinHandle<Vec<ConnectionState>> {
    tokio::spawn(async move {
        let mut seen = vec![*rx.borrow_and_update()];
        while seen.len() < count {
            if rx.changed().await.is_err() {
                break;
            }
            seen.push(*rx.borrow_and_update());
        }
        seen
    })
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_drop_and_resubscribes() {
    let (link, subscriptions) = ScriptedLink::new(vec![
        Step::Event(Ok(LinkEvent::Connected)),
        Step::Event(Ok(LinkEvent::Message {
            topic: "iot/class/session5/sensor".into(),
            payload: br#"{"temp": 30.0, "hum": 50.0}"#.to_vec(),
        })),
        Step::Event(Err(ConnectError::Network("connection reset".into()))),
        Step::Event(Ok(LinkEvent::Connected)),
    ]);
    let (tx, mut rx) = inbound_channel(16);
    let (supervisor, state_rx) = ConnectionSupervisor::new(link, tx, &config());

    let observer = observe(state_rx, 6);
    let network = tokio::spawn(supervisor.run());

    let seen = timeout(Duration::from_secs(60), observer)
        .await
        .expect("supervisor never reconnected")
        .unwrap();
    assert_eq!(
        seen,
        vec![Disconnected, Connecting, Connected, Disconnected, Connecting, Connected]
    );

    let subscriptions = subscriptions.lock().unwrap().clone();
    assert_eq!(subscriptions.len(), 2);
    assert!(subscriptions
        .iter()
        .all(|(topic, _)| topic == "iot/class/session5/sensor"));

    // Back within one backoff interval (connect latency is zero here)
    let gap = subscriptions[1].1 - subscriptions[0].1;
    assert!(gap >= BACKOFF, "reconnected too early: {:?}", gap);
    assert!(gap < BACKOFF + Duration::from_millis(100), "reconnected too late: {:?}", gap);

    // The message seen before the drop made it across
    let events = rx.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, "iot/class/session5/sensor");

    network.abort();
}

#[tokio::test(start_paused = true)]
async fn retries_failed_connects_with_fixed_backoff() {
    let (link, subscriptions) = ScriptedLink::new(vec![
        Step::Event(Err(ConnectError::Auth("NotAuthorized".into()))),
        Step::Event(Err(ConnectError::Network("dns failure".into()))),
        Step::Event(Ok(LinkEvent::Connected)),
    ]);
    let (tx, _rx) = inbound_channel(16);
    let (supervisor, state_rx) = ConnectionSupervisor::new(link, tx, &config());

    let started = Instant::now();
    let observer = observe(state_rx, 7);
    let network = tokio::spawn(supervisor.run());

    let seen = timeout(Duration::from_secs(60), observer).await.unwrap().unwrap();
    assert_eq!(
        seen,
        vec![
            Disconnected,
            Connecting,
            Disconnected,
            Connecting,
            Disconnected,
            Connecting,
            Connected
        ]
    );

    let subscriptions = subscriptions.lock().unwrap().clone();
    assert_eq!(subscriptions.len(), 1);
    assert!(subscriptions[0].1 - started >= BACKOFF * 2);

    network.abort();
}

#[tokio::test(start_paused = true)]
async fn silent_broker_times_out_and_is_retried() {
    let (link, subscriptions) = ScriptedLink::new(vec![Step::Hang, Step::Event(Ok(LinkEvent::Connected))]);
    let (tx, _rx) = inbound_channel(16);
    let config = config();
    let (supervisor, state_rx) = ConnectionSupervisor::new(link, tx, &config);

    let started = Instant::now();
    let observer = observe(state_rx, 5);
    let network = tokio::spawn(supervisor.run());

    let seen = timeout(Duration::from_secs(60), observer).await.unwrap().unwrap();
    assert_eq!(seen, vec![Disconnected, Connecting, Disconnected, Connecting, Connected]);

    let subscriptions = subscriptions.lock().unwrap().clone();
    assert_eq!(subscriptions.len(), 1);
    assert!(subscriptions[0].1 - started >= config.connect_timeout + BACKOFF);

    network.abort();
}
