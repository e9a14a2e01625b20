/// Reconnect-with-backoff driver for the broker session
///
/// Owns the connection state and the network side of the inbound channel.
/// Runs for the whole process lifetime; shutdown simply drops the task.
use log::{error, info, warn};
use rumqttc::QoS;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};

use crate::channel::InboundSender;
use crate::config::PipelineConfig;
use crate::error::ConnectError;
use crate::models::{ConnectionState, InboundEvent};
use crate::transport::{Link, LinkEvent};

/// Inputs to the connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSignal {
    /// A connect attempt starts
    Attempt,
    /// The broker accepted the session
    Established,
    /// Connect attempt failed or the session dropped
    Lost,
}

/// Next connection state for a signal
///
/// Signals that make no sense in the current state leave it unchanged.
pub fn transition(state: ConnectionState, signal: LinkSignal) -> ConnectionState {
    match (state, signal) {
        (ConnectionState::Disconnected, LinkSignal::Attempt) => ConnectionState::Connecting,
        (ConnectionState::Connecting, LinkSignal::Established) => ConnectionState::Connected,
        (ConnectionState::Connected, LinkSignal::Established) => ConnectionState::Connected,
        (ConnectionState::Connecting, LinkSignal::Lost) => ConnectionState::Disconnected,
        (ConnectionState::Connected, LinkSignal::Lost) => ConnectionState::Disconnected,
        (state, _) => state,
    }
}

pub struct ConnectionSupervisor<L: Link> {
    link: L,
    inbound: InboundSender,
    topic: String,
    qos: QoS,
    backoff: Duration,
    connect_timeout: Duration,
    state: watch::Sender<ConnectionState>,
    attempts: u64,
}

impl<L: Link> ConnectionSupervisor<L> {
    /// Create a supervisor and a reader for its connection state
    pub fn new(
        link: L,
        inbound: InboundSender,
        config: &PipelineConfig,
    ) -> (Self, watch::Receiver<ConnectionState>) {
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);

        (
            ConnectionSupervisor {
                link,
                inbound,
                topic: config.inbound_topic.clone(),
                qos: config.qos,
                backoff: config.reconnect_backoff,
                connect_timeout: config.connect_timeout,
                state,
                attempts: 0,
            },
            state_rx,
        )
    }

    /// Connect, pump messages, and reconnect after a fixed backoff, forever
    pub async fn run(mut self) {
        info!("Starting connection supervisor for topic '{}'", self.topic);

        loop {
            self.attempts += 1;
            self.signal(LinkSignal::Attempt);

            let session = match timeout(self.connect_timeout, self.await_session()).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::Timeout),
            };

            match session {
                Ok(()) => {
                    self.signal(LinkSignal::Established);
                    self.resubscribe();

                    let reason = self.pump().await;
                    warn!("Connection lost: {}", reason);
                }
                Err(e) => error!("Connect attempt {} failed: {}", self.attempts, e),
            }

            self.signal(LinkSignal::Lost);

            info!("Reconnecting in {} seconds", self.backoff.as_secs_f32());
            sleep(self.backoff).await;
        }
    }

    /// Poll until the broker acknowledges the session
    async fn await_session(&mut self) -> Result<(), ConnectError> {
        loop {
            match self.link.poll().await? {
                LinkEvent::Connected => return Ok(()),
                LinkEvent::Message { topic, payload } => self.forward(topic, payload),
                LinkEvent::Idle => {}
            }
        }
    }

    /// Forward messages until the session fails
    async fn pump(&mut self) -> ConnectError {
        loop {
            match self.link.poll().await {
                Ok(LinkEvent::Message { topic, payload }) => self.forward(topic, payload),
                Ok(LinkEvent::Connected) => {
                    // Transport reconnected on its own; the new session has no subscriptions
                    info!("Session re-established by transport");
                    self.resubscribe();
                }
                Ok(LinkEvent::Idle) => {}
                Err(e) => return e,
            }
        }
    }

    fn forward(&self, topic: String, payload: Vec<u8>) {
        self.inbound.push(InboundEvent::new(topic, payload));
    }

    fn resubscribe(&mut self) {
        match self.link.subscribe(&self.topic, self.qos) {
            Ok(()) => info!("Subscribed to '{}'", self.topic),
            Err(e) => warn!("Subscription to '{}' not sent: {}", self.topic, e),
        }
    }

    fn signal(&self, signal: LinkSignal) {
        let current = *self.state.borrow();
        let next = transition(current, signal);
        if next != current {
            info!("Connection state: {:?} -> {:?}", current, next);
            self.state.send_replace(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn full_cycle() {
        let mut state = Disconnected;
        let mut seen = vec![state];
        for signal in [
            LinkSignal::Attempt,
            LinkSignal::Established,
            LinkSignal::Lost,
            LinkSignal::Attempt,
            LinkSignal::Established,
        ] {
            state = transition(state, signal);
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![Disconnected, Connecting, Connected, Disconnected, Connecting, Connected]
        );
    }

    #[test]
    fn failed_attempt_goes_back_to_disconnected() {
        assert_eq!(transition(Connecting, LinkSignal::Lost), Disconnected);
    }

    #[test]
    fn ignores_out_of_order_signals() {
        assert_eq!(transition(Disconnected, LinkSignal::Established), Disconnected);
        assert_eq!(transition(Disconnected, LinkSignal::Lost), Disconnected);
        assert_eq!(transition(Connected, LinkSignal::Attempt), Connected);
        assert_eq!(transition(Connecting, LinkSignal::Attempt), Connecting);
    }
}
