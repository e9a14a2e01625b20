pub mod mqtt;
pub mod supervisor;

use rumqttc::QoS;
use std::future::Future;

use crate::error::{ConnectError, PublishError};

pub use mqtt::{connect, MqttLink, MqttPublisher};
pub use supervisor::{transition, ConnectionSupervisor, LinkSignal};

/// What one poll of the broker session produced
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Session (re)established
    Connected,
    Message { topic: String, payload: Vec<u8> },
    /// Any other protocol traffic (acks, pings)
    Idle,
}

/// Network side of a broker session
///
/// Polling drives the session; after an error the next poll starts a
/// fresh connection attempt.
pub trait Link: Send {
    fn poll(&mut self) -> impl Future<Output = Result<LinkEvent, ConnectError>> + Send;

    /// Request a subscription; must be repeated for every new session
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ConnectError>;
}

/// Outbound side of a broker session
///
/// Non-blocking and callable from any thread while the link is polled.
pub trait Publish: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), PublishError>;
}
