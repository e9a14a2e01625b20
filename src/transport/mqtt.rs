/// rumqttc-backed broker session
use log::debug;
use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
    Packet, QoS,
};

use crate::config::PipelineConfig;
use crate::error::{ConnectError, PublishError};
use crate::transport::{Link, LinkEvent, Publish};

// Requests (publish/subscribe) buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 64;

/// Build a session for the configured broker
///
/// Nothing touches the network until the returned link is polled.
///
/// # Returns
/// The publish handle for the pipeline and the link for the supervisor
pub fn connect(config: &PipelineConfig) -> (MqttPublisher, MqttLink) {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);

    if let Some(credentials) = &config.credentials {
        options.set_credentials(credentials.username.clone(), credentials.password.clone());
    }

    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    (
        MqttPublisher {
            client: client.clone(),
        },
        MqttLink { client, eventloop },
    )
}

pub struct MqttLink {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl Link for MqttLink {
    async fn poll(&mut self) -> Result<LinkEvent, ConnectError> {
        match self.eventloop.poll().await {
            Ok(event) => link_event(event),
            Err(e) => Err(map_connection_error(e)),
        }
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ConnectError> {
        self.client
            .try_subscribe(topic, qos)
            .map_err(|e| ConnectError::Network(format!("subscribe to '{}' failed: {}", topic, e)))
    }
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publish for MqttPublisher {
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, qos, retain, payload.to_vec())
            .map_err(map_client_error)
    }
}

fn link_event(event: Event) -> Result<LinkEvent, ConnectError> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => match ack.code {
            ConnectReturnCode::Success => Ok(LinkEvent::Connected),
            code => Err(refused(code)),
        },
        Event::Incoming(Packet::Publish(publish)) => Ok(LinkEvent::Message {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        Event::Incoming(Packet::Disconnect) => {
            Err(ConnectError::Network("broker closed the session".into()))
        }
        event => {
            debug!("MQTT event: {:?}", event);
            Ok(LinkEvent::Idle)
        }
    }
}

fn refused(code: ConnectReturnCode) -> ConnectError {
    match code {
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
            ConnectError::Auth(format!("{:?}", code))
        }
        code => ConnectError::Network(format!("connection refused: {:?}", code)),
    }
}

fn map_connection_error(error: ConnectionError) -> ConnectError {
    match error {
        ConnectionError::ConnectionRefused(code) => refused(code),
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => ConnectError::Timeout,
        other => ConnectError::Network(other.to_string()),
    }
}

fn map_client_error(error: ClientError) -> PublishError {
    PublishError::Rejected(error.to_string())
}
