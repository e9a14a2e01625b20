/// Fire-and-forget control messages back to the device
use log::{debug, warn};
use rumqttc::QoS;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::models::OutboundMessage;
use crate::transport::Publish;

pub struct OutboundPublisher<P: Publish> {
    handle: Arc<P>,
    topic: String,
    qos: QoS,
    retain: bool,
    attempted: u64,
    failed: u64,
}

impl<P: Publish> OutboundPublisher<P> {
    pub fn new(handle: Arc<P>, config: &PipelineConfig) -> Self {
        OutboundPublisher {
            handle,
            topic: config.outbound_topic.clone(),
            qos: config.qos,
            retain: config.retain,
            attempted: 0,
            failed: 0,
        }
    }

    /// Attempt one publish; failures are logged and counted, not retried
    ///
    /// Returns whether the transport accepted the message.
    pub fn send(&mut self, message: OutboundMessage) -> bool {
        self.attempted += 1;

        match self
            .handle
            .publish(&self.topic, message.as_str().as_bytes(), self.qos, self.retain)
        {
            Ok(()) => {
                debug!("Published {} to '{}'", message.as_str(), self.topic);
                true
            }
            Err(e) => {
                self.failed += 1;
                warn!(
                    "Failed to publish {} to '{}': {} ({} failures so far)",
                    message.as_str(),
                    self.topic,
                    e,
                    self.failed
                );
                false
            }
        }
    }

    pub fn attempted(&self) -> u64 {
        self.attempted
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, Vec<u8>, bool)>>,
        reject: bool,
    }

    impl Publish for Recorder {
        fn publish(&self, topic: &str, payload: &[u8], _qos: QoS, retain: bool) -> Result<(), PublishError> {
            if self.reject {
                return Err(PublishError::Rejected("queue full".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec(), retain));
            Ok(())
        }
    }

    #[test]
    fn sends_wire_form_to_outbound_topic() {
        let handle = Arc::new(Recorder::default());
        let config = PipelineConfig {
            outbound_topic: "devices/fan/cmd".into(),
            retain: true,
            ..PipelineConfig::default()
        };
        let mut publisher = OutboundPublisher::new(Arc::clone(&handle), &config);

        assert!(publisher.send(OutboundMessage::AlertOn));
        assert!(publisher.send(OutboundMessage::AlertOff));

        let sent = handle.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![
                ("devices/fan/cmd".to_string(), b"ALERT_ON".to_vec(), true),
                ("devices/fan/cmd".to_string(), b"ALERT_OFF".to_vec(), true),
            ]
        );
        assert_eq!(publisher.attempted(), 2);
        assert_eq!(publisher.failed(), 0);
    }

    #[test]
    fn failures_are_counted_not_retried() {
        let handle = Arc::new(Recorder {
            reject: true,
            ..Recorder::default()
        });
        let mut publisher = OutboundPublisher::new(handle, &PipelineConfig::default());

        assert!(!publisher.send(OutboundMessage::AlertOn));
        assert_eq!(publisher.attempted(), 1);
        assert_eq!(publisher.failed(), 1);
    }
}
