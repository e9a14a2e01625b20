/// The long-lived pipeline context, ticked by the consumer
///
/// Built once at startup and kept for the whole process. Every tick drains
/// the inbound channel and runs each event through decode, inference,
/// logging and decision, in arrival order. Nothing in here waits on the
/// network.
use log::{debug, info};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use crate::channel::InboundReceiver;
use crate::codec::{decode_at, topic_matches};
use crate::config::PipelineConfig;
use crate::decision::DecisionController;
use crate::event_log::EventLog;
use crate::export;
use crate::inference::InferenceEngine;
use crate::models::{ConnectionState, InboundEvent, LogEntry, OutboundMessage, OverrideState};
use crate::publisher::OutboundPublisher;
use crate::transport::Publish;
use crate::utils::describe_entry;

/// Counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub received: u64,
    pub processed: u64,
    pub malformed: u64,
    pub ignored: u64,
    pub dropped: u64,
    pub publish_attempts: u64,
    pub publish_failures: u64,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub drained: usize,
    pub processed: usize,
    pub malformed: usize,
    pub ignored: usize,
}

/// Read-only view handed to the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub connection: ConnectionState,
    pub override_state: OverrideState,
    pub last: Option<LogEntry>,
    pub live: Vec<LogEntry>,
    pub stats: PipelineStats,
}

enum Outcome {
    Processed,
    Malformed,
    Ignored,
}

pub struct Pipeline<P: Publish> {
    inbound: InboundReceiver,
    inbound_topic: String,
    engine: InferenceEngine,
    controller: DecisionController,
    publisher: OutboundPublisher<P>,
    live: EventLog,
    archive: EventLog,
    connection: watch::Receiver<ConnectionState>,
    received: u64,
    processed: u64,
    malformed: u64,
    ignored: u64,
}

impl<P: Publish> Pipeline<P> {
    pub fn new(
        config: &PipelineConfig,
        engine: InferenceEngine,
        publish: Arc<P>,
        inbound: InboundReceiver,
        connection: watch::Receiver<ConnectionState>,
    ) -> Self {
        Pipeline {
            inbound,
            inbound_topic: config.inbound_topic.clone(),
            engine,
            controller: DecisionController::new(config.publish_policy),
            publisher: OutboundPublisher::new(publish, config),
            live: EventLog::with_capacity(config.live_log_capacity),
            archive: EventLog::with_capacity(config.archive_log_capacity),
            connection,
            received: 0,
            processed: 0,
            malformed: 0,
            ignored: 0,
        }
    }

    /// Process everything queued since the previous tick
    pub fn tick(&mut self) -> TickReport {
        let events = self.inbound.drain();
        let mut report = TickReport {
            drained: events.len(),
            ..TickReport::default()
        };

        for event in events {
            match self.process(event) {
                Outcome::Processed => report.processed += 1,
                Outcome::Malformed => report.malformed += 1,
                Outcome::Ignored => report.ignored += 1,
            }
        }

        report
    }

    fn process(&mut self, event: InboundEvent) -> Outcome {
        self.received += 1;

        if !topic_matches(&self.inbound_topic, &event.topic) {
            self.ignored += 1;
            debug!("Ignoring message on unrelated topic '{}'", event.topic);
            return Outcome::Ignored;
        }

        let reading = match decode_at(&event.payload, event.received_at) {
            Ok(reading) => reading,
            Err(e) => {
                self.malformed += 1;
                debug!("Dropping message on '{}': {}", event.topic, e);
                return Outcome::Malformed;
            }
        };

        let entry = LogEntry {
            reading,
            classification: self.engine.classify(&reading),
        };

        self.live.append(entry);
        self.archive.append(entry);
        self.processed += 1;
        info!("New data: {}", describe_entry(&entry));

        if let Some(message) = self.controller.on_classification(&entry.classification) {
            self.publisher.send(message);
        }

        Outcome::Processed
    }

    /// Operator override; the matching message goes out immediately
    pub fn set_override(&mut self, state: OverrideState) -> Option<OutboundMessage> {
        let message = self.controller.set_override(state);
        if let Some(message) = message {
            self.publisher.send(message);
        }
        message
    }

    /// Return to automatic decisions
    pub fn clear_override(&mut self) {
        self.controller.clear_override();
    }

    pub fn override_state(&self) -> OverrideState {
        self.controller.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            received: self.received,
            processed: self.processed,
            malformed: self.malformed,
            ignored: self.ignored,
            dropped: self.inbound.dropped(),
            publish_attempts: self.publisher.attempted(),
            publish_failures: self.publisher.failed(),
        }
    }

    /// Entries for the live view, oldest first
    pub fn live_entries(&self) -> Vec<LogEntry> {
        self.live.snapshot()
    }

    /// Entries kept for table views and export, oldest first
    pub fn archive_entries(&self) -> Vec<LogEntry> {
        self.archive.snapshot()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            connection: self.connection_state(),
            override_state: self.override_state(),
            last: self.live.latest().copied(),
            live: self.live.snapshot(),
            stats: self.stats(),
        }
    }

    pub fn export_csv(&self) -> String {
        export::to_csv(&self.archive.snapshot())
    }

    pub fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        export::write_csv(path, &self.archive.snapshot())
    }
}
