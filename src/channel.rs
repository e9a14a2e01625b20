/// Hand-off queue between the network task and the pipeline tick
///
/// The network side never waits for the consumer: a full queue drops the
/// event and counts the loss. The consumer side drains whatever is queued
/// and returns immediately when the queue is empty.
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::models::InboundEvent;

/// Create a bounded inbound channel
pub fn inbound_channel(capacity: usize) -> (InboundSender, InboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    (
        InboundSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        InboundReceiver { rx, dropped },
    )
}

#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::Sender<InboundEvent>,
    dropped: Arc<AtomicU64>,
}

impl InboundSender {
    /// Enqueue without blocking
    ///
    /// Returns false when the event was dropped.
    pub fn push(&self, event: InboundEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Inbound queue full, dropping message on '{}' ({} dropped so far)",
                    event.topic, total
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Pipeline gone, dropping message on '{}'", event.topic);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct InboundReceiver {
    rx: mpsc::Receiver<InboundEvent>,
    dropped: Arc<AtomicU64>,
}

impl InboundReceiver {
    /// Take every event queued right now, oldest first
    pub fn drain(&mut self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Events lost to overflow since start
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
