/// Maps classifications to control messages, honoring manual override
use log::info;

use crate::models::{Classification, Label, OutboundMessage, OverrideState};

/// When automatic decisions are published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPolicy {
    /// Every classified reading produces a message
    #[default]
    EveryReading,
    /// Only a decision different from the previous automatic one
    OnChange,
}

#[derive(Debug, Default)]
pub struct DecisionController {
    state: OverrideState,
    policy: PublishPolicy,
    last_auto: Option<OutboundMessage>,
}

impl DecisionController {
    pub fn new(policy: PublishPolicy) -> Self {
        DecisionController {
            state: OverrideState::Auto,
            policy,
            last_auto: None,
        }
    }

    pub fn state(&self) -> OverrideState {
        self.state
    }

    /// Automatic decision for one classification
    ///
    /// Suppressed entirely while an override is active.
    pub fn on_classification(&mut self, classification: &Classification) -> Option<OutboundMessage> {
        if self.state != OverrideState::Auto {
            return None;
        }

        let message = if classification.label == Label::Hot {
            OutboundMessage::AlertOn
        } else {
            OutboundMessage::AlertOff
        };

        if self.policy == PublishPolicy::OnChange && self.last_auto == Some(message) {
            return None;
        }

        self.last_auto = Some(message);
        Some(message)
    }

    /// Operator override; returns the message to send right now
    pub fn set_override(&mut self, state: OverrideState) -> Option<OutboundMessage> {
        info!("Override {:?} -> {:?}", self.state, state);
        self.state = state;
        // The device state no longer follows the last automatic decision
        self.last_auto = None;

        match state {
            OverrideState::Auto => None,
            OverrideState::ForcedOn => Some(OutboundMessage::AlertOn),
            OverrideState::ForcedOff => Some(OutboundMessage::AlertOff),
        }
    }

    /// Back to automatic mode; the next reading decides
    pub fn clear_override(&mut self) {
        if self.state != OverrideState::Auto {
            info!("Override {:?} cleared", self.state);
        }
        self.state = OverrideState::Auto;
        self.last_auto = None;
    }
}
