use serde::Serialize;
use time::OffsetDateTime;

/// One decoded telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    Hot,
    Normal,
    Cold,
    Unknown,
}

impl Label {
    /// Map a raw classifier label onto the known classes
    ///
    /// Accepts the English class names and the Indonesian ones the
    /// deployed models were trained with ("Panas", "Dingin").
    /// Matching is case-insensitive; anything else is `Unknown`.
    pub fn from_model_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" | "panas" => Label::Hot,
            "normal" => Label::Normal,
            "cold" | "dingin" => Label::Cold,
            _ => Label::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Hot => "Hot",
            Label::Normal => "Normal",
            Label::Cold => "Cold",
            Label::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub label: Label,
    /// In [0, 1] when the classifier exposes it
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogEntry {
    pub reading: SensorReading,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OverrideState {
    #[default]
    Auto,
    ForcedOn,
    ForcedOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Control message sent back to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutboundMessage {
    AlertOn,
    AlertOff,
}

impl OutboundMessage {
    /// Wire form of the message
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundMessage::AlertOn => "ALERT_ON",
            OutboundMessage::AlertOff => "ALERT_OFF",
        }
    }
}

/// Raw message as handed over by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: OffsetDateTime,
}

impl InboundEvent {
    /// Stamp a message with the current UTC time
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundEvent {
            topic: topic.into(),
            payload: payload.into(),
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_labels_map_to_classes() {
        assert_eq!(Label::from_model_label("Panas"), Label::Hot);
        assert_eq!(Label::from_model_label(" HOT "), Label::Hot);
        assert_eq!(Label::from_model_label("normal"), Label::Normal);
        assert_eq!(Label::from_model_label("Dingin"), Label::Cold);
        assert_eq!(Label::from_model_label("cold"), Label::Cold);
        assert_eq!(Label::from_model_label("lembab"), Label::Unknown);
        assert_eq!(Label::from_model_label(""), Label::Unknown);
    }

    #[test]
    fn outbound_wire_forms() {
        assert_eq!(OutboundMessage::AlertOn.as_str(), "ALERT_ON");
        assert_eq!(OutboundMessage::AlertOff.as_str(), "ALERT_OFF");
    }
}
