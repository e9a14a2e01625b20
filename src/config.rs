use log::{info, warn};
use rumqttc::QoS;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::decision::PublishPolicy;
use crate::error::ConfigError;

// Defaults for the classroom broker the sensor firmware publishes to
const DEFAULT_BROKER: &str = "broker.emqx.io";
const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TOPIC_SENSOR: &str = "iot/class/session5/sensor";
const DEFAULT_TOPIC_OUTPUT: &str = "iot/class/session5/output";
const DEFAULT_MODEL_PATH: &str = "iot_temp_model.json";

const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
const DEFAULT_BACKOFF_SECS: u64 = 3;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INBOUND_CAPACITY: usize = 256;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Live view (chart) bound
pub const LIVE_LOG_CAPACITY: usize = 200;
/// Upper bound for the archive (table/export) log
pub const MAX_ARCHIVE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    pub qos: QoS,
    pub retain: bool,
    pub inbound_topic: String,
    pub outbound_topic: String,
    pub model_path: PathBuf,
    pub reconnect_backoff: Duration,
    pub connect_timeout: Duration,
    pub inbound_capacity: usize,
    pub live_log_capacity: usize,
    pub archive_log_capacity: usize,
    pub tick_interval: Duration,
    pub publish_policy: PublishPolicy,
    pub export_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            broker_host: DEFAULT_BROKER.to_string(),
            broker_port: DEFAULT_PORT,
            client_id: format!("iot-classifier-{}", std::process::id()),
            credentials: None,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            qos: QoS::AtMostOnce,
            retain: false,
            inbound_topic: DEFAULT_TOPIC_SENSOR.to_string(),
            outbound_topic: DEFAULT_TOPIC_OUTPUT.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            reconnect_backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            live_log_capacity: LIVE_LOG_CAPACITY,
            archive_log_capacity: MAX_ARCHIVE_CAPACITY,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            publish_policy: PublishPolicy::EveryReading,
            export_path: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `.env` and the process environment
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Self::from_lookup(|key| env::var(key).ok())?;

        info!(
            "Broker: {}:{} (client id {})",
            config.broker_host, config.broker_port, config.client_id
        );
        info!(
            "Topics: in='{}', out='{}'",
            config.inbound_topic, config.outbound_topic
        );
        info!("Model artifact: {}", config.model_path.display());

        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Missing keys fall back to defaults; present but unparsable values
    /// are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PipelineConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = get("MQTT_PORT") {
            config.broker_port = parse_number("MQTT_PORT", &port)?;
        }

        // Broker may be a bare host or a mqtt:// URL carrying its own port
        if let Some(broker) = get("MQTT_BROKER") {
            let (host, port) = parse_broker(&broker)?;
            config.broker_host = host;
            if let Some(port) = port {
                config.broker_port = port;
            }
        }

        if let Some(id) = get("MQTT_CLIENT_ID") {
            config.client_id = id;
        }

        match (get("MQTT_USERNAME"), lookup("MQTT_PASSWORD")) {
            (Some(username), password) => {
                config.credentials = Some(Credentials {
                    username,
                    password: password.unwrap_or_default(),
                });
            }
            (None, Some(_)) => warn!("MQTT_PASSWORD set without MQTT_USERNAME, ignoring"),
            (None, None) => {}
        }

        if let Some(secs) = get("MQTT_KEEP_ALIVE_SECS") {
            let secs: u64 = parse_number("MQTT_KEEP_ALIVE_SECS", &secs)?;
            if secs < 5 {
                return Err(ConfigError::invalid(
                    "MQTT_KEEP_ALIVE_SECS",
                    &secs.to_string(),
                    "must be at least 5",
                ));
            }
            config.keep_alive = Duration::from_secs(secs);
        }

        if let Some(qos) = get("MQTT_QOS") {
            config.qos = match qos.as_str() {
                "0" => QoS::AtMostOnce,
                "1" => QoS::AtLeastOnce,
                "2" => QoS::ExactlyOnce,
                _ => return Err(ConfigError::invalid("MQTT_QOS", &qos, "expected 0, 1 or 2")),
            };
        }

        if let Some(retain) = get("MQTT_RETAIN") {
            config.retain = parse_bool("MQTT_RETAIN", &retain)?;
        }

        if let Some(topic) = get("TOPIC_SENSOR") {
            config.inbound_topic = topic;
        }
        if let Some(topic) = get("TOPIC_OUTPUT") {
            if topic.contains(['+', '#']) {
                return Err(ConfigError::invalid(
                    "TOPIC_OUTPUT",
                    &topic,
                    "wildcards are not allowed in a publish topic",
                ));
            }
            config.outbound_topic = topic;
        }

        if let Some(path) = get("MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }

        if let Some(secs) = get("RECONNECT_BACKOFF_SECS") {
            let secs: u64 = parse_number("RECONNECT_BACKOFF_SECS", &secs)?;
            if !(1..=60).contains(&secs) {
                return Err(ConfigError::invalid(
                    "RECONNECT_BACKOFF_SECS",
                    &secs.to_string(),
                    "must be between 1 and 60",
                ));
            }
            config.reconnect_backoff = Duration::from_secs(secs);
        }

        if let Some(secs) = get("CONNECT_TIMEOUT_SECS") {
            let secs: u64 = parse_number("CONNECT_TIMEOUT_SECS", &secs)?;
            config.connect_timeout = Duration::from_secs(secs.max(1));
        }

        if let Some(capacity) = get("INBOUND_CAPACITY") {
            config.inbound_capacity = parse_positive("INBOUND_CAPACITY", &capacity)?;
        }

        if let Some(capacity) = get("LIVE_LOG_CAPACITY") {
            config.live_log_capacity = parse_positive("LIVE_LOG_CAPACITY", &capacity)?;
        }

        if let Some(capacity) = get("ARCHIVE_LOG_CAPACITY") {
            config.archive_log_capacity = parse_positive("ARCHIVE_LOG_CAPACITY", &capacity)?;
        }

        // Archive keeps at least the live window and never more than the table limit
        if config.archive_log_capacity > MAX_ARCHIVE_CAPACITY {
            warn!(
                "Archive capacity {} above limit, using {}",
                config.archive_log_capacity, MAX_ARCHIVE_CAPACITY
            );
            config.archive_log_capacity = MAX_ARCHIVE_CAPACITY;
        }
        config.live_log_capacity = config.live_log_capacity.min(config.archive_log_capacity);

        if let Some(ms) = get("TICK_INTERVAL_MS") {
            let ms: u64 = parse_positive("TICK_INTERVAL_MS", &ms)?;
            config.tick_interval = Duration::from_millis(ms);
        }

        if let Some(policy) = get("DECISION_POLICY") {
            config.publish_policy = match policy.to_ascii_lowercase().as_str() {
                "every" | "every_reading" => PublishPolicy::EveryReading,
                "change" | "on_change" => PublishPolicy::OnChange,
                _ => {
                    return Err(ConfigError::invalid(
                        "DECISION_POLICY",
                        &policy,
                        "expected 'every_reading' or 'on_change'",
                    ))
                }
            };
        }

        config.export_path = get("EXPORT_PATH").map(PathBuf::from);

        Ok(config)
    }
}

fn parse_broker(raw: &str) -> Result<(String, Option<u16>), ConfigError> {
    if !raw.contains("://") {
        return Ok((raw.to_string(), None));
    }

    let url = Url::parse(raw).map_err(|e| ConfigError::invalid("MQTT_BROKER", raw, e.to_string()))?;
    if !matches!(url.scheme(), "mqtt" | "tcp") {
        return Err(ConfigError::invalid(
            "MQTT_BROKER",
            raw,
            "only mqtt:// and tcp:// endpoints are supported",
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::invalid("MQTT_BROKER", raw, "missing host"))?;

    Ok((host.to_string(), url.port()))
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value: T = parse_number(key, raw)?;
    if value <= T::default() {
        return Err(ConfigError::invalid(key, raw, "must be greater than zero"));
    }
    Ok(value)
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
    }
}
