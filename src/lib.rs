//! MQTT telemetry classification bridge
//!
//! Sensor readings arrive from the broker on the network task, cross a
//! bounded channel, and are classified, logged and answered with a control
//! message from the pipeline tick.

pub mod channel;
pub mod codec;
pub mod config;
pub mod decision;
pub mod error;
pub mod event_log;
pub mod export;
pub mod inference;
pub mod models;
pub mod operator;
pub mod pipeline;
pub mod publisher;
pub mod transport;
pub mod utils;
