use log::{debug, error, info, warn};
use std::future::Future;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

use iot_classifier::channel::inbound_channel;
use iot_classifier::config::PipelineConfig;
use iot_classifier::inference::InferenceEngine;
use iot_classifier::models::OverrideState;
use iot_classifier::operator::OperatorCommand;
use iot_classifier::pipeline::Pipeline;
use iot_classifier::transport::{self, ConnectionSupervisor, Publish};

const STATUS_EVERY_TICKS: u64 = 60;
const DEFAULT_EXPORT_FILE: &str = "log.csv";

fn log_status<P: Publish>(pipeline: &Pipeline<P>) {
    let snapshot = pipeline.snapshot();
    let stats = snapshot.stats;

    info!(
        "Status: connection={:?}, override={:?}",
        snapshot.connection, snapshot.override_state
    );
    info!(
        "  Messages: {} received, {} processed, {} malformed, {} ignored, {} dropped",
        stats.received, stats.processed, stats.malformed, stats.ignored, stats.dropped
    );
    info!(
        "  Publishes: {} attempted, {} failed",
        stats.publish_attempts, stats.publish_failures
    );

    match &snapshot.last {
        Some(last) => info!(
            "  Last data: {}",
            iot_classifier::utils::describe_entry(last)
        ),
        None => info!("  Waiting for data..."),
    }
}

fn handle_command<P: Publish>(
    pipeline: &mut Pipeline<P>,
    command: OperatorCommand,
    config: &PipelineConfig,
) {
    match command {
        OperatorCommand::Override(OverrideState::Auto) => {
            pipeline.clear_override();
            info!("Automatic control resumed");
        }
        OperatorCommand::Override(state) => {
            if let Some(message) = pipeline.set_override(state) {
                info!("Manual override sent {}", message.as_str());
            }
        }
        OperatorCommand::Save(path) => {
            let path = path
                .or_else(|| config.export_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
            if let Err(e) = pipeline.write_csv(&path) {
                error!("Failed to export log to {}: {}", path.display(), e);
            }
        }
        OperatorCommand::Status => log_status(pipeline),
    }
}

/// Read console lines on a plain thread so a pending read never holds up shutdown
fn spawn_console_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Resolve the returned receiver once `signal` fires
///
/// If the signal cannot be registered the receiver never resolves and the
/// pipeline keeps running without it.
fn watch_for_shutdown<F>(signal: F) -> oneshot::Receiver<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = signal.await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Keep the sender alive so the receiver stays pending
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });
    rx
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match PipelineConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // No classifier, no pipeline
    let engine = match InferenceEngine::load(&config.model_path) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Model load error: {}", e);
            error!("Refusing to start the inbound processing loop without a model");
            return Err(e.into());
        }
    };

    // Network side: broker session driven by the supervisor task
    let (publisher, link) = transport::connect(&config);
    let (inbound_tx, inbound_rx) = inbound_channel(config.inbound_capacity);
    let (supervisor, connection) = ConnectionSupervisor::new(link, inbound_tx, &config);
    let network = tokio::spawn(supervisor.run());

    // Consumer side: constructed once, ticked forever
    let mut pipeline = Pipeline::new(&config, engine, Arc::new(publisher), inbound_rx, connection);

    // Handle Ctrl+C gracefully
    let mut rx = watch_for_shutdown(tokio::signal::ctrl_c());

    let mut console = spawn_console_reader();
    let mut console_open = true;

    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    info!("Commands: on | off | auto | save [path] | status");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = pipeline.tick();
                if report.drained > 0 {
                    debug!(
                        "Tick: {} drained, {} processed, {} malformed, {} ignored",
                        report.drained, report.processed, report.malformed, report.ignored
                    );
                }

                ticks += 1;
                if ticks % STATUS_EVERY_TICKS == 0 {
                    log_status(&pipeline);
                }
            }
            line = console.recv(), if console_open => {
                match line {
                    Some(line) => match OperatorCommand::parse(&line) {
                        Some(command) => handle_command(&mut pipeline, command, &config),
                        None if line.trim().is_empty() => {}
                        None => warn!("Unknown command '{}'", line.trim()),
                    },
                    None => console_open = false,
                }
            }
            _ = &mut rx => {
                info!("Program terminated by user. Exiting gracefully.");
                break;
            }
        }
    }

    // In-flight publishes and the retry loop are abandoned
    network.abort();

    if let Some(path) = &config.export_path {
        if let Err(e) = pipeline.write_csv(path) {
            error!("Failed to export log to {}: {}", path.display(), e);
        }
    }

    Ok(())
}
