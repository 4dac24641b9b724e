//! AirCom node
//!
//! Builds every component once from configuration and runs the network
//! (router), health, UI-sink and audio-sink tasks until interrupted.

use aircom_bus::{AudioCommand, MessageBody, MessageBus};
use aircom_core::{logging, Config, ErrorRecovery};
use aircom_crypto::GroupKeyGateway;
use aircom_mesh::{HealthMonitor, MessageRouter};
use aircom_radio::{LoopbackHub, RadioTransport};
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

/// How long the sink tasks wait on a channel before looking again.
const SINK_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[derive(Parser)]
#[command(name = "aircom-node", about = "AirCom tactical mesh node")]
struct Cli {
    /// Path to a TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the version handshake as JSON and exit
    #[arg(long)]
    version_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version_json {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default_config(),
    };
    logging::init(&config.logging);
    info!(
        node_id = %config.node.node_id,
        callsign = %config.node.callsign,
        "AirCom node starting"
    );

    // No hardware radio stack is linked; run on the in-memory hub.
    let hub = LoopbackHub::new();
    let transport: Arc<dyn RadioTransport> = hub.attach(config.node.node_id.clone());
    let gateway = Arc::new(GroupKeyGateway::generate());

    let bus = MessageBus::new(&config.channels).context("failed to build message bus")?;
    let recovery = Arc::new(ErrorRecovery::new());

    let router = Arc::new(MessageRouter::new(
        &config,
        Arc::clone(&transport),
        gateway,
        bus.clone(),
        Arc::clone(&recovery),
    ));
    let health = Arc::new(HealthMonitor::new(
        &config,
        transport,
        Arc::clone(router.contacts()),
        Arc::clone(router.link_stats()),
        Arc::clone(&recovery),
    ));

    let mut tasks = JoinSet::new();
    tasks.spawn(Arc::clone(&router).run());
    tasks.spawn(health.run());
    tasks.spawn(ui_sink(bus.clone()));
    tasks.spawn(audio_sink(bus));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    tasks.shutdown().await;
    let stats = recovery.stats();
    info!(
        total_errors = stats.total_errors,
        recoveries = stats.successful_recoveries,
        cached_frames = router.cache().len(),
        "AirCom node stopped"
    );
    Ok(())
}

/// Stand-in for the display task: consumes summaries and received messages.
async fn ui_sink(bus: MessageBus) {
    let mut gps_lock = false;
    loop {
        if let Some(update) = bus.ui_update.receive(SINK_POLL).await {
            gps_lock = update.gps_lock.apply(gps_lock);
            debug!(
                gps_lock,
                contacts = update.contact_count,
                degraded = update.degraded,
                "Status update"
            );
        }

        while let Some(message) = bus.incoming_message.try_receive() {
            match message.body {
                MessageBody::Text(text) => {
                    info!(from = %message.callsign, text = %text, "Text message received")
                }
                MessageBody::Cot(xml) => {
                    info!(from = %message.callsign, bytes = xml.len(), "CoT event received")
                }
            }
        }
    }
}

/// Stand-in for the audio task: consumes push-to-talk commands.
async fn audio_sink(bus: MessageBus) {
    loop {
        match bus.audio_command.receive(SINK_POLL).await {
            Some(AudioCommand::StartTx) => info!("Transmit started"),
            Some(AudioCommand::StopTx) => info!("Transmit stopped"),
            None => {}
        }
    }
}
