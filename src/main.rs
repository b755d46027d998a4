pub mod config;
pub mod mqtt;
pub mod publisher;
pub mod telemetry;

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use config::{Cli, PublisherConfig};
use mqtt::MqttConnection;
use publisher::run_session;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let cli = Cli::parse();

    println!("IoT Hub - Device simulator");

    let config = PublisherConfig::resolve(&cli)
        .await
        .wrap_err("Failed to load configuration")?;
    let settings = config
        .mqtt_settings()
        .wrap_err("Invalid device credentials")?;

    // Connection errors are fatal, the loop is never entered
    let connection = MqttConnection::connect(settings)
        .await
        .wrap_err("Failed to connect to the ingestion endpoint")?;

    println!("Press control-C to stop the simulation.");
    let cancel = CancellationToken::new();
    let _interrupt_handle = spawn_interrupt_handler(cancel.clone());

    // Disposal happens inside the session on every exit path
    let report = run_session(connection, &cancel, config.interval())
        .await
        .wrap_err("Telemetry publishing aborted")?;

    info!("Sent {} messages", report.sent);
    println!("Device simulator finished.");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    // stdout is reserved for the per-message console lines
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Cancels `cancel` on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                println!("Stopping simulation...");
                info!("Interrupt received, requesting shutdown");
                cancel.cancel();
            }
            Err(e) => error!("Unable to listen for the interrupt signal: {}", e),
        }
    })
}
