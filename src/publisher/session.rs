//! Scoped ownership of the connection
//!
//! The session takes the connection by value, drives the publish loop with it and
//! disposes it on every way out of the loop before handing the outcome back.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::publish_loop::{self, PublishReport};
use super::{Connection, PublishError};

/// Runs the publish loop and releases `connection` exactly once afterwards.
///
/// The loop result is returned unchanged after disposal, so a transport failure still
/// reaches the caller but only once the link has been torn down.
pub async fn run_session<C: Connection>(
    mut connection: C,
    cancel: &CancellationToken,
    interval: Duration,
) -> Result<PublishReport, PublishError> {
    info!("Starting publish loop with interval {:?}", interval);
    let outcome = publish_loop::run(&mut connection, cancel, interval).await;

    match &outcome {
        Ok(report) => info!("Publish loop finished, {} messages sent", report.sent),
        Err(e) => error!("Publish loop aborted: {}", e),
    }

    info!("Disposing connection");
    connection.dispose().await;
    outcome
}
