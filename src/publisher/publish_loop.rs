//! Publish loop with statum state machine for tick sequencing
//!
//! Every tick walks the same typed path, so a state can only be reached in order:
//!
//! ```text
//! Idle ──► Generating ──► Sending ──► Waiting ──┐
//!  ▲ │                                          │
//!  │ └──(cancelled)──► Stopped                  │
//!  └────────────────────────────────────────────┘
//! ```
//!
//! There is no edge out of `Sending` other than to `Waiting` or an error. An issued
//! send is never abandoned because of cancellation.

use chrono::Local;
use statum::{machine, state};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Connection, PublishError};
use crate::telemetry::{Message, Reading};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Tick lifecycle states
#[state]
#[derive(Debug, Clone)]
pub enum TickState {
    Idle,       // At the cancellation boundary
    Generating, // Drawing and serializing a reading
    Sending,    // Message handed to the connection
    Waiting,    // Sleeping until the next tick
    Stopped,    // Cancellation observed, terminal
}

#[machine]
#[derive(Debug)]
pub struct PublishLoop<S: TickState> {
    cancel: CancellationToken,
    interval: Duration,
    sent: u64,
}

/// Summary returned once the loop reached `Stopped`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: u64,
}

/// Outcome of the boundary check
pub enum Boundary {
    Tick(PublishLoop<Generating>),
    Stop(PublishLoop<Stopped>),
}

impl PublishLoop<Idle> {
    pub fn create(cancel: CancellationToken, interval: Duration) -> Self {
        debug!("Creating publish loop with interval {:?}", interval);
        Self::new(cancel, interval, 0)
    }

    /// Checks the cancellation token before any new work starts.
    pub fn at_boundary(self) -> Boundary {
        if self.cancel.is_cancelled() {
            info!("Cancellation observed at tick boundary");
            Boundary::Stop(self.transition())
        } else {
            Boundary::Tick(self.transition())
        }
    }
}

impl PublishLoop<Generating> {
    pub fn generate(self) -> Result<(PublishLoop<Sending>, Message), PublishError> {
        let reading = Reading::generate();
        let message = Message::from_reading(&reading)?;
        debug!(
            "Generated reading: temperature={:.2}, humidity={:.2}",
            reading.temperature, reading.humidity
        );
        Ok((self.transition(), message))
    }
}

impl PublishLoop<Sending> {
    /// Awaits the send to completion. Cancellation is not raced against it.
    pub async fn send<C: Connection>(
        mut self,
        connection: &mut C,
        message: Message,
    ) -> Result<PublishLoop<Waiting>, PublishError> {
        let body = message.body_text().into_owned();
        connection.send(message).await?;
        self.sent += 1;

        println!(
            "{} > Sending message: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            body
        );
        debug!("Message #{} delivered", self.sent);
        Ok(self.transition())
    }
}

impl PublishLoop<Waiting> {
    /// Sleeps for one interval. A cancellation request cuts the wait short so the
    /// boundary check runs right away.
    pub async fn wait(self) -> PublishLoop<Idle> {
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => {}
            _ = self.cancel.cancelled() => {
                debug!("Interval wait interrupted by cancellation");
            }
        }
        self.transition()
    }
}

impl PublishLoop<Stopped> {
    pub fn report(self) -> PublishReport {
        PublishReport { sent: self.sent }
    }
}

/// Runs ticks until `cancel` is observed at a boundary.
///
/// Shutdown skips the rest of the current interval wait, an issued send still completes.
///
/// # Errors
///
/// * [`PublishError::Transport`] - the first failed send ends the loop, no retry
/// * [`PublishError::Serialization`] - a reading could not be encoded
pub async fn run<C: Connection>(
    connection: &mut C,
    cancel: &CancellationToken,
    interval: Duration,
) -> Result<PublishReport, PublishError> {
    let mut idle = PublishLoop::<Idle>::create(cancel.clone(), interval);

    loop {
        let generating = match idle.at_boundary() {
            Boundary::Tick(generating) => generating,
            Boundary::Stop(stopped) => {
                let report = stopped.report();
                info!("Publish loop stopped after {} messages", report.sent);
                return Ok(report);
            }
        };

        let (sending, message) = generating.generate()?;
        let waiting = sending.send(connection, message).await?;
        idle = waiting.wait().await;
    }
}
