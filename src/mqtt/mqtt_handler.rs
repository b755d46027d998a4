use std::time::Duration;

use chrono::{DateTime, Local};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError as MqttError, Event, EventLoop, Outgoing,
    Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::config::MqttSettings;
use crate::publisher::{Connection, ConnectionError, TransportError};
use crate::telemetry::Message;

const DRIVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Clone, Debug, Default)]
pub struct MqttStatus {
    pub connection_state: ConnectionState,
    pub messages_sent: usize,
    pub last_activity: Option<DateTime<Local>>,
}

/// What the driver task reports back to the connection handle
#[derive(Debug)]
enum LinkEvent {
    Connected,
    Refused(String),
    Acked(u16),
    Failed(String),
}

pub struct MqttConnection {
    status: MqttStatus,
    client: AsyncClient,
    events: mpsc::Receiver<LinkEvent>,
    driver: JoinHandle<()>,
    settings: MqttSettings,
}

impl MqttConnection {
    /// Opens the link and waits for the broker's ConnAck.
    ///
    /// # Errors
    ///
    /// * [`ConnectionError::Refused`] - the broker rejected the session (bad credentials, unknown device)
    /// * [`ConnectionError::Network`] - host unreachable, TLS failure, or the driver ended early
    pub async fn connect(settings: MqttSettings) -> Result<Self, ConnectionError> {
        let mut status = MqttStatus {
            connection_state: ConnectionState::Connecting,
            ..MqttStatus::default()
        };
        info!(
            "Connecting to {}:{} as '{}' via {}",
            settings.connection.host_name,
            settings.port(),
            settings.connection.device_id,
            settings.transport
        );

        let (client, eventloop) = AsyncClient::new(settings.mqtt_options(), settings.capacity);
        let (event_tx, mut events) = mpsc::channel(16);
        let driver = tokio::spawn(drive(eventloop, event_tx));

        let failure = match events.recv().await {
            Some(LinkEvent::Connected) => None,
            Some(LinkEvent::Refused(code)) => Some(ConnectionError::Refused(code)),
            Some(LinkEvent::Failed(e)) => Some(ConnectionError::Network(e)),
            Some(LinkEvent::Acked(pkid)) => Some(ConnectionError::Network(format!(
                "unexpected PubAck {} before ConnAck",
                pkid
            ))),
            None => Some(ConnectionError::Network(
                "driver stopped before ConnAck".to_string(),
            )),
        };

        if let Some(e) = failure {
            error!("Failed to connect: {}", e);
            driver.abort();
            return Err(e);
        }

        status.connection_state = ConnectionState::Connected;
        status.last_activity = Some(Local::now());
        info!("Connected to {}", settings.connection.host_name);

        Ok(Self {
            status,
            client,
            events,
            driver,
            settings,
        })
    }

    fn mark_failed(&mut self, reason: &str) {
        warn!("MQTT link failed: {}", reason);
        self.status.connection_state = ConnectionState::Failed;
    }
}

impl Connection for MqttConnection {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let topic = self.settings.telemetry_topic(&message);
        trace!("Publishing {} to {}", message, topic);

        if let Err(e) = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, message.into_body())
            .await
        {
            self.mark_failed(&e.to_string());
            return Err(TransportError::Publish(e.to_string()));
        }

        // Only one publish is ever outstanding, so the next PubAck belongs to it
        loop {
            match self.events.recv().await {
                Some(LinkEvent::Acked(pkid)) => {
                    self.status.messages_sent += 1;
                    self.status.last_activity = Some(Local::now());
                    debug!("PubAck received for packet {}", pkid);
                    return Ok(());
                }
                Some(LinkEvent::Connected) => debug!("Session acknowledged again"),
                Some(LinkEvent::Refused(reason)) | Some(LinkEvent::Failed(reason)) => {
                    self.mark_failed(&reason);
                    return Err(TransportError::ConnectionLost(reason));
                }
                None => {
                    self.mark_failed("driver stopped");
                    return Err(TransportError::DriverStopped);
                }
            }
        }
    }

    async fn dispose(self) {
        let Self {
            status,
            client,
            events,
            mut driver,
            ..
        } = self;
        info!(
            "Disposing MQTT connection (state: {:?}, sent: {}, last activity: {:?})",
            status.connection_state, status.messages_sent, status.last_activity
        );

        if status.connection_state == ConnectionState::Connected {
            if let Err(e) = client.disconnect().await {
                warn!("Failed to request disconnect: {}", e);
            }
        }

        match tokio::time::timeout(DRIVER_SHUTDOWN_TIMEOUT, &mut driver).await {
            Ok(Ok(())) => debug!("MQTT driver finished"),
            Ok(Err(e)) => warn!("MQTT driver ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "MQTT driver still running after {:?}, aborting",
                    DRIVER_SHUTDOWN_TIMEOUT
                );
                driver.abort();
            }
        }

        drop(events);
        debug!("MQTT connection disposed");
    }
}

/// Polls the event loop until disconnect, the first error, or the handle going away.
async fn drive(mut eventloop: EventLoop, events: mpsc::Sender<LinkEvent>) {
    loop {
        let link_event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    LinkEvent::Connected
                } else {
                    LinkEvent::Refused(format!("{:?}", ack.code))
                }
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => LinkEvent::Acked(ack.pkid),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect sent, stopping driver");
                break;
            }
            Ok(event) => {
                trace!("MQTT event: {:?}", event);
                continue;
            }
            Err(MqttError::ConnectionRefused(code)) => {
                let _ = events.send(LinkEvent::Refused(format!("{:?}", code))).await;
                break;
            }
            Err(e) => {
                error!("MQTT event loop error: {}", e);
                let _ = events.send(LinkEvent::Failed(e.to_string())).await;
                break;
            }
        };

        if events.send(link_event).await.is_err() {
            debug!("Connection handle dropped, stopping driver");
            break;
        }
    }
}
