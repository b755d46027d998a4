use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rumqttc::{MqttOptions, Transport};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::publisher::ConnectionError;
use crate::telemetry::Message;

const API_VERSION: &str = "2021-04-12";

/// Transport-kind selector for the device link
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// MQTT over TLS with the platform's root certificates
    #[default]
    Mqtt,
    /// MQTT over plain TCP, for local brokers
    #[value(name = "mqtt_tcp")]
    MqttTcp,
}

impl TransportKind {
    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Mqtt => 8883,
            TransportKind::MqttTcp => 1883,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportKind::Mqtt => write!(f, "mqtt"),
            TransportKind::MqttTcp => write!(f, "mqtt_tcp"),
        }
    }
}

/// Parsed device connection string (`HostName=...;DeviceId=...;SharedAccessSignature=...`)
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host_name: String,
    pub device_id: String,
    pub shared_access_signature: Option<String>,
    pub port: Option<u16>,
}

// The signature is a credential, keep it out of logs
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field(
                "shared_access_signature",
                &self.shared_access_signature.as_ref().map(|_| "<redacted>"),
            )
            .field("port", &self.port)
            .finish()
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_signature = None;
        let mut shared_access_key = false;
        let mut port = None;

        let segments = s.split(';').map(str::trim).filter(|seg| !seg.is_empty());
        for (index, segment) in segments.enumerate() {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ConnectionError::InvalidConnectionString(format!(
                    "segment {} is not a Key=Value pair",
                    index + 1
                ))
            })?;
            let value = value.trim();
            match key.trim() {
                "HostName" => host_name = Some(value.to_string()),
                "DeviceId" => device_id = Some(value.to_string()),
                "SharedAccessSignature" => shared_access_signature = Some(value.to_string()),
                "SharedAccessKey" => shared_access_key = true,
                "Port" => {
                    port = Some(value.parse::<u16>().map_err(|e| {
                        ConnectionError::InvalidConnectionString(format!(
                            "invalid port '{}': {}",
                            value, e
                        ))
                    })?)
                }
                other => debug!("Ignoring connection string key '{}'", other),
            }
        }

        let host_name = non_empty(host_name, "HostName")?;
        let device_id = non_empty(device_id, "DeviceId")?;

        if shared_access_key && shared_access_signature.is_none() {
            return Err(ConnectionError::InvalidConnectionString(
                "SharedAccessKey is not signed locally, provide a pre-generated SharedAccessSignature"
                    .to_string(),
            ));
        }

        Ok(Self {
            host_name,
            device_id,
            shared_access_signature,
            port,
        })
    }
}

fn non_empty(value: Option<String>, key: &str) -> Result<String, ConnectionError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConnectionError::InvalidConnectionString(format!(
            "missing {}",
            key
        ))),
    }
}

/// Everything needed to open the device link
#[derive(Clone, Debug)]
pub struct MqttSettings {
    pub connection: ConnectionString,
    pub transport: TransportKind,
    pub keep_alive: Duration,
    pub capacity: usize,
}

impl MqttSettings {
    pub fn port(&self) -> u16 {
        self.connection
            .port
            .unwrap_or_else(|| self.transport.default_port())
    }

    pub fn username(&self) -> String {
        format!(
            "{}/{}/?api-version={}",
            self.connection.host_name, self.connection.device_id, API_VERSION
        )
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.connection.device_id.clone(),
            self.connection.host_name.clone(),
            self.port(),
        );
        options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true);

        if let Some(signature) = &self.connection.shared_access_signature {
            options.set_credentials(self.username(), signature.clone());
        }

        if self.transport == TransportKind::Mqtt {
            options.set_transport(Transport::tls_with_default_config());
        }

        options
    }

    /// Device-to-cloud topic with the message metadata as property bag
    pub fn telemetry_topic(&self, message: &Message) -> String {
        format!(
            "devices/{}/messages/events/$.ct={}&$.ce={}",
            self.connection.device_id,
            encode_property(message.content_type()),
            encode_property(message.content_encoding())
        )
    }
}

fn encode_property(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Reading;

    const SAMPLE: &str = "HostName=demo-hub.azure-devices.net;DeviceId=sensor-01;SharedAccessSignature=SharedAccessSignature sr=demo-hub.azure-devices.net%2Fdevices%2Fsensor-01&sig=abc%3D&se=1700000000";

    fn settings(transport: TransportKind) -> MqttSettings {
        MqttSettings {
            connection: SAMPLE.parse().unwrap(),
            transport,
            keep_alive: Duration::from_secs(30),
            capacity: 10,
        }
    }

    #[test]
    fn parses_device_connection_string() {
        let parsed: ConnectionString = SAMPLE.parse().unwrap();
        assert_eq!(parsed.host_name, "demo-hub.azure-devices.net");
        assert_eq!(parsed.device_id, "sensor-01");
        assert_eq!(
            parsed.shared_access_signature.as_deref(),
            Some("SharedAccessSignature sr=demo-hub.azure-devices.net%2Fdevices%2Fsensor-01&sig=abc%3D&se=1700000000")
        );
        assert_eq!(parsed.port, None);
    }

    #[test]
    fn tolerates_trailing_separator_and_unknown_keys() {
        let parsed: ConnectionString = "HostName=localhost;DeviceId=dev;Port=1884;GatewayHostName=gw;"
            .parse()
            .unwrap();
        assert_eq!(parsed.port, Some(1884));
        assert!(parsed.shared_access_signature.is_none());
    }

    #[test]
    fn rejects_incomplete_strings() {
        for input in [
            "",
            "DeviceId=dev",
            "HostName=localhost",
            "HostName=;DeviceId=dev",
            "HostName=localhost;DeviceId",
            "HostName=localhost;DeviceId=dev;Port=abc",
        ] {
            let result = input.parse::<ConnectionString>();
            assert!(
                matches!(result, Err(ConnectionError::InvalidConnectionString(_))),
                "accepted '{}'",
                input
            );
        }
    }

    #[test]
    fn rejects_unsigned_shared_access_key() {
        let result = "HostName=hub;DeviceId=dev;SharedAccessKey=c2VjcmV0".parse::<ConnectionString>();
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidConnectionString(msg)) if msg.contains("SharedAccessSignature")
        ));
    }

    #[test]
    fn debug_output_redacts_signature() {
        let parsed: ConnectionString = SAMPLE.parse().unwrap();
        let rendered = format!("{:?}", parsed);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("sig=abc"));
    }

    #[test]
    fn port_follows_transport_unless_overridden() {
        assert_eq!(settings(TransportKind::Mqtt).port(), 8883);
        assert_eq!(settings(TransportKind::MqttTcp).port(), 1883);

        let mut custom = settings(TransportKind::MqttTcp);
        custom.connection.port = Some(2883);
        assert_eq!(custom.port(), 2883);
    }

    #[test]
    fn builds_client_options_from_credentials() {
        let settings = settings(TransportKind::MqttTcp);
        let options = settings.mqtt_options();

        assert_eq!(options.client_id(), "sensor-01");
        assert_eq!(
            options.broker_address(),
            ("demo-hub.azure-devices.net".to_string(), 1883)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        let (username, _) = options.credentials().unwrap();
        assert_eq!(
            username,
            "demo-hub.azure-devices.net/sensor-01/?api-version=2021-04-12"
        );
    }

    #[test]
    fn topic_carries_message_metadata() {
        let message = Message::from_reading(&Reading {
            temperature: 21.0,
            humidity: 61.0,
        })
        .unwrap();
        assert_eq!(
            settings(TransportKind::Mqtt).telemetry_topic(&message),
            "devices/sensor-01/messages/events/$.ct=application%2Fjson&$.ce=utf-8"
        );
    }

    #[test]
    fn transport_names_round_trip_through_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            transport: TransportKind,
        }
        let parsed: Wrapper = toml::from_str("transport = \"mqtt_tcp\"").unwrap();
        assert_eq!(parsed.transport, TransportKind::MqttTcp);
        assert_eq!(TransportKind::MqttTcp.to_string(), "mqtt_tcp");
    }
}
