//! # MQTT Integration Module
//!
//! Production [`Connection`](crate::publisher::Connection) for the ingestion endpoint,
//! built on `rumqttc`. The endpoint speaks MQTT 3.1.1 with device credentials taken
//! from a device connection string.
//!
//! ```text
//! mqtt/
//! ├── config.rs        - Connection string, transport kind, client options, topic
//! └── mqtt_handler.rs  - Connect/send/dispose lifecycle and the event loop driver
//! ```
//!
//! ## Delivery Model
//!
//! `rumqttc` splits the client into a request handle and an event loop that has to be
//! polled for anything to reach the network. The event loop runs in its own driver task
//! and reports ConnAck, PubAck and failures back over a channel:
//!
//! ```text
//! MqttConnection ──publish──► AsyncClient ──► EventLoop (driver task) ──► broker
//!        ▲                                          │
//!        └──────────── LinkEvent (mpsc) ◄───────────┘
//! ```
//!
//! Messages go out with QoS 1 and a send only resolves once the PubAck arrived, so the
//! publish loop never has more than one message in flight.
//!
//! ## Failure Policy
//!
//! The driver stops on the first error and never reconnects. A failure before ConnAck
//! surfaces as a `ConnectionError`, a failure afterwards as a `TransportError` on the
//! next or current send.

pub mod config;
pub mod mqtt_handler;

pub use config::{ConnectionString, MqttSettings, TransportKind};
pub use mqtt_handler::MqttConnection;
