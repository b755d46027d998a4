//! # Telemetry Module
//!
//! Synthetic sensor data for the simulated device. A [`Reading`] is drawn fresh on
//! every tick and wrapped into a [`Message`] that carries the JSON body together with
//! the metadata the ingestion endpoint expects.
//!
//! ```text
//! telemetry/
//! ├── reading.rs  - Reading type and the random generator
//! └── message.rs  - Outbound message envelope
//! ```

pub mod message;
pub mod reading;

pub use message::Message;
pub use reading::Reading;
