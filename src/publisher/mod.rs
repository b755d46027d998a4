//! # Publisher Module
//!
//! Owns the cancellable periodic publish loop and the lifetime of the connection it
//! sends through.
//!
//! ```text
//! publisher/
//! ├── error.rs         - ConnectionError, TransportError, PublishError
//! ├── publish_loop.rs  - Tick state machine (Idle → Generating → Sending → Waiting)
//! └── session.rs       - Scoped connection ownership and exactly-once disposal
//! ```
//!
//! ## Cancellation
//!
//! The loop observes a [`tokio_util::sync::CancellationToken`] only at the boundary
//! between ticks. A send that was already issued is always awaited to completion, so a
//! shutdown request takes at most one send plus the remainder of the current wait.
//!
//! ## Connection Seam
//!
//! [`Connection`] is the only dependency the loop has on the outside world. The MQTT
//! client in [`crate::mqtt`] implements it for production; tests plug in a scripted
//! in-memory double.

pub mod error;
pub mod publish_loop;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;

use crate::telemetry::Message;

pub use error::{ConnectionError, PublishError, TransportError};
pub use publish_loop::PublishReport;
pub use session::run_session;

/// Logical link to the ingestion endpoint
///
/// Implementations are used by a single sender, `send` is never called again before the
/// previous call resolved. `dispose` consumes the connection, so nothing can touch it
/// afterwards.
pub trait Connection: Send {
    /// Delivers one message and resolves once the endpoint accepted it.
    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Releases every network resource held by the connection.
    fn dispose(self) -> impl Future<Output = ()> + Send;
}
