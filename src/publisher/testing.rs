//! Scripted in-memory connection for loop and session tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Connection, TransportError};
use crate::telemetry::Message;

#[derive(Debug, Default)]
pub struct Probe {
    started: AtomicUsize,
    completed: AtomicUsize,
    disposed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    bodies: Mutex<Vec<String>>,
}

impl Probe {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

pub struct ScriptedConnection {
    probe: Arc<Probe>,
    send_delay: Duration,
    fail_on: Option<usize>,
}

impl ScriptedConnection {
    pub fn new() -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let connection = Self {
            probe: probe.clone(),
            send_delay: Duration::ZERO,
            fail_on: None,
        };
        (connection, probe)
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Makes the n-th send (1-based) fail with a lost connection.
    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on = Some(attempt);
        self
    }
}

impl Connection for ScriptedConnection {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        assert_eq!(self.probe.disposed(), 0, "send after dispose");
        let attempt = self.probe.started.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on == Some(attempt) {
            return Err(TransportError::ConnectionLost("scripted failure".into()));
        }

        self.probe
            .bodies
            .lock()
            .unwrap()
            .push(message.body_text().into_owned());
        self.probe.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(self) {
        self.probe.disposed.fetch_add(1, Ordering::SeqCst);
    }
}
