use std::fmt;

use super::reading::Reading;

pub const CONTENT_TYPE: &str = "application/json";
pub const CONTENT_ENCODING: &str = "utf-8";

/// Outbound telemetry envelope
///
/// Owned by exactly one tick. It is built, handed to the connection once and
/// dropped afterwards; nothing ever resends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Vec<u8>,
    content_type: &'static str,
    content_encoding: &'static str,
}

impl Message {
    pub fn from_reading(reading: &Reading) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(reading)?;
        Ok(Self {
            body,
            content_type: CONTENT_TYPE,
            content_encoding: CONTENT_ENCODING,
        })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text for console output, lossy only if the body was not produced by serde_json
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn content_type(&self) -> &str {
        self.content_type
    }

    pub fn content_encoding(&self) -> &str {
        self.content_encoding
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}; {}] {}",
            self.content_type,
            self.content_encoding,
            self.body_text()
        )
    }
}
