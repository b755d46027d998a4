use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lower bound of the simulated temperature in °C
pub const MIN_TEMPERATURE: f64 = 20.0;
/// Width of the temperature range, readings stay below `MIN_TEMPERATURE + TEMPERATURE_SPAN`
pub const TEMPERATURE_SPAN: f64 = 15.0;
/// Lower bound of the simulated relative humidity in %
pub const MIN_HUMIDITY: f64 = 60.0;
/// Width of the humidity range
pub const HUMIDITY_SPAN: f64 = 20.0;

/// One synthetic sensor sample
///
/// The serialized field names are part of the wire contract with the ingestion
/// endpoint and must stay `temperatura` and `humedad`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "temperatura")]
    pub temperature: f64,
    #[serde(rename = "humedad")]
    pub humidity: f64,
}

impl Reading {
    /// Draws a reading from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Draws both values independently from `rng`.
    ///
    /// Ticks are not correlated with each other, every call starts from the base values.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let temperature = MIN_TEMPERATURE + rng.gen::<f64>() * TEMPERATURE_SPAN;
        let humidity = MIN_HUMIDITY + rng.gen::<f64>() * HUMIDITY_SPAN;
        Self {
            temperature,
            humidity,
        }
    }
}
