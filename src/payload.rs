//! JSON report body

use serde::{Deserialize, Serialize};

use crate::model::Reading;

pub const MAX_PAYLOAD_LEN: usize = 64;

/// Wire form of a [`Reading`]: `{"level":<f32>,"voltage":<f32>}`
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct Payload {
    pub level: f32,
    pub voltage: f32,
}

impl From<&Reading> for Payload {
    fn from(reading: &Reading) -> Self {
        Self {
            level: reading.level,
            voltage: reading.voltage,
        }
    }
}

impl From<Payload> for Reading {
    fn from(payload: Payload) -> Self {
        Self {
            level: payload.level,
            voltage: payload.voltage,
        }
    }
}

/// Serialize into `buf`, returning the number of bytes written
pub fn encode(reading: &Reading, buf: &mut [u8]) -> Result<usize, &'static str> {
    serde_json_core::to_slice(&Payload::from(reading), buf).map_err(|_| "payload buffer too small")
}

pub fn decode(bytes: &[u8]) -> Result<Reading, &'static str> {
    let (payload, _) =
        serde_json_core::from_slice::<Payload>(bytes).map_err(|_| "malformed payload")?;
    Ok(payload.into())
}
