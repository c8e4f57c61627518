// Model of the data measured in one wake cycle

use crate::error::ReportError;

/// Value held by [`PreviousReading`] fields until something was reported
pub const NEVER_REPORTED: f32 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Centimeters
    pub level: f32,
    /// Volts
    pub voltage: f32,
}

/// Last reported reading, threaded through the cycle.
///
/// RAM does not survive deep sleep, so every boot starts from
/// [`PreviousReading::never_reported`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousReading {
    pub level: f32,
    pub voltage: f32,
}

impl PreviousReading {
    pub const fn never_reported() -> Self {
        Self {
            level: NEVER_REPORTED,
            voltage: NEVER_REPORTED,
        }
    }

    pub fn record(&mut self, reading: &Reading) {
        self.level = reading.level;
        self.voltage = reading.voltage;
    }
}

/// Result of one measure/decide/report pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Change below both thresholds
    Skipped(Reading),
    /// Server answered with an HTTP status
    Reported { reading: Reading, status: u16 },
    /// Request could not be completed
    ReportFailed { reading: Reading, error: ReportError },
}

impl CycleOutcome {
    pub fn reading(&self) -> Reading {
        match self {
            Self::Skipped(reading) => *reading,
            Self::Reported { reading, .. } => *reading,
            Self::ReportFailed { reading, .. } => *reading,
        }
    }
}
