//! Hardware abstraction traits

use crate::error::ReportError;
use crate::model::Reading;

/// Trait for ultrasonic ranging sensors
pub trait RangeSensor {
    /// Fire a trigger pulse and return the echo high time in microseconds.
    ///
    /// Returns 0 when no echo completes within `timeout_us`.
    fn measure_pulse_duration(&mut self, timeout_us: u32) -> u32;
}

/// Trait for the battery sense input
pub trait BatterySense {
    /// Read one raw ADC sample
    fn read_raw(&mut self) -> Result<u16, &'static str>;
}

/// Trait for the report transport
#[allow(async_fn_in_trait)]
pub trait ReportSink {
    /// Send the reading, returning the HTTP status the server answered with
    async fn send(&mut self, reading: &Reading) -> Result<u16, ReportError>;
}

/// Trait for the power controller
pub trait DeepSleep {
    /// Suspend the chip; it reboots when the timer fires
    fn deep_sleep(&mut self, duration_us: u64) -> !;
}
