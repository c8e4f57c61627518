//! Compiled-in configuration
//!
//! Fixed pins (not runtime configurable):
//! - GPIO5 => HC-SR04 TRIG (output)
//! - GPIO6 => HC-SR04 ECHO (input)
//! - GPIO4 => battery sense divider (ADC1)

/// Minimum absolute change per metric before a reading is reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisConfig {
    /// Centimeters
    pub level: f32,
    /// Volts
    pub voltage: f32,
}

/// Linear ADC-to-volts scale for the battery divider on a given board
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryCalibration {
    /// Voltage at full ADC scale
    pub reference_voltage: f32,
    /// Largest raw sample the ADC produces
    pub adc_max: f32,
    /// Divider ratio between battery and ADC pin
    pub divider_factor: f32,
}

/// Wi-Fi connect retry policy
///
/// `max_attempts: None` keeps trying forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    /// Poll once a second until connected, never give up.
    pub const BLOCK_FOREVER: Self = Self {
        max_attempts: None,
        initial_delay_ms: 1_000,
        max_delay_ms: 1_000,
        backoff_factor: 1,
    };

    /// Whether attempt number `attempt` (1-based) may run
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt <= max,
            None => true,
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures
    pub fn delay_ms(&self, failures: u32) -> u64 {
        let mut delay = self.initial_delay_ms;
        for _ in 1..failures {
            delay = delay.saturating_mul(self.backoff_factor as u64);
            if delay >= self.max_delay_ms {
                break;
            }
        }
        delay.min(self.max_delay_ms)
    }
}

/// Everything the measure/decide/report pass needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleConfig {
    pub hysteresis: HysteresisConfig,
    pub calibration: BatteryCalibration,
    pub echo_timeout_us: u32,
}

pub const HYSTERESIS: HysteresisConfig = HysteresisConfig {
    level: 2.0,
    voltage: 0.1,
};

// ADC1 at 11dB attenuation, 12-bit, 2:1 divider on the battery line
pub const BATTERY_CALIBRATION: BatteryCalibration = BatteryCalibration {
    reference_voltage: 3.1,
    adc_max: 4095.0,
    divider_factor: 2.0,
};

/// Echo capture budget per phase
pub const ECHO_TIMEOUT_US: u32 = 1_000_000;

pub const CYCLE: CycleConfig = CycleConfig {
    hysteresis: HYSTERESIS,
    calibration: BATTERY_CALIBRATION,
    echo_timeout_us: ECHO_TIMEOUT_US,
};

pub const WIFI_RETRY: RetryPolicy = RetryPolicy::BLOCK_FOREVER;

/// Only enforced when `WIFI_RETRY` is bounded
pub const DHCP_TIMEOUT_SECS: u64 = 15;

pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// 1 hour
pub const SLEEP_DURATION_US: u64 = 3_600 * 1_000_000;
