//! Business logic layer (hardware-independent)

use crate::config::{BatteryCalibration, CycleConfig, HysteresisConfig};
use crate::model::{CycleOutcome, NEVER_REPORTED, PreviousReading, Reading};
use crate::traits::{BatterySense, RangeSensor, ReportSink};

/// Speed of sound at ~20°C
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Convert an echo high time to a one-way distance
pub fn distance_from_pulse(duration_us: u32) -> f32 {
    (duration_us as f32 * SPEED_OF_SOUND_CM_PER_US) / 2.0
}

/// Convert a raw ADC sample to battery volts
pub fn voltage_from_raw(raw: u16, calibration: &BatteryCalibration) -> f32 {
    raw as f32 * (calibration.reference_voltage / calibration.adc_max) * calibration.divider_factor
}

/// Whether `current` moved far enough from `previous` to be worth reporting.
///
/// Always true when nothing was reported yet. The bound is inclusive.
pub fn should_report(current: f32, previous: f32, threshold: f32) -> bool {
    if previous == NEVER_REPORTED {
        return true;
    }
    (current - previous).abs() >= threshold
}

/// Either metric crossing its own threshold triggers a report
pub fn should_send(
    current: &Reading,
    previous: &PreviousReading,
    hysteresis: &HysteresisConfig,
) -> bool {
    let level = should_report(current.level, previous.level, hysteresis.level);
    let voltage = should_report(current.voltage, previous.voltage, hysteresis.voltage);
    level || voltage
}

/// Measure both metrics once
pub fn take_reading<S: RangeSensor, B: BatterySense>(
    sensor: &mut S,
    battery: &mut B,
    config: &CycleConfig,
) -> Reading {
    let duration = sensor.measure_pulse_duration(config.echo_timeout_us);
    let level = distance_from_pulse(duration);
    esp_println::println!("[HCSR04] Echo {} us -> {:.2} cm", duration, level);

    let raw = match battery.read_raw() {
        Ok(raw) => raw,
        Err(e) => {
            esp_println::println!("[ERROR] Battery read failed: {}", e);
            0
        }
    };
    let voltage = voltage_from_raw(raw, &config.calibration);
    esp_println::println!("[BATTERY] Raw {} -> {:.2} V", raw, voltage);

    Reading { level, voltage }
}

/// One SENSE -> DECIDE -> REPORT|SKIP pass.
///
/// `previous` is only updated when the server answered.
pub async fn run_cycle<S, B, R>(
    sensor: &mut S,
    battery: &mut B,
    reporter: &mut R,
    previous: &mut PreviousReading,
    config: &CycleConfig,
) -> CycleOutcome
where
    S: RangeSensor,
    B: BatterySense,
    R: ReportSink,
{
    let reading = take_reading(sensor, battery, config);

    if !should_send(&reading, previous, &config.hysteresis) {
        esp_println::println!("[CYCLE] No significant change detected, skipping data send.");
        return CycleOutcome::Skipped(reading);
    }

    esp_println::println!("[CYCLE] Significant change detected, sending data...");
    match reporter.send(&reading).await {
        Ok(status) => {
            previous.record(&reading);
            CycleOutcome::Reported { reading, status }
        }
        Err(error) => {
            esp_println::println!("[ERROR] Error on sending POST: {}", error);
            CycleOutcome::ReportFailed { reading, error }
        }
    }
}
