#![no_std]
#![no_main]

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::{
    rtc_cntl::{reset_reason, wakeup_cause},
    system::Cpu,
    timer::timg::TimerGroup,
};

use levelmon::{
    config::{CYCLE, SLEEP_DURATION_US, WIFI_RETRY},
    hardware::{BatteryHardware, PowerHardware, UltrasonicHardware},
    logic,
    model::{CycleOutcome, PreviousReading},
    network::{self, HttpReporter, WifiCredentials},
    traits::DeepSleep,
};

const WIFI_CREDENTIALS: WifiCredentials<'static> = WifiCredentials {
    ssid: env!("LEVELMON_WIFI_SSID"),
    password: env!("LEVELMON_WIFI_PASSWORD"),
};
const REPORT_ENDPOINT: &str = env!("LEVELMON_ENDPOINT");

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // esp-radio requires an allocator
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    esp_println::println!("=== Levelmon ===");
    esp_println::println!(
        "[BOOT] reset_reason={:?} wakeup_cause={:?}",
        reset_reason(Cpu::ProCpu),
        wakeup_cause()
    );

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut power = PowerHardware::new(peripherals.LPWR);
    let mut sensor = UltrasonicHardware::new(peripherals.GPIO5, peripherals.GPIO6);
    let mut battery = BatteryHardware::new(peripherals.ADC1, peripherals.GPIO4);

    let mut wifi = match network::start_network(&spawner, peripherals.WIFI) {
        Ok(parts) => Some(parts),
        Err(e) => {
            esp_println::println!("[ERROR] Network init failed: {}", e);
            None
        }
    };

    let mut stack = None;
    if let Some((controller, net)) = wifi.as_mut() {
        match network::connect_wifi(controller, *net, &WIFI_CREDENTIALS, &WIFI_RETRY).await {
            Ok(()) => stack = Some(*net),
            Err(e) => esp_println::println!("[ERROR] Wi-Fi connect failed: {}", e),
        }
    }

    // RAM is lost in deep sleep, so every wake starts without a previous report
    let mut previous = PreviousReading::never_reported();
    let mut reporter = HttpReporter::new(stack, REPORT_ENDPOINT);

    let outcome = logic::run_cycle(
        &mut sensor,
        &mut battery,
        &mut reporter,
        &mut previous,
        &CYCLE,
    )
    .await;

    match outcome {
        CycleOutcome::Reported { reading, status } => esp_println::println!(
            "[CYCLE] Reported level={:.2}cm voltage={:.2}V status={}",
            reading.level,
            reading.voltage,
            status
        ),
        CycleOutcome::ReportFailed { reading, error } => esp_println::println!(
            "[CYCLE] Report failed level={:.2}cm voltage={:.2}V: {}",
            reading.level,
            reading.voltage,
            error
        ),
        CycleOutcome::Skipped(reading) => esp_println::println!(
            "[CYCLE] Skipped level={:.2}cm voltage={:.2}V",
            reading.level,
            reading.voltage
        ),
    }

    esp_println::println!("[SLEEP] Going to sleep...");
    if let Some((controller, _)) = wifi.as_mut() {
        network::stop_wifi(controller).await;
    }
    power.deep_sleep(SLEEP_DURATION_US)
}
