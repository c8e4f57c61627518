#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;

use levelmon::{
    config::RetryPolicy,
    model::Reading,
    network::{self, HttpReporter, WifiCredentials},
    traits::ReportSink,
};

const WIFI_CREDENTIALS: WifiCredentials<'static> = WifiCredentials {
    ssid: env!("LEVELMON_WIFI_SSID"),
    password: env!("LEVELMON_WIFI_PASSWORD"),
};
const REPORT_ENDPOINT: &str = env!("LEVELMON_ENDPOINT");

// Give up quickly instead of hanging the smoke test
const RETRY: RetryPolicy = RetryPolicy {
    max_attempts: Some(5),
    initial_delay_ms: 1_000,
    max_delay_ms: 8_000,
    backoff_factor: 2,
};

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    esp_println::println!("=== Wi-Fi Report Test ===");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let (mut controller, stack) = match network::start_network(&spawner, peripherals.WIFI) {
        Ok(parts) => parts,
        Err(e) => {
            esp_println::println!("[ERROR] Network init failed: {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    let connected = network::connect_wifi(&mut controller, stack, &WIFI_CREDENTIALS, &RETRY).await;
    if let Err(e) = connected {
        esp_println::println!("[ERROR] Wi-Fi connect failed: {}", e);
    }

    let mut reporter = HttpReporter::new(connected.ok().map(|_| stack), REPORT_ENDPOINT);
    let reading = Reading {
        level: 12.34,
        voltage: 3.70,
    };

    match reporter.send(&reading).await {
        Ok(status) => esp_println::println!("[TEST] POST answered with status {}", status),
        Err(e) => esp_println::println!("[TEST] POST failed: {}", e),
    }

    network::stop_wifi(&mut controller).await;
    esp_println::println!("\nTest run complete. Looping...");
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}
