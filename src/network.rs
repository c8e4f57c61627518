//! Wi-Fi bring-up and the HTTP reporter

use core::net::Ipv4Addr;

use embassy_executor::Spawner;
use embassy_net::{IpAddress, Runner, Stack, StackResources, dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::{Duration, Timer, WithTimeout};
use embedded_io_async::Write;
use esp_hal::{peripherals::WIFI, rng::Rng};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use static_cell::StaticCell;

use crate::config::{DHCP_TIMEOUT_SECS, HTTP_TIMEOUT_SECS, RetryPolicy};
use crate::error::ReportError;
use crate::http::{self, Endpoint};
use crate::model::Reading;
use crate::payload::{self, MAX_PAYLOAD_LEN};
use crate::traits::ReportSink;

const SOCKET_BUFFER_LEN: usize = 1024;
const RESPONSE_LEN: usize = 1024;

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

/// SSID/password pair injected at build time
#[derive(Debug, Clone, Copy)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Bring up the radio and a DHCP network stack, spawning the stack runner
pub fn start_network(
    spawner: &Spawner,
    wifi: WIFI<'static>,
) -> Result<(WifiController<'static>, Stack<'static>), &'static str> {
    let radio = esp_radio::init().map_err(|_| "Failed to initialize radio")?;
    let radio = RADIO.init(radio);

    let (controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
        .map_err(|_| "Failed to create Wi-Fi driver")?;

    let rng = Rng::new();
    let seed = ((rng.random() as u64) << 32) | rng.random() as u64;

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::<3>::new()),
        seed,
    );

    spawner
        .spawn(net_task(runner))
        .map_err(|_| "Failed to spawn network task")?;

    Ok((controller, stack))
}

/// Join the access point and wait for an IPv4 lease.
///
/// With an unbounded policy this only returns once connected.
pub async fn connect_wifi(
    controller: &mut WifiController<'_>,
    stack: Stack<'_>,
    credentials: &WifiCredentials<'_>,
    policy: &RetryPolicy,
) -> Result<(), &'static str> {
    esp_println::println!("[WIFI] Connecting to Wi-Fi...");

    let client = ClientConfig::default()
        .with_ssid(credentials.ssid.into())
        .with_password(credentials.password.into());
    controller
        .set_config(&ModeConfig::Client(client))
        .map_err(|_| "Failed to configure Wi-Fi")?;

    let mut attempt = 1;
    loop {
        match try_connect(controller, stack, policy).await {
            Ok(()) => {
                match stack.config_v4() {
                    Some(config) => {
                        esp_println::println!("[WIFI] Connected to Wi-Fi, IP {}", config.address)
                    }
                    None => esp_println::println!("[WIFI] Connected to Wi-Fi"),
                }
                return Ok(());
            }
            Err(e) => esp_println::println!("[WIFI] Connecting... ({}, attempt {})", e, attempt),
        }

        if !policy.allows_attempt(attempt.saturating_add(1)) {
            return Err("Wi-Fi retry budget exhausted");
        }
        Timer::after(Duration::from_millis(policy.delay_ms(attempt))).await;
        attempt = attempt.saturating_add(1);
    }
}

async fn try_connect(
    controller: &mut WifiController<'_>,
    stack: Stack<'_>,
    policy: &RetryPolicy,
) -> Result<(), &'static str> {
    if !controller.is_started().unwrap_or(false) {
        controller
            .start_async()
            .await
            .map_err(|_| "Wi-Fi start failed")?;
    }

    if controller.connect_async().await.is_err() {
        let _ = controller.disconnect_async().await;
        return Err("association failed");
    }

    if policy.max_attempts.is_none() {
        stack.wait_config_up().await;
        return Ok(());
    }

    if stack
        .wait_config_up()
        .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
        .await
        .is_err()
    {
        let _ = controller.disconnect_async().await;
        return Err("DHCP timeout");
    }
    Ok(())
}

/// Power the radio down before sleeping
pub async fn stop_wifi(controller: &mut WifiController<'_>) {
    if let Err(e) = controller.stop_async().await {
        esp_println::println!("[WIFI] Stop failed: {:?}", e);
    }
}

async fn resolve(stack: Stack<'_>, host: &str) -> Result<IpAddress, ReportError> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(IpAddress::Ipv4(ip));
    }

    let addresses = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|_| ReportError::Dns)?;
    addresses.first().copied().ok_or(ReportError::Dns)
}

/// POSTs readings as JSON to a fixed endpoint
pub struct HttpReporter<'a> {
    stack: Option<Stack<'a>>,
    endpoint: &'a str,
}

impl<'a> HttpReporter<'a> {
    /// `stack` is `None` when the radio never came up
    pub fn new(stack: Option<Stack<'a>>, endpoint: &'a str) -> Self {
        Self { stack, endpoint }
    }
}

impl ReportSink for HttpReporter<'_> {
    async fn send(&mut self, reading: &Reading) -> Result<u16, ReportError> {
        let stack = match self.stack {
            Some(stack) if stack.is_link_up() && stack.is_config_up() => stack,
            _ => return Err(ReportError::NotConnected),
        };

        let endpoint = Endpoint::parse(self.endpoint)?;
        let address = resolve(stack, endpoint.host).await?;

        let mut body = [0u8; MAX_PAYLOAD_LEN];
        let body_len =
            payload::encode(reading, &mut body).map_err(|_| ReportError::RequestTooLarge)?;
        let body =
            core::str::from_utf8(&body[..body_len]).map_err(|_| ReportError::RequestTooLarge)?;
        let request = http::build_post(&endpoint, body)?;

        esp_println::println!(
            "[HTTP] POST http://{}:{}{} {}",
            endpoint.host,
            endpoint.port,
            endpoint.path,
            body
        );

        let mut rx_buffer = [0u8; SOCKET_BUFFER_LEN];
        let mut tx_buffer = [0u8; SOCKET_BUFFER_LEN];
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)));

        socket
            .connect((address, endpoint.port))
            .await
            .map_err(|_| ReportError::Connect)?;

        if socket.write_all(request.as_bytes()).await.is_err() || socket.flush().await.is_err() {
            socket.abort();
            return Err(ReportError::Write);
        }

        let mut response = [0u8; RESPONSE_LEN];
        let mut len = 0;
        while len < response.len() {
            match socket.read(&mut response[len..]).await {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(_) => {
                    socket.abort();
                    return Err(ReportError::Read);
                }
            }
        }
        socket.close();

        let response = &response[..len];
        let status = http::parse_status(response).ok_or(ReportError::MalformedResponse)?;
        esp_println::println!("[HTTP] Status: {}", status);
        match core::str::from_utf8(http::response_body(response)) {
            Ok(text) => esp_println::println!("[HTTP] Response: {}", text),
            Err(_) => esp_println::println!("[HTTP] Response: <{} bytes>", response.len()),
        }

        Ok(status)
    }
}
