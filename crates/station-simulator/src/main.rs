//! Desktop simulator for the weather station node.
//!
//! Runs one duty cycle with station-core against synthetic sensor and battery
//! values. The POST goes over a real TCP connection, so a local endpoint can
//! be tested without flashing a board.
//!
//! ```text
//! station-simulator [config.json]
//! ```
//!
//! The optional argument is a JSON rendering of `station_core::Config`;
//! without it the defaults are used (`localhost:80`, path `/`).
//! `SIM_RAW_VOLTAGE` overrides the battery reading in raw counts and
//! `SIM_JOIN_POLLS` sets how many connectivity polls the fake link needs.

use std::io::{self, Read as _, Write as _};
use std::net::{TcpStream, ToSocketAddrs, UdpSocket};
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType};
use log::{debug, error, info, warn};

use station_core::config::{TimeSyncConfig, WifiConfig};
use station_core::error::{NetworkError, SensorError, TransmitError};
use station_core::http::{self, HttpRequest};
use station_core::sntp;
use station_core::traits::{BatteryProbe, EnvironmentSensor, HttpTransport, TimeSource, WifiLink};
use station_core::{
    Capabilities, Config, CycleOutcome, DeviceId, DutyCycle, EnvironmentReading, FirmwareVersion,
    PowerAction,
};

const IO_TIMEOUT: Duration = Duration::from_secs(10);
const NTP_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_JOIN_POLLS: u32 = 2;

/// Fixed id so simulated records are easy to tell apart on the server.
const SIMULATOR_DEVICE_ID: DeviceId = DeviceId(0x5151_0001);

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Link that comes up after a fixed number of polls.
struct SimulatedLink {
    polls_needed: u32,
    polls: u32,
}

impl WifiLink for SimulatedLink {
    async fn begin(&mut self, config: &WifiConfig<'_>) -> Result<(), NetworkError> {
        info!("Simulated association with \"{}\"", config.ssid);
        self.polls = 0;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.polls += 1;
        self.polls > self.polls_needed
    }

    async fn disconnect(&mut self) {
        info!("Simulated link down");
    }
}

/// Generates plausible readings that drift with the time of day.
struct SyntheticSensor {
    seconds: u64,
}

impl EnvironmentSensor for SyntheticSensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn measure(&mut self) -> Result<EnvironmentReading, SensorError> {
        let day_fraction = (self.seconds % 86_400) as f32 / 86_400.0;
        let phase = (day_fraction * core::f32::consts::TAU).sin();

        Ok(EnvironmentReading::from_pascals(
            18.0 + 4.0 * phase,
            55.0 - 10.0 * phase,
            101_325.0 + 150.0 * phase,
        ))
    }
}

struct SimulatedBattery {
    raw: u16,
}

impl BatteryProbe for SimulatedBattery {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        Ok(self.raw)
    }
}

/// Blocking `std` socket behind the async traits; the executor only ever
/// drives one future, so blocking is fine.
struct StdConnection(TcpStream);

fn kind(error: io::Error) -> ErrorKind {
    match error.kind() {
        io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
        io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::TimedOut,
        io::ErrorKind::Interrupted => ErrorKind::Interrupted,
        _ => ErrorKind::Other,
    }
}

impl ErrorType for StdConnection {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for StdConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.read(buf).map_err(kind)
    }
}

impl embedded_io_async::Write for StdConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.write(buf).map_err(kind)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush().map_err(kind)
    }
}

struct TcpTransport;

impl HttpTransport for TcpTransport {
    async fn post(&mut self, request: &HttpRequest<'_>) -> Result<u16, TransmitError> {
        if request.tls {
            error!("The simulator speaks plain HTTP only");
            return Err(TransmitError::TlsUnavailable);
        }

        let address = (request.host, request.port)
            .to_socket_addrs()
            .map_err(|_| TransmitError::Dns)?
            .next()
            .ok_or(TransmitError::Dns)?;
        debug!("Resolved {} to {}", request.host, address);

        let stream = TcpStream::connect_timeout(&address, IO_TIMEOUT).map_err(|e| {
            error!("Connecting to {} failed: {}", address, e);
            TransmitError::Connect
        })?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .map_err(|_| TransmitError::Connect)?;

        let mut connection = StdConnection(stream);
        http::exchange(&mut connection, request).await
    }
}

/// One SNTP query over a blocking UDP socket.
struct UdpClock;

impl TimeSource for UdpClock {
    async fn sync(&mut self, config: &TimeSyncConfig<'_>) -> Result<u64, NetworkError> {
        let server = (config.server, sntp::NTP_PORT)
            .to_socket_addrs()
            .map_err(|_| NetworkError::Dns)?
            .find(|address| address.is_ipv4())
            .ok_or(NetworkError::Dns)?;

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|_| NetworkError::Socket)?;
        socket
            .set_read_timeout(Some(NTP_TIMEOUT))
            .map_err(|_| NetworkError::Socket)?;
        socket
            .send_to(&sntp::request_packet(), server)
            .map_err(|_| NetworkError::Socket)?;

        let mut response = [0u8; sntp::NTP_PACKET_LEN];
        let (len, from) = socket.recv_from(&mut response).map_err(|e| match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => NetworkError::Timeout,
            _ => NetworkError::Socket,
        })?;
        if from.ip() != server.ip() {
            return Err(NetworkError::InvalidResponse);
        }

        sntp::parse_response(&response[..len])
    }
}

struct ThreadDelay;

impl DelayNs for ThreadDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring {}={:?}, not a number", name, value);
            None
        }
    }
}

fn firmware_version() -> FirmwareVersion {
    let part = |s: &str| s.parse().unwrap_or(0);
    FirmwareVersion::new(
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH")),
        cfg!(debug_assertions),
    )
}

fn main() -> ExitCode {
    env_logger::init();
    info!("Starting weather station simulator");

    let text = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Could not read {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };
    let config: Config<'_> = match text.as_deref().map(serde_json::from_str).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let battery = config.battery;
    let raw = env_number("SIM_RAW_VOLTAGE")
        .unwrap_or(battery.min_raw + battery.max_raw.saturating_sub(battery.min_raw) / 2);
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let capabilities = Capabilities {
        link: SimulatedLink {
            polls_needed: env_number("SIM_JOIN_POLLS").unwrap_or(DEFAULT_JOIN_POLLS),
            polls: 0,
        },
        sensor: SyntheticSensor { seconds },
        battery: SimulatedBattery { raw },
        transport: TcpTransport,
        clock: UdpClock,
        delay: ThreadDelay,
    };

    let report = block_on(DutyCycle::new(&config, SIMULATOR_DEVICE_ID, firmware_version()).run(capabilities));

    info!(
        "Cycle finished after {} join polls: {:?}",
        report.join_attempts, report.outcome
    );
    if let Some(unix_time) = report.unix_time {
        info!("Network time: {}", unix_time);
    }
    match report.action {
        PowerAction::DeepSleep { seconds } => info!("Node would now deep sleep for {}s", seconds),
        PowerAction::Restart { delay_ms } => info!("Node would restart in {}ms", delay_ms),
        PowerAction::Reset => info!("Node would reset"),
    }

    match report.outcome {
        CycleOutcome::Transmitted { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
