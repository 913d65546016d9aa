//! One wake of the node
//!
//! ```text
//! JoinNetwork -> [SyncTime] -> Acquire -> Gate -> BuildPayload -> Transmit -> Teardown -> Sleep
//!      |                          |          |                                   ^
//!      |                          +----------+-----------------------------------+
//!      +------------------------------------------------------------------> Teardown -> Reset
//! ```
//!
//! Every wake starts at `JoinNetwork` and the controller hands back a
//! [`PowerAction`]; nothing is kept for the next wake. Gate failures skip the
//! payload and the POST but never the teardown.

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::battery::ChargeEstimator;
use crate::config::{Config, SleepMode};
use crate::error::{SensorError, TransmitError};
use crate::http::HttpRequest;
use crate::measurement::{DeviceId, EnvironmentReading, FirmwareVersion, Measurement};
use crate::payload::Payload;
use crate::traits::{BatteryProbe, EnvironmentSensor, HttpTransport, TimeSource, WifiLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    JoinNetwork,
    SyncTime,
    Acquire,
    Gate,
    BuildPayload,
    Transmit,
    Teardown,
    Sleep,
}

/// What happened during the cycle. Only `ConnectivityLost` changes what the
/// node does next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// The server answered with the expected status.
    Transmitted { status: u16 },
    /// The server answered with any other status. Not retried.
    Rejected { status: u16 },
    TransmitFailed(TransmitError),
    SensorUnavailable(SensorError),
    /// The supply was at or below the lower calibration bound.
    UnderVoltage { raw: u16 },
    ConnectivityLost { attempts: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    DeepSleep { seconds: u32 },
    Restart { delay_ms: u32 },
    /// Full chip reset, the next boot starts over with a fresh join.
    Reset,
}

impl From<SleepMode> for PowerAction {
    fn from(mode: SleepMode) -> Self {
        match mode {
            SleepMode::DeepSleep { seconds } => Self::DeepSleep { seconds },
            SleepMode::Restart { delay_ms } => Self::Restart { delay_ms },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub action: PowerAction,
    /// Connectivity polls until the link came up.
    pub join_attempts: u16,
    pub unix_time: Option<u64>,
    pub measurement: Option<Measurement>,
}

/// Hardware handles for one cycle.
pub struct Capabilities<L, S, B, H, T, D> {
    pub link: L,
    pub sensor: S,
    pub battery: B,
    pub transport: H,
    pub clock: T,
    pub delay: D,
}

pub struct DutyCycle<'a> {
    config: &'a Config<'a>,
    device_id: DeviceId,
    firmware_version: FirmwareVersion,
    estimator: ChargeEstimator,
    state: CycleState,
}

impl<'a> DutyCycle<'a> {
    pub fn new(config: &'a Config<'a>, device_id: DeviceId, firmware_version: FirmwareVersion) -> Self {
        Self {
            config,
            device_id,
            firmware_version,
            estimator: ChargeEstimator::from_calibration(&config.battery),
            state: CycleState::JoinNetwork,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn enter(&mut self, state: CycleState) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Runs the whole cycle and consumes the capabilities.
    pub async fn run<L, S, B, H, T, D>(mut self, capabilities: Capabilities<L, S, B, H, T, D>) -> CycleReport
    where
        L: WifiLink,
        S: EnvironmentSensor,
        B: BatteryProbe,
        H: HttpTransport,
        T: TimeSource,
        D: DelayNs,
    {
        let Capabilities {
            mut link,
            mut sensor,
            mut battery,
            mut transport,
            mut clock,
            mut delay,
        } = capabilities;

        let join_attempts = match self.join(&mut link, &mut delay).await {
            Ok(attempts) => attempts,
            Err(attempts) => {
                error!("WiFi not connected after {} tries, resetting", attempts);
                self.teardown(&mut link).await;
                return CycleReport {
                    outcome: CycleOutcome::ConnectivityLost { attempts },
                    action: PowerAction::Reset,
                    join_attempts: attempts,
                    unix_time: None,
                    measurement: None,
                };
            }
        };
        info!("Connected to the WiFi after {} tries", join_attempts);

        let unix_time = if self.config.time_sync.enabled {
            self.sync_time(&mut clock, &mut delay).await
        } else {
            None
        };

        let (outcome, measurement) = self
            .measure_and_send(&mut sensor, &mut battery, &mut transport)
            .await;

        self.teardown(&mut link).await;

        let action = PowerAction::from(self.config.sleep);
        self.enter(CycleState::Sleep);
        match action {
            PowerAction::DeepSleep { seconds } => info!("Going to sleep for {} seconds now", seconds),
            PowerAction::Restart { delay_ms } => info!("Restarting in {} ms", delay_ms),
            PowerAction::Reset => {}
        }

        CycleReport {
            outcome,
            action,
            join_attempts,
            unix_time,
            measurement,
        }
    }

    /// Starts the association and polls until the link is up. `Err` carries
    /// the number of tries once they exceed the configured maximum.
    async fn join<L: WifiLink, D: DelayNs>(&mut self, link: &mut L, delay: &mut D) -> Result<u16, u16> {
        self.enter(CycleState::JoinNetwork);
        let wifi = &self.config.wifi;

        if let Err(e) = link.begin(wifi).await {
            error!("Could not start WiFi association: {}", e);
            return Err(0);
        }

        let max_tries = u16::from(wifi.max_connection_tries);
        let mut tries: u16 = 0;
        while !link.is_connected() {
            tries += 1;
            delay.delay_ms(wifi.retry_delay_ms).await;
            debug!("Waiting for WiFi, try {}", tries);
            if tries > max_tries {
                return Err(tries);
            }
        }

        Ok(tries)
    }

    async fn sync_time<T: TimeSource, D: DelayNs>(&mut self, clock: &mut T, delay: &mut D) -> Option<u64> {
        self.enter(CycleState::SyncTime);
        let time_sync = &self.config.time_sync;

        for attempt in 1..=time_sync.max_attempts {
            match clock.sync(time_sync).await {
                Ok(unix_time) => {
                    info!("Time synchronized: {} (attempt {})", unix_time, attempt);
                    return Some(unix_time);
                }
                Err(e) => {
                    debug!("Time sync attempt {} failed: {}", attempt, e);
                    if attempt < time_sync.max_attempts {
                        delay.delay_ms(time_sync.retry_delay_ms).await;
                    }
                }
            }
        }

        warn!("Time sync gave up after {} attempts", time_sync.max_attempts);
        None
    }

    async fn measure_and_send<S, B, H>(
        &mut self,
        sensor: &mut S,
        battery: &mut B,
        transport: &mut H,
    ) -> (CycleOutcome, Option<Measurement>)
    where
        S: EnvironmentSensor,
        B: BatteryProbe,
        H: HttpTransport,
    {
        self.enter(CycleState::Acquire);
        let (environment, raw) = match acquire(sensor, battery).await {
            Ok(values) => values,
            Err(e) => {
                warn!("Sensor unavailable, skipping this cycle: {}", e);
                return (CycleOutcome::SensorUnavailable(e), None);
            }
        };

        // Readings taken under a too low supply voltage are not trustworthy.
        self.enter(CycleState::Gate);
        let raw_voltage = f32::from(raw);
        if !self.estimator.is_sufficient(raw_voltage) {
            warn!(
                "Not sending measurement, raw voltage {} at or below {}",
                raw, self.config.battery.min_raw
            );
            return (CycleOutcome::UnderVoltage { raw }, None);
        }

        self.enter(CycleState::BuildPayload);
        let measurement = Measurement {
            environment,
            raw_voltage,
            charge_percent: self.estimator.charge_percent(raw_voltage),
            sensor_id: self.device_id,
            firmware_version: self.firmware_version,
        };
        let body = match Payload::from_measurement(&measurement).to_json() {
            Ok(body) => body,
            Err(_) => return (CycleOutcome::TransmitFailed(TransmitError::Serialize), Some(measurement)),
        };
        debug!("{}", core::str::from_utf8(&body).unwrap_or("<payload>"));

        self.enter(CycleState::Transmit);
        let request = HttpRequest::post_json(&self.config.endpoint, &body);
        let expected = self.config.endpoint.expected_status;
        let outcome = match transport.post(&request).await {
            Ok(status) if status == expected => CycleOutcome::Transmitted { status },
            Ok(status) => {
                warn!("{} - Could not send measurement to endpoint", status);
                CycleOutcome::Rejected { status }
            }
            Err(e) => {
                warn!("Could not send measurement to endpoint: {}", e);
                CycleOutcome::TransmitFailed(e)
            }
        };

        (outcome, Some(measurement))
    }

    async fn teardown<L: WifiLink>(&mut self, link: &mut L) {
        self.enter(CycleState::Teardown);
        link.disconnect().await;
    }
}

async fn acquire<S, B>(sensor: &mut S, battery: &mut B) -> Result<(EnvironmentReading, u16), SensorError>
where
    S: EnvironmentSensor,
    B: BatteryProbe,
{
    sensor.init().await?;
    let environment = sensor.measure().await?;
    if !environment.is_finite() {
        return Err(SensorError::InvalidReading {
            sensor: "environment",
        });
    }
    let raw = battery.read_raw().await?;

    Ok((environment, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatteryCalibration, TimeSyncConfig, WifiConfig};
    use crate::error::NetworkError;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};
    use embassy_futures::block_on;
    use serde_json::Value;

    /// Shared record of everything the mocks were asked to do.
    #[derive(Default)]
    struct Calls {
        begins: Cell<u32>,
        polls: Cell<u32>,
        disconnects: Cell<u32>,
        sensor_inits: Cell<u32>,
        syncs: Cell<u32>,
        posts: Cell<u32>,
        delayed_ms: Cell<u32>,
        requests: RefCell<Vec<(String, u16, String, Vec<u8>)>>,
    }

    struct MockLink<'a> {
        calls: &'a Calls,
        fail_begin: bool,
        /// Polls answered with "down" before the link comes up.
        down_polls: Option<u32>,
    }

    impl WifiLink for MockLink<'_> {
        async fn begin(&mut self, _config: &WifiConfig<'_>) -> Result<(), NetworkError> {
            self.calls.begins.set(self.calls.begins.get() + 1);
            if self.fail_begin { Err(NetworkError::Start) } else { Ok(()) }
        }

        fn is_connected(&mut self) -> bool {
            let polls = self.calls.polls.get();
            self.calls.polls.set(polls + 1);
            self.down_polls.is_some_and(|down| polls >= down)
        }

        async fn disconnect(&mut self) {
            self.calls.disconnects.set(self.calls.disconnects.get() + 1);
        }
    }

    struct MockSensor<'a> {
        calls: &'a Calls,
        init: Result<(), SensorError>,
        reading: Result<EnvironmentReading, SensorError>,
    }

    impl EnvironmentSensor for MockSensor<'_> {
        async fn init(&mut self) -> Result<(), SensorError> {
            self.calls.sensor_inits.set(self.calls.sensor_inits.get() + 1);
            self.init
        }

        async fn measure(&mut self) -> Result<EnvironmentReading, SensorError> {
            self.reading
        }
    }

    struct MockBattery(Result<u16, SensorError>);

    impl BatteryProbe for MockBattery {
        async fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.0
        }
    }

    struct MockTransport<'a> {
        calls: &'a Calls,
        response: Result<u16, TransmitError>,
    }

    impl HttpTransport for MockTransport<'_> {
        async fn post(&mut self, request: &HttpRequest<'_>) -> Result<u16, TransmitError> {
            self.calls.posts.set(self.calls.posts.get() + 1);
            self.calls.requests.borrow_mut().push((
                String::from(request.host),
                request.port,
                String::from(request.path),
                request.body.to_vec(),
            ));
            self.response
        }
    }

    struct MockClock<'a> {
        calls: &'a Calls,
        /// Attempts that fail before one succeeds.
        failures: Option<u32>,
    }

    impl TimeSource for MockClock<'_> {
        async fn sync(&mut self, _config: &TimeSyncConfig<'_>) -> Result<u64, NetworkError> {
            let attempt = self.calls.syncs.get();
            self.calls.syncs.set(attempt + 1);
            match self.failures {
                Some(failures) if attempt >= failures => Ok(1_704_067_200),
                _ => Err(NetworkError::Timeout),
            }
        }
    }

    struct MockDelay<'a>(&'a Calls);

    impl DelayNs for MockDelay<'_> {
        async fn delay_ns(&mut self, _ns: u32) {}

        async fn delay_ms(&mut self, ms: u32) {
            self.0.delayed_ms.set(self.0.delayed_ms.get() + ms);
        }
    }

    struct Scenario {
        fail_begin: bool,
        down_polls: Option<u32>,
        init: Result<(), SensorError>,
        reading: Result<EnvironmentReading, SensorError>,
        raw: Result<u16, SensorError>,
        response: Result<u16, TransmitError>,
        clock_failures: Option<u32>,
    }

    impl Default for Scenario {
        fn default() -> Self {
            Self {
                fail_begin: false,
                down_polls: Some(2),
                init: Ok(()),
                reading: Ok(EnvironmentReading {
                    temperature: 22.5,
                    humidity: 45.0,
                    pressure: 1013.25,
                }),
                raw: Ok(700),
                response: Ok(204),
                clock_failures: Some(0),
            }
        }
    }

    fn config() -> Config<'static> {
        let mut config = Config::default();
        config.battery = BatteryCalibration {
            min_raw: 600,
            max_raw: 800,
        };
        config.endpoint.host = "weather.example.org";
        config.endpoint.port = 8080;
        config.endpoint.path = "/api/measurements";
        config
    }

    fn run(config: &Config<'_>, scenario: Scenario, calls: &Calls) -> CycleReport {
        let capabilities = Capabilities {
            link: MockLink {
                calls,
                fail_begin: scenario.fail_begin,
                down_polls: scenario.down_polls,
            },
            sensor: MockSensor {
                calls,
                init: scenario.init,
                reading: scenario.reading,
            },
            battery: MockBattery(scenario.raw),
            transport: MockTransport {
                calls,
                response: scenario.response,
            },
            clock: MockClock {
                calls,
                failures: scenario.clock_failures,
            },
            delay: MockDelay(calls),
        };
        let cycle = DutyCycle::new(config, DeviceId(0xDEADBEEF), FirmwareVersion::new(1, 2, 3, false));

        block_on(cycle.run(capabilities))
    }

    #[test]
    fn end_to_end_cycle_posts_once() {
        let calls = Calls::default();
        let report = run(&config(), Scenario::default(), &calls);

        assert_eq!(report.outcome, CycleOutcome::Transmitted { status: 204 });
        assert_eq!(report.action, PowerAction::DeepSleep { seconds: 900 });
        assert_eq!(report.join_attempts, 2);
        assert_eq!(report.measurement.map(|m| m.charge_percent), Some(50.0));
        assert_eq!(calls.posts.get(), 1);
        assert_eq!(calls.disconnects.get(), 1);

        let requests = calls.requests.borrow();
        let (host, port, path, body) = &requests[0];
        assert_eq!(host, "weather.example.org");
        assert_eq!(*port, 8080);
        assert_eq!(path, "/api/measurements");

        let value: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value["temperature"].as_f64(), Some(22.5));
        assert_eq!(value["humidity"].as_f64(), Some(45.0));
        assert_eq!(value["pressure"].as_f64(), Some(1013.25));
        assert_eq!(value["raw_voltage"].as_f64(), Some(700.0));
        assert_eq!(value["charge"].as_f64(), Some(50.0));
        assert_eq!(value["sensor"], "DEADBEEF");
        assert_eq!(value["firmware_version"], "1.2.3");
    }

    #[test]
    fn sensor_init_failure_sends_nothing() {
        let calls = Calls::default();
        let failure = SensorError::InitializationFailed {
            sensor: "BME280",
            details: "no device at address",
        };
        let scenario = Scenario {
            init: Err(failure),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.outcome, CycleOutcome::SensorUnavailable(failure));
        assert_eq!(report.action, PowerAction::DeepSleep { seconds: 900 });
        assert_eq!(calls.posts.get(), 0);
        assert_eq!(calls.disconnects.get(), 1);
    }

    #[test]
    fn exhausted_join_resets_without_posting() {
        let calls = Calls::default();
        let scenario = Scenario {
            down_polls: None,
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.action, PowerAction::Reset);
        assert_eq!(report.outcome, CycleOutcome::ConnectivityLost { attempts: 21 });
        assert_eq!(calls.posts.get(), 0);
        assert_eq!(calls.sensor_inits.get(), 0);
        assert_eq!(calls.delayed_ms.get(), 21 * 500);
        assert_eq!(calls.disconnects.get(), 1);
    }

    #[test]
    fn join_on_last_allowed_try_proceeds() {
        let calls = Calls::default();
        let scenario = Scenario {
            down_polls: Some(20),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.join_attempts, 20);
        assert_eq!(report.outcome, CycleOutcome::Transmitted { status: 204 });
    }

    #[test]
    fn failed_association_start_resets() {
        let calls = Calls::default();
        let scenario = Scenario {
            fail_begin: true,
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.action, PowerAction::Reset);
        assert_eq!(calls.polls.get(), 0);
        assert_eq!(calls.posts.get(), 0);
    }

    #[test]
    fn under_voltage_skips_transmission() {
        let calls = Calls::default();
        let scenario = Scenario {
            raw: Ok(600),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.outcome, CycleOutcome::UnderVoltage { raw: 600 });
        assert_eq!(report.action, PowerAction::DeepSleep { seconds: 900 });
        assert_eq!(report.measurement, None);
        assert_eq!(calls.posts.get(), 0);
        assert_eq!(calls.disconnects.get(), 1);
    }

    #[test]
    fn full_battery_reports_full_charge() {
        let calls = Calls::default();
        let scenario = Scenario {
            raw: Ok(1023),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.measurement.map(|m| m.charge_percent), Some(100.0));
    }

    #[test]
    fn non_finite_reading_is_not_sent() {
        let calls = Calls::default();
        let scenario = Scenario {
            reading: Ok(EnvironmentReading {
                temperature: f32::NAN,
                humidity: 45.0,
                pressure: 1013.25,
            }),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert!(matches!(
            report.outcome,
            CycleOutcome::SensorUnavailable(SensorError::InvalidReading { .. })
        ));
        assert_eq!(calls.posts.get(), 0);
    }

    #[test]
    fn battery_read_failure_skips_transmission() {
        let calls = Calls::default();
        let failure = SensorError::ReadFailed {
            sensor: "ADC",
            operation: "read battery divider",
            details: "conversion failed",
        };
        let scenario = Scenario {
            raw: Err(failure),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.outcome, CycleOutcome::SensorUnavailable(failure));
        assert_eq!(calls.posts.get(), 0);
    }

    #[test]
    fn unexpected_status_is_not_retried() {
        let calls = Calls::default();
        let scenario = Scenario {
            response: Ok(500),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.outcome, CycleOutcome::Rejected { status: 500 });
        assert_eq!(report.action, PowerAction::DeepSleep { seconds: 900 });
        assert_eq!(calls.posts.get(), 1);
    }

    #[test]
    fn expected_status_is_configurable() {
        let calls = Calls::default();
        let mut config = config();
        config.endpoint.expected_status = 200;
        let scenario = Scenario {
            response: Ok(200),
            ..Scenario::default()
        };

        let report = run(&config, scenario, &calls);

        assert_eq!(report.outcome, CycleOutcome::Transmitted { status: 200 });
    }

    #[test]
    fn transport_error_is_not_retried() {
        let calls = Calls::default();
        let scenario = Scenario {
            response: Err(TransmitError::Connect),
            ..Scenario::default()
        };

        let report = run(&config(), scenario, &calls);

        assert_eq!(report.outcome, CycleOutcome::TransmitFailed(TransmitError::Connect));
        assert_eq!(calls.posts.get(), 1);
        assert_eq!(calls.disconnects.get(), 1);
    }

    #[test]
    fn restart_mode_is_reported() {
        let calls = Calls::default();
        let mut config = config();
        config.sleep = SleepMode::Restart { delay_ms: 60_000 };

        let report = run(&config, Scenario::default(), &calls);

        assert_eq!(report.action, PowerAction::Restart { delay_ms: 60_000 });
    }

    #[test]
    fn time_sync_is_skipped_when_disabled() {
        let calls = Calls::default();
        let report = run(&config(), Scenario::default(), &calls);

        assert_eq!(calls.syncs.get(), 0);
        assert_eq!(report.unix_time, None);
    }

    #[test]
    fn time_sync_retries_until_success() {
        let calls = Calls::default();
        let mut config = config();
        config.time_sync.enabled = true;
        config.time_sync.max_attempts = 5;
        let scenario = Scenario {
            clock_failures: Some(2),
            ..Scenario::default()
        };

        let report = run(&config, scenario, &calls);

        assert_eq!(calls.syncs.get(), 3);
        assert_eq!(report.unix_time, Some(1_704_067_200));
        assert_eq!(report.outcome, CycleOutcome::Transmitted { status: 204 });
    }

    #[test]
    fn time_sync_failure_does_not_block_transmission() {
        let calls = Calls::default();
        let mut config = config();
        config.time_sync.enabled = true;
        config.time_sync.max_attempts = 3;
        let scenario = Scenario {
            clock_failures: None,
            ..Scenario::default()
        };

        let report = run(&config, scenario, &calls);

        assert_eq!(calls.syncs.get(), 3);
        assert_eq!(report.unix_time, None);
        assert_eq!(calls.posts.get(), 1);
    }

    #[test]
    fn controller_starts_by_joining() {
        let config = config();
        let cycle = DutyCycle::new(&config, DeviceId(1), FirmwareVersion::new(0, 1, 0, true));
        assert_eq!(cycle.state(), CycleState::JoinNetwork);
    }
}
