//! Renders the station configuration into `$OUT_DIR/station_config.rs`.
//!
//! Values come from `STATION_*` environment variables, optionally loaded from
//! a `.env` file next to this crate. Anything unset falls back to the
//! defaults of the reference station.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

const VARIABLES: &[&str] = &[
    "STATION_WIFI_SSID",
    "STATION_WIFI_PASSWORD",
    "STATION_WIFI_CHANNEL",
    "STATION_WIFI_HOSTNAME",
    "STATION_WIFI_MAX_TRIES",
    "STATION_WIFI_RETRY_DELAY_MS",
    "STATION_ENDPOINT_HOST",
    "STATION_ENDPOINT_PORT",
    "STATION_ENDPOINT_PATH",
    "STATION_ENDPOINT_TLS",
    "STATION_USER_AGENT",
    "STATION_EXPECTED_STATUS",
    "STATION_MIN_RAW_VOLTAGE",
    "STATION_MAX_RAW_VOLTAGE",
    "STATION_BME280_ADDRESS",
    "STATION_TIME_SYNC",
    "STATION_NTP_SERVER",
    "STATION_NTP_MAX_ATTEMPTS",
    "STATION_NTP_RETRY_DELAY_MS",
    "STATION_SLEEP_SECONDS",
    "STATION_RESTART_DELAY_MS",
];

fn main() {
    println!("cargo:rustc-link-arg=-Tlinkall.x");
    println!("cargo:rerun-if-changed=.env");
    for variable in VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // A missing .env is fine, the environment may carry everything.
    let _ = dotenvy::dotenv();

    let ssid = text("STATION_WIFI_SSID", "");
    if ssid.is_empty() {
        println!("cargo:warning=STATION_WIFI_SSID is not set, the station will never join a network");
    }

    let tls = flag("STATION_ENDPOINT_TLS", false);
    if tls && env::var_os("CARGO_FEATURE_TLS").is_none() {
        println!("cargo:warning=STATION_ENDPOINT_TLS is set but the `tls` feature is disabled");
    }

    let min_raw: u16 = number("STATION_MIN_RAW_VOLTAGE", 605);
    let max_raw: u16 = number("STATION_MAX_RAW_VOLTAGE", 814);
    if min_raw >= max_raw {
        panic!("STATION_MIN_RAW_VOLTAGE ({min_raw}) must be below STATION_MAX_RAW_VOLTAGE ({max_raw})");
    }

    let sleep = match env::var("STATION_RESTART_DELAY_MS") {
        Ok(_) => format!(
            "SleepMode::Restart {{ delay_ms: {} }}",
            number::<u32>("STATION_RESTART_DELAY_MS", 0)
        ),
        Err(_) => format!(
            "SleepMode::DeepSleep {{ seconds: {} }}",
            number::<u32>("STATION_SLEEP_SECONDS", 900)
        ),
    };

    let mut out = String::new();
    writeln!(out, "pub const CONFIG: Config<'static> = Config {{").unwrap();
    writeln!(out, "    wifi: WifiConfig {{").unwrap();
    writeln!(out, "        ssid: {ssid:?},").unwrap();
    writeln!(out, "        password: {:?},", text("STATION_WIFI_PASSWORD", "")).unwrap();
    writeln!(out, "        channel: {},", number::<u8>("STATION_WIFI_CHANNEL", 6)).unwrap();
    writeln!(out, "        hostname: {:?},", text("STATION_WIFI_HOSTNAME", "weather-station")).unwrap();
    writeln!(out, "        max_connection_tries: {},", number::<u8>("STATION_WIFI_MAX_TRIES", 20)).unwrap();
    writeln!(out, "        retry_delay_ms: {},", number::<u32>("STATION_WIFI_RETRY_DELAY_MS", 500)).unwrap();
    writeln!(out, "    }},").unwrap();
    writeln!(out, "    endpoint: EndpointConfig {{").unwrap();
    writeln!(out, "        host: {:?},", text("STATION_ENDPOINT_HOST", "localhost")).unwrap();
    writeln!(out, "        port: {},", number::<u16>("STATION_ENDPOINT_PORT", if tls { 443 } else { 80 })).unwrap();
    writeln!(out, "        path: {:?},", text("STATION_ENDPOINT_PATH", "/")).unwrap();
    writeln!(out, "        tls: {tls},").unwrap();
    writeln!(out, "        user_agent: {:?},", text("STATION_USER_AGENT", "WeatherStation/BA188")).unwrap();
    writeln!(out, "        expected_status: {},", number::<u16>("STATION_EXPECTED_STATUS", 204)).unwrap();
    writeln!(out, "    }},").unwrap();
    writeln!(out, "    battery: BatteryCalibration {{ min_raw: {min_raw}, max_raw: {max_raw} }},").unwrap();
    writeln!(out, "    sensor: SensorConfig {{ address: {} }},", address("STATION_BME280_ADDRESS", 0x76)).unwrap();
    writeln!(out, "    time_sync: TimeSyncConfig {{").unwrap();
    writeln!(out, "        enabled: {},", flag("STATION_TIME_SYNC", false)).unwrap();
    writeln!(out, "        server: {:?},", text("STATION_NTP_SERVER", "pool.ntp.org")).unwrap();
    writeln!(out, "        max_attempts: {},", number::<u8>("STATION_NTP_MAX_ATTEMPTS", 10)).unwrap();
    writeln!(out, "        retry_delay_ms: {},", number::<u32>("STATION_NTP_RETRY_DELAY_MS", 500)).unwrap();
    writeln!(out, "    }},").unwrap();
    writeln!(out, "    sleep: {sleep},").unwrap();
    writeln!(out, "    debug: cfg!(debug_assertions),").unwrap();
    writeln!(out, "}};").unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "pub const FIRMWARE_VERSION: FirmwareVersion = FirmwareVersion::new({}, {}, {}, cfg!(debug_assertions));",
        number::<u8>("CARGO_PKG_VERSION_MAJOR", 0),
        number::<u8>("CARGO_PKG_VERSION_MINOR", 0),
        number::<u8>("CARGO_PKG_VERSION_PATCH", 0),
    )
    .unwrap();

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::write(out_dir.join("station_config.rs"), out).expect("failed to write station_config.rs");
}

fn text(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn number<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name}={value:?} is not a valid number")),
        Err(_) => default,
    }
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name).as_deref().map(str::trim) {
        Ok("1" | "true" | "yes" | "on") => true,
        Ok("0" | "false" | "no" | "off" | "") => false,
        Ok(value) => panic!("{name}={value:?} is not a valid flag"),
        Err(_) => default,
    }
}

/// Accepts `0x76` as well as `118`. Only the two BME280 straps are allowed.
fn address(name: &str, default: u8) -> u8 {
    match env::var(name) {
        Ok(value) => {
            let value = value.trim();
            let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => value.parse(),
            };
            match parsed {
                Ok(address @ (0x76 | 0x77)) => address,
                Ok(_) => panic!("{name}={value:?} must be 0x76 or 0x77"),
                Err(_) => panic!("{name}={value:?} is not a valid I2C address"),
            }
        }
        Err(_) => default,
    }
}
