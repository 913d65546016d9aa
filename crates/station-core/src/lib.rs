//! Hardware-independent core library for the weather station node
//!
//! This crate contains everything a single wake of the node does that does
//! not touch a register: the battery charge estimate, the JSON payload, the
//! HTTP exchange, NTP packet handling and the duty-cycle controller that
//! sequences them. Hardware is reached only through the capability traits in
//! [`traits`], so the whole cycle can be driven on a desktop host.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! ESP32-S3 firmware and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod battery;
pub mod config;
pub mod duty_cycle;
pub mod error;
pub mod http;
pub mod measurement;
pub mod payload;
pub mod sntp;
pub mod traits;

pub use battery::ChargeEstimator;
pub use config::Config;
pub use duty_cycle::{Capabilities, CycleOutcome, CycleReport, CycleState, DutyCycle, PowerAction};
pub use measurement::{DeviceId, EnvironmentReading, FirmwareVersion, Measurement};
pub use payload::Payload;
