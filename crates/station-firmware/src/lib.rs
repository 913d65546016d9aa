//! ESP32-S3 firmware-specific modules for the weather station
//!
//! This crate contains the hardware side of the duty cycle that cannot compile
//! on desktop targets: peripheral setup, the BME280 and ADC capabilities, the
//! WiFi station with its embassy-net stack, the HTTP and SNTP clients and the
//! power actions that end every wake.

#![no_std]

extern crate alloc;

pub mod battery;
pub mod hardware;
pub mod http;
pub mod power;
pub mod sensor;
pub mod settings;
pub mod sntp;
pub mod socket;
#[cfg(feature = "tls")]
pub mod tls;
pub mod wifi;
