//! Error types of the capabilities
//!
//! None of these leave the duty cycle: the controller logs them and turns
//! them into a [`CycleOutcome`](crate::CycleOutcome).

use embedded_io_async::ErrorKind;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} returned a non-finite reading")]
    InvalidReading { sensor: &'static str },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    #[error("WiFi configuration rejected")]
    Configuration,
    #[error("WiFi station could not be started")]
    Start,
    #[error("WiFi association could not be started")]
    Association,
    #[error("DNS resolution failed")]
    Dns,
    #[error("socket error")]
    Socket,
    #[error("request timeout")]
    Timeout,
    #[error("invalid time server response")]
    InvalidResponse,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    #[error("payload serialization failed")]
    Serialize,
    #[error("request head exceeds the buffer")]
    RequestTooLarge,
    #[error("DNS resolution failed")]
    Dns,
    #[error("connection failed")]
    Connect,
    #[error("I/O error: {0:?}")]
    Io(ErrorKind),
    #[error("TLS handshake failed")]
    Tls,
    #[error("TLS requested but not compiled in")]
    TlsUnavailable,
    #[error("connection closed before a status line arrived")]
    ConnectionClosed,
    #[error("malformed status line")]
    MalformedResponse,
}

impl TransmitError {
    pub fn io<E: embedded_io_async::Error>(error: E) -> Self {
        Self::Io(error.kind())
    }
}
