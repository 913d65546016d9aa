//! SNTP client over UDP

use embassy_futures::select::{Either, select};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, Timer};
use log::debug;
use station_core::config::TimeSyncConfig;
use station_core::error::NetworkError;
use station_core::sntp::{self, NTP_PACKET_LEN, NTP_PORT};
use station_core::traits::TimeSource;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SntpClock<'a> {
    stack: Stack<'a>,
}

impl<'a> SntpClock<'a> {
    pub fn new(stack: Stack<'a>) -> Self {
        Self { stack }
    }
}

impl TimeSource for SntpClock<'_> {
    async fn sync(&mut self, config: &TimeSyncConfig<'_>) -> Result<u64, NetworkError> {
        let server = self
            .stack
            .dns_query(config.server, DnsQueryType::A)
            .await
            .map_err(|_| NetworkError::Dns)?
            .first()
            .copied()
            .ok_or(NetworkError::Dns)?;
        let endpoint = IpEndpoint::new(server, NTP_PORT);

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::Socket)?;

        socket
            .send_to(&sntp::request_packet(), endpoint)
            .await
            .map_err(|_| NetworkError::Socket)?;
        debug!("Sent NTP request to {}", endpoint);

        let mut response = [0u8; NTP_PACKET_LEN];
        let (len, from) = match select(Timer::after(RESPONSE_TIMEOUT), socket.recv_from(&mut response)).await {
            Either::First(_) => return Err(NetworkError::Timeout),
            Either::Second(result) => result.map_err(|_| NetworkError::Socket)?,
        };

        if from.endpoint.addr != server {
            return Err(NetworkError::InvalidResponse);
        }

        sntp::parse_response(&response[..len])
    }
}
