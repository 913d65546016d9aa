//! HTTP client on top of the embassy-net stack

use embassy_net::dns::DnsQueryType;
use embassy_net::{IpAddress, IpEndpoint, Stack};
use log::{debug, error, info};
use station_core::error::TransmitError;
use station_core::http::{self, HttpRequest};
use station_core::traits::HttpTransport;

use crate::socket::TcpConnection;
#[cfg(feature = "tls")]
use crate::tls::HardwareRng;

const RX_BUFFER_LEN: usize = 1024;
const TX_BUFFER_LEN: usize = 1024;

pub struct HttpClient<'a> {
    stack: Stack<'a>,
    #[cfg(feature = "tls")]
    rng: HardwareRng,
}

impl<'a> HttpClient<'a> {
    pub fn new(stack: Stack<'a>) -> Self {
        Self {
            stack,
            #[cfg(feature = "tls")]
            rng: HardwareRng::new(),
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, TransmitError> {
        self.stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                error!("DNS query for {} failed: {:?}", host, e);
                TransmitError::Dns
            })?
            .first()
            .copied()
            .ok_or(TransmitError::Dns)
    }

    #[cfg(feature = "tls")]
    async fn exchange_tls(
        &mut self,
        connection: &mut TcpConnection<'_>,
        request: &HttpRequest<'_>,
    ) -> Result<u16, TransmitError> {
        crate::tls::exchange(connection, &mut self.rng, request).await
    }

    #[cfg(not(feature = "tls"))]
    async fn exchange_tls(
        &mut self,
        _connection: &mut TcpConnection<'_>,
        _request: &HttpRequest<'_>,
    ) -> Result<u16, TransmitError> {
        error!("Endpoint requires TLS but the firmware was built without the `tls` feature");
        Err(TransmitError::TlsUnavailable)
    }
}

impl HttpTransport for HttpClient<'_> {
    async fn post(&mut self, request: &HttpRequest<'_>) -> Result<u16, TransmitError> {
        let address = self.resolve(request.host).await?;
        let endpoint = IpEndpoint::new(address, request.port);
        debug!("Resolved {} to {}", request.host, endpoint);

        let mut rx_buffer = [0u8; RX_BUFFER_LEN];
        let mut tx_buffer = [0u8; TX_BUFFER_LEN];
        let mut connection = TcpConnection::new(self.stack, &mut rx_buffer, &mut tx_buffer);

        connection.connect(endpoint).await.map_err(|e| {
            error!("Connecting to {} failed: {:?}", endpoint, e);
            TransmitError::Connect
        })?;

        let status = if request.tls {
            self.exchange_tls(&mut connection, request).await
        } else {
            http::exchange(&mut connection, request).await
        };
        connection.close().await;

        if let Ok(status) = status {
            info!("POST {}{} answered {}", request.host, request.path, status);
        }
        status
    }
}
