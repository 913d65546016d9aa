//! TCP connection exposing the `embedded-io-async` traits
//!
//! The HTTP exchange and the TLS session are written against
//! `embedded-io-async`, so the embassy-net socket is wrapped and its
//! inherent read/write methods are forwarded.

use embassy_net::tcp::{self, ConnectError, TcpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Duration;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TcpConnection<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> TcpConnection<'a> {
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8]) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        Self { socket }
    }

    pub async fn connect(&mut self, endpoint: IpEndpoint) -> Result<(), ConnectError> {
        self.socket.connect(endpoint).await
    }

    /// Send FIN and drop whatever the peer still has in flight.
    pub async fn close(&mut self) {
        self.socket.close();
        if let Err(e) = self.socket.flush().await {
            log::debug!("Socket flush on close failed: {:?}", e);
        }
        self.socket.abort();
    }
}

fn kind(error: tcp::Error) -> ErrorKind {
    match error {
        tcp::Error::ConnectionReset => ErrorKind::ConnectionReset,
        #[allow(unreachable_patterns)]
        _ => ErrorKind::Other,
    }
}

impl ErrorType for TcpConnection<'_> {
    type Error = ErrorKind;
}

impl Read for TcpConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(kind)
    }
}

impl Write for TcpConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(kind)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await.map_err(kind)
    }
}
