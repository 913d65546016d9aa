//! Minimal HTTP/1.1 client exchange
//!
//! The node sends one `POST` with `Connection: close` and only cares about
//! the status code of the answer, so the response is read up to the end of
//! the status line and the rest is left unread.

use core::fmt::Write as _;

use embedded_io_async::{Read, Write};
use heapless::String;

use crate::config::EndpointConfig;
use crate::error::TransmitError;

pub const CONTENT_TYPE_JSON: &str = "application/json";

const HEAD_CAPACITY: usize = 512;
const STATUS_LINE_CAPACITY: usize = 128;

/// One outgoing request. Borrowed from the configuration and the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub user_agent: &'a str,
    pub content_type: &'a str,
    pub tls: bool,
    pub body: &'a [u8],
}

impl<'a> HttpRequest<'a> {
    /// A JSON `POST` to the configured endpoint.
    pub fn post_json(endpoint: &EndpointConfig<'a>, body: &'a [u8]) -> Self {
        Self {
            host: endpoint.host,
            port: endpoint.port,
            path: endpoint.path,
            user_agent: endpoint.user_agent,
            content_type: CONTENT_TYPE_JSON,
            tls: endpoint.tls,
            body,
        }
    }

    fn default_port(&self) -> u16 {
        if self.tls { 443 } else { 80 }
    }

    /// Request line and headers, terminated by the empty line.
    pub fn head(&self) -> Result<String<HEAD_CAPACITY>, TransmitError> {
        let mut head = String::new();
        let path = if self.path.is_empty() { "/" } else { self.path };

        write!(head, "POST {} HTTP/1.1\r\n", path).map_err(|_| TransmitError::RequestTooLarge)?;
        let host = if self.port == self.default_port() {
            write!(head, "Host: {}\r\n", self.host)
        } else {
            write!(head, "Host: {}:{}\r\n", self.host, self.port)
        };
        host.map_err(|_| TransmitError::RequestTooLarge)?;
        write!(
            head,
            "User-Agent: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.user_agent,
            self.content_type,
            self.body.len()
        )
        .map_err(|_| TransmitError::RequestTooLarge)?;

        Ok(head)
    }
}

/// Parses `HTTP/1.1 204 No Content` into `204`.
pub fn parse_status_line(line: &[u8]) -> Result<u16, TransmitError> {
    let line = core::str::from_utf8(line).map_err(|_| TransmitError::MalformedResponse)?;
    let mut parts = line.split(' ');

    let version = parts.next().ok_or(TransmitError::MalformedResponse)?;
    if !version.starts_with("HTTP/") {
        return Err(TransmitError::MalformedResponse);
    }

    let code = parts
        .next()
        .map(|c| c.trim_end_matches(['\r', '\n']))
        .ok_or(TransmitError::MalformedResponse)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransmitError::MalformedResponse);
    }

    code.parse().map_err(|_| TransmitError::MalformedResponse)
}

/// Writes the request to an open connection and reads back the status code.
pub async fn exchange<C>(connection: &mut C, request: &HttpRequest<'_>) -> Result<u16, TransmitError>
where
    C: Read + Write,
{
    let head = request.head()?;
    connection
        .write_all(head.as_bytes())
        .await
        .map_err(TransmitError::io)?;
    connection
        .write_all(request.body)
        .await
        .map_err(TransmitError::io)?;
    connection.flush().await.map_err(TransmitError::io)?;

    let mut buffer = [0u8; STATUS_LINE_CAPACITY];
    let mut filled = 0;
    loop {
        if let Some(end) = buffer[..filled].windows(2).position(|w| w == b"\r\n") {
            return parse_status_line(&buffer[..end]);
        }
        if filled == buffer.len() {
            return Err(TransmitError::MalformedResponse);
        }

        let read = connection
            .read(&mut buffer[filled..])
            .await
            .map_err(TransmitError::io)?;
        if read == 0 {
            return Err(TransmitError::ConnectionClosed);
        }
        filled += read;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use embassy_futures::block_on;
    use embedded_io_async::{ErrorKind, ErrorType};

    /// In-memory connection that records what was written and answers with
    /// a canned response in small chunks.
    struct MockConnection<'a> {
        written: Vec<u8>,
        response: &'a [u8],
        chunk: usize,
    }

    impl<'a> MockConnection<'a> {
        fn new(response: &'a [u8]) -> Self {
            Self {
                written: Vec::new(),
                response,
                chunk: 5,
            }
        }
    }

    impl ErrorType for MockConnection<'_> {
        type Error = ErrorKind;
    }

    impl Read for MockConnection<'_> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = self.chunk.min(buf.len()).min(self.response.len());
            buf[..n].copy_from_slice(&self.response[..n]);
            self.response = &self.response[n..];
            Ok(n)
        }
    }

    impl Write for MockConnection<'_> {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct BrokenConnection;

    impl ErrorType for BrokenConnection {
        type Error = ErrorKind;
    }

    impl Read for BrokenConnection {
        async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
            Err(ErrorKind::ConnectionReset)
        }
    }

    impl Write for BrokenConnection {
        async fn write(&mut self, _buf: &[u8]) -> Result<usize, Self::Error> {
            Err(ErrorKind::BrokenPipe)
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn endpoint() -> EndpointConfig<'static> {
        EndpointConfig {
            host: "weather.example.org",
            port: 8080,
            path: "/api/measurements",
            tls: false,
            user_agent: "WeatherStation/BA188",
            expected_status: 204,
        }
    }

    #[test]
    fn head_carries_fixed_headers() {
        let body = br#"{"temperature":22.5}"#;
        let request = HttpRequest::post_json(&endpoint(), body);
        let head = request.head().unwrap();

        assert_eq!(
            head.as_str(),
            "POST /api/measurements HTTP/1.1\r\n\
             Host: weather.example.org:8080\r\n\
             User-Agent: WeatherStation/BA188\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 20\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn host_omits_default_port() {
        let mut plain = endpoint();
        plain.port = 80;
        let head = HttpRequest::post_json(&plain, b"{}").head().unwrap();
        assert!(head.contains("Host: weather.example.org\r\n"));

        let mut secure = endpoint();
        secure.port = 443;
        secure.tls = true;
        let head = HttpRequest::post_json(&secure, b"{}").head().unwrap();
        assert!(head.contains("Host: weather.example.org\r\n"));
    }

    #[test]
    fn oversized_path_is_rejected() {
        let long_path = [b'a'; 600];
        let mut config = endpoint();
        config.path = core::str::from_utf8(&long_path).unwrap();

        assert_eq!(
            HttpRequest::post_json(&config, b"{}").head(),
            Err(TransmitError::RequestTooLarge)
        );
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line(b"HTTP/1.1 204 No Content"), Ok(204));
        assert_eq!(parse_status_line(b"HTTP/1.0 200 OK"), Ok(200));
        assert_eq!(parse_status_line(b"HTTP/1.1 500"), Ok(500));
        assert_eq!(
            parse_status_line(b"SSH-2.0-OpenSSH_9.6"),
            Err(TransmitError::MalformedResponse)
        );
        assert_eq!(
            parse_status_line(b"HTTP/1.1 20x OK"),
            Err(TransmitError::MalformedResponse)
        );
        assert_eq!(parse_status_line(b""), Err(TransmitError::MalformedResponse));
    }

    #[test]
    fn exchange_writes_request_and_reads_status() {
        let mut connection =
            MockConnection::new(b"HTTP/1.1 204 No Content\r\nServer: test\r\n\r\n");
        let body = br#"{"charge":50.0}"#;
        let request = HttpRequest::post_json(&endpoint(), body);

        let status = block_on(exchange(&mut connection, &request)).unwrap();

        assert_eq!(status, 204);
        assert!(connection.written.starts_with(b"POST /api/measurements HTTP/1.1\r\n"));
        assert!(connection.written.ends_with(b"\r\n\r\n{\"charge\":50.0}"));
    }

    #[test]
    fn exchange_reports_closed_connection() {
        let mut connection = MockConnection::new(b"HTTP/1.1 20");
        let request = HttpRequest::post_json(&endpoint(), b"{}");

        assert_eq!(
            block_on(exchange(&mut connection, &request)),
            Err(TransmitError::ConnectionClosed)
        );
    }

    #[test]
    fn exchange_rejects_endless_status_line() {
        let garbage = [b'x'; 300];
        let mut connection = MockConnection::new(&garbage);
        connection.chunk = 64;
        let request = HttpRequest::post_json(&endpoint(), b"{}");

        assert_eq!(
            block_on(exchange(&mut connection, &request)),
            Err(TransmitError::MalformedResponse)
        );
    }

    #[test]
    fn exchange_maps_io_errors() {
        let request = HttpRequest::post_json(&endpoint(), b"{}");

        assert_eq!(
            block_on(exchange(&mut BrokenConnection, &request)),
            Err(TransmitError::Io(ErrorKind::BrokenPipe))
        );
    }
}
