//! TLS 1.3 session over the TCP connection
//!
//! Server certificates are not verified. The session lives for exactly one
//! request; buffers are taken from the heap and dropped with it.

use alloc::vec;

use embedded_io_async::{Read, Write};
use embedded_tls::{
    Aes128GcmSha256, CryptoProvider, NoVerify, TlsConfig, TlsConnection, TlsContext, TlsVerifier,
};
use esp_hal::rng::Rng;
use log::{debug, error, warn};
use rand_core::{CryptoRng, RngCore};
use station_core::error::TransmitError;
use station_core::http::{self, HttpRequest};

/// Largest TLS record plus header and tag.
const READ_BUFFER_LEN: usize = 16_640;
const WRITE_BUFFER_LEN: usize = 4096;

/// The chip's hardware random number generator
///
/// Only random while the radio is running, which it is for every TLS session.
pub struct HardwareRng(Rng);

impl HardwareRng {
    pub fn new() -> Self {
        Self(Rng::new())
    }
}

impl Default for HardwareRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }

    fn next_u64(&mut self) -> u64 {
        (u64::from(self.0.random()) << 32) | u64::from(self.0.random())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.0.random().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for HardwareRng {}

struct Provider<'r> {
    rng: &'r mut HardwareRng,
    verifier: NoVerify,
}

impl CryptoProvider for Provider<'_> {
    type CipherSuite = Aes128GcmSha256;
    type Signature = &'static [u8];

    fn rng(&mut self) -> impl rand_core::CryptoRngCore {
        &mut *self.rng
    }

    fn verifier(&mut self) -> Result<&mut impl TlsVerifier<Self::CipherSuite>, embedded_tls::TlsError> {
        Ok(&mut self.verifier)
    }
}

/// Runs the HTTP exchange inside a TLS session on an open connection
pub async fn exchange<C>(
    connection: C,
    rng: &mut HardwareRng,
    request: &HttpRequest<'_>,
) -> Result<u16, TransmitError>
where
    C: Read + Write,
{
    let mut read_buffer = vec![0u8; READ_BUFFER_LEN];
    let mut write_buffer = vec![0u8; WRITE_BUFFER_LEN];

    let config = TlsConfig::new().with_server_name(request.host);
    let mut session: TlsConnection<'_, C, Aes128GcmSha256> =
        TlsConnection::new(connection, &mut read_buffer, &mut write_buffer);

    let provider = Provider {
        rng,
        verifier: NoVerify,
    };
    session
        .open(TlsContext::new(&config, provider))
        .await
        .map_err(|e| {
            error!("TLS handshake with {} failed: {:?}", request.host, e);
            TransmitError::Tls
        })?;
    debug!("TLS session with {} established", request.host);

    let status = http::exchange(&mut session, request).await;

    if let Err((_, e)) = session.close().await {
        warn!("TLS close failed: {:?}", e);
    }

    status
}
