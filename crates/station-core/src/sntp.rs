//! SNTP packet handling (RFC 4330)
//!
//! Only the client request and the transmit timestamp of the reply are
//! needed; the node does not discipline a clock, it just wants wall time.

use crate::error::NetworkError;

pub const NTP_PORT: u16 = 123;
pub const NTP_PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

/// NTP request: LI=0, VN=3, Mode=3 (Client)
pub fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Extracts the server transmit time as Unix seconds.
pub fn parse_response(packet: &[u8]) -> Result<u64, NetworkError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(NetworkError::InvalidResponse);
    }

    let mode = packet[0] & 0x07;
    if mode != MODE_SERVER && mode != MODE_BROADCAST {
        return Err(NetworkError::InvalidResponse);
    }

    // Stratum 0 is a kiss-o'-death packet.
    let stratum = packet[1];
    if stratum == 0 || stratum > 15 {
        return Err(NetworkError::InvalidResponse);
    }

    let seconds = u32::from_be_bytes([
        packet[TRANSMIT_TIMESTAMP_OFFSET],
        packet[TRANSMIT_TIMESTAMP_OFFSET + 1],
        packet[TRANSMIT_TIMESTAMP_OFFSET + 2],
        packet[TRANSMIT_TIMESTAMP_OFFSET + 3],
    ]) as u64;

    // Timestamps below the offset belong to era 1, which starts in 2036.
    let unix = if seconds >= NTP_UNIX_OFFSET {
        seconds - NTP_UNIX_OFFSET
    } else {
        seconds + (1u64 << 32) - NTP_UNIX_OFFSET
    };

    Ok(unix)
}
