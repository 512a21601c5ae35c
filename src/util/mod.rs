//! Utility Functions Module
//!
//! Helpers shared by the library and the `imagetool` binary.
//!
//! # Overview
//!
//! Utilities provided include:
//! - Dotted-quad IPv4 validation for replay targets
//! - Hex formatting for frame logging
//! - Human-readable byte counts
//!
//! # Example
//!
//! ```
//! use bacnet_imagetool::util::parse_dotted_quad;
//!
//! assert!(parse_dotted_quad("10.0.0.25").is_some());
//! assert!(parse_dotted_quad("10.0.0").is_none());
//! ```

use std::net::Ipv4Addr;

/// Number of bytes shown by [`hex_preview`] before eliding the rest
const PREVIEW_BYTES: usize = 32;

/// Parse a dotted-quad IPv4 address.
///
/// Exactly four numeric octets in `0..=255` are required. Unlike
/// [`Ipv4Addr::from_str`](std::str::FromStr), leading zeros are accepted
/// (`"010.000.000.001"`).
pub fn parse_dotted_quad(input: &str) -> Option<Ipv4Addr> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut octets = [0u8; 4];
    let mut parts = input.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse().ok()?;
    }

    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// Compact single-line hex of the start of a frame, for log lines
pub fn hex_preview(data: &[u8]) -> String {
    if data.len() <= PREVIEW_BYTES {
        hex::encode_upper(data)
    } else {
        format!(
            "{}... ({} bytes)",
            hex::encode_upper(&data[..PREVIEW_BYTES]),
            data.len()
        )
    }
}

/// Bytes per line of [`hex_dump`]
const DUMP_WIDTH: usize = 16;

/// Multi-line dump of a whole datagram: one `prefix`ed line per 16 bytes,
/// led by the offset of its first byte
pub fn hex_dump(data: &[u8], prefix: &str) -> String {
    data.chunks(DUMP_WIDTH)
        .enumerate()
        .map(|(line, chunk)| {
            format!(
                "{}{:04X}: {}\n",
                prefix,
                line * DUMP_WIDTH,
                hex::encode_upper(chunk)
            )
        })
        .collect()
}

/// Format bytes as human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
