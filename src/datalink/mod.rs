//! BACnet/IP Data Link Module
//!
//! Frames extracted from an image are bare NPDUs. Before they can travel over
//! UDP (or appear in a capture) they need the BACnet Virtual Link Control header
//! defined in ASHRAE 135 Annex J:
//!
//! ```text
//! +------+----------+----------------+
//! | 0x81 | function | length (BE u16)|  followed by the NPDU
//! +------+----------+----------------+
//! ```
//!
//! The length covers the 4-byte header plus the NPDU. Replayed frames are always
//! sent as Original-Unicast-NPDU.
//!
//! # Architecture
//!
//! Outgoing datagrams go through the [`DatagramSink`] trait. [`UdpSocket`]
//! implements it for live replay; tests substitute their own sinks.

pub mod bip;

pub use bip::{replay, ReplayConfig, ReplaySender, DEFAULT_INTERVAL};

use std::{io, net::UdpSocket};

use crate::error::{Error, Result};

/// BACnet/IP well-known port number (0xBAC0)
pub const BACNET_IP_PORT: u16 = 47808;

/// BVLC type octet for BACnet/IP
pub const BVLC_TYPE_BIP: u8 = 0x81;

/// Size of the BVLC header
pub const BVLC_HEADER_LEN: usize = 4;

/// Largest NPDU whose BVLC length still fits in 16 bits
pub const MAX_NPDU_LEN: usize = u16::MAX as usize - BVLC_HEADER_LEN;

/// BVLC function codes used when re-encapsulating image frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BvlcFunction {
    /// Original-Unicast-NPDU
    OriginalUnicastNpdu = 0x0A,
}

/// BVLC header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvlcHeader {
    /// BVLC type (always 0x81 for BACnet/IP)
    pub bvlc_type: u8,
    /// BVLC function
    pub function: BvlcFunction,
    /// Total message length including BVLC header
    pub length: u16,
}

impl BvlcHeader {
    /// Create a new BVLC header
    pub fn new(function: BvlcFunction, length: u16) -> Self {
        Self {
            bvlc_type: BVLC_TYPE_BIP,
            function,
            length,
        }
    }

    /// Header for an Original-Unicast-NPDU carrying `npdu_len` bytes
    pub fn for_npdu(npdu_len: usize) -> Result<Self> {
        if npdu_len > MAX_NPDU_LEN {
            return Err(Error::FrameTooLarge {
                len: npdu_len,
                max: MAX_NPDU_LEN,
            });
        }
        Ok(Self::new(
            BvlcFunction::OriginalUnicastNpdu,
            (BVLC_HEADER_LEN + npdu_len) as u16,
        ))
    }

    /// Encode BVLC header to bytes
    pub fn encode(&self) -> [u8; BVLC_HEADER_LEN] {
        let length = self.length.to_be_bytes();
        [self.bvlc_type, self.function as u8, length[0], length[1]]
    }

    /// Header followed by the NPDU, ready to put on the wire
    pub fn wrap(&self, npdu: &[u8]) -> Vec<u8> {
        let mut datagram = Vec::with_capacity(BVLC_HEADER_LEN + npdu.len());
        datagram.extend_from_slice(&self.encode());
        datagram.extend_from_slice(npdu);
        datagram
    }
}

/// Destination for outgoing BVLC datagrams
pub trait DatagramSink {
    /// Send one complete datagram, returning the number of bytes sent
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<usize>;
}

/// A connected socket sends to its peer
impl DatagramSink for UdpSocket {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.send(datagram)
    }
}

impl<S: DatagramSink + ?Sized> DatagramSink for &mut S {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<usize> {
        (**self).send_datagram(datagram)
    }
}
