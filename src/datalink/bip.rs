//! BACnet/IP Frame Replay
//!
//! Sends the NPDUs of an image to a live device, one Original-Unicast-NPDU
//! datagram per frame, over a single connected UDP socket.
//!
//! Transmissions are paced by a fixed interval (100 ms unless configured); there
//! is no flow control from the device. Any failure ends the replay and nothing
//! is retried. The socket is closed by dropping it once the last datagram is
//! out; std sockets have no separate UDP shutdown step.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    thread,
    time::Duration,
};

use log::{debug, info, trace, warn};

use super::{BvlcHeader, DatagramSink, BACNET_IP_PORT};
use crate::error::{Error, Result};
use crate::image::RawImage;
use crate::network::FrameSegment;
use crate::util::hex_dump;

/// Default pause between two datagrams
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Replay settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Destination UDP port
    pub port: u16,
    /// Pause between consecutive datagrams
    pub interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            port: BACNET_IP_PORT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Paced sender of BVLC-wrapped frames
#[derive(Debug)]
pub struct ReplaySender<S: DatagramSink> {
    sink: S,
    interval: Duration,
    sent: usize,
}

impl ReplaySender<UdpSocket> {
    /// Bind an ephemeral local socket and connect it to `addr`
    pub fn connect(addr: Ipv4Addr, config: &ReplayConfig) -> Result<Self> {
        let remote = SocketAddr::V4(SocketAddrV4::new(addr, config.port));
        let connection_error = |source: io::Error| Error::Connection {
            addr: remote,
            source,
        };

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(connection_error)?;
        socket.connect(remote).map_err(connection_error)?;
        info!("Socket connected to {}", remote);

        Ok(Self::new(socket, config.interval))
    }
}

impl<S: DatagramSink> ReplaySender<S> {
    pub fn new(sink: S, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            sent: 0,
        }
    }

    /// Datagrams sent so far
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Wrap one NPDU in a BVLC header and send it immediately.
    ///
    /// A failure reports [`sent`](Self::sent) as it stood before the attempt.
    pub fn send_frame(&mut self, npdu: &[u8]) -> Result<()> {
        let datagram = BvlcHeader::for_npdu(npdu.len())?.wrap(npdu);

        self.sink
            .send_datagram(&datagram)
            .map_err(|source| Error::Send {
                sent: self.sent,
                source,
            })?;
        self.sent += 1;

        trace!(
            "Datagram {} ({} bytes):\n{}",
            self.sent,
            datagram.len(),
            hex_dump(&datagram, "  ")
        );
        Ok(())
    }

    /// Send every frame, pausing between datagrams.
    ///
    /// Returns the number of datagrams sent by this call. The first error stops
    /// the run; [`Error::Send`] carries the count reached before it.
    pub fn replay<'a, I>(&mut self, frames: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<FrameSegment<'a>>>,
    {
        let start = self.sent;

        for frame in frames {
            let frame = frame.map_err(|e| self.abort(start, e))?;
            if self.sent > start {
                thread::sleep(self.interval);
            }
            self.send_frame(frame.data())
                .map_err(|e| self.abort(start, e))?;
        }

        Ok(self.sent - start)
    }

    fn abort(&self, start: usize, err: Error) -> Error {
        let sent = self.sent - start;
        warn!("Replay aborted after {} datagrams: {}", sent, err);
        match err {
            Error::Send { source, .. } => Error::Send { sent, source },
            other => other,
        }
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

/// Replay every frame of `image` (preamble skipped) to `addr`.
///
/// Returns the number of datagrams sent.
pub fn replay(image: &RawImage, addr: Ipv4Addr, config: &ReplayConfig) -> Result<usize> {
    let mut sender = ReplaySender::connect(addr, config)?;
    debug!("Pacing datagrams {:?} apart", config.interval);

    let sent = sender.replay(image.frames())?;

    info!("Replay to {}:{} complete, releasing socket", addr, config.port);
    drop(sender);
    Ok(sent)
}
