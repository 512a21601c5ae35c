//! Capture File Synthesis
//!
//! Converts the frames of an image into a classic libpcap file so they can be
//! inspected with a protocol analyzer. Each frame becomes one record carrying a
//! synthetic loopback/IPv4/UDP/BVLC encapsulation:
//!
//! ```text
//! offset  size  field
//!      0     8  timestamp (zero)
//!      8     4  captured length   L + 36 (little-endian)
//!     12     4  original length   L + 36 (little-endian)
//!     16     4  loopback family / ethertype markers
//!     20    20  IPv4 header, total length L + 32 (big-endian), protocol UDP
//!     40     8  UDP header, ports 47808, length L + 12 (big-endian)
//!     48     4  BVLC header, length L + 4 (big-endian)
//!     52     L  NPDU
//! ```
//!
//! Addresses and checksums are left zero. The default output name keeps the
//! historical `.pcapng` extension although the content is classic pcap.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use bytes::{BufMut, BytesMut};
use log::{debug, info};

use crate::datalink::{BvlcHeader, BVLC_HEADER_LEN};
use crate::error::{Error, Result};
use crate::image::RawImage;
use crate::network::FrameSegment;

/// Output file name used when no explicit path is given
pub const CAPTURE_FILE_NAME: &str = "IFConversion.pcapng";

/// pcap global header: little-endian magic, version 2.4, snaplen 65535,
/// link type 0 (BSD loopback)
pub const GLOBAL_HEADER: [u8; 24] = [
    0xD4, 0xC3, 0xB2, 0xA1, // magic
    0x02, 0x00, 0x04, 0x00, // version 2.4
    0x00, 0x00, 0x00, 0x00, // thiszone
    0x00, 0x00, 0x00, 0x00, // sigfigs
    0xFF, 0xFF, 0x00, 0x00, // snaplen
    0x00, 0x00, 0x00, 0x00, // link type
];

/// Bytes written in front of every frame
pub const RECORD_PREFIX_LEN: usize = 52;

const RECORD_HEADER_LEN: usize = 16;
const LINK_HEADER_LEN: usize = 4;
const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

const RECORD_TEMPLATE: [u8; RECORD_PREFIX_LEN] = [
    // record header
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // timestamp
    0x00, 0x00, 0x00, 0x00, // captured length
    0x00, 0x00, 0x00, 0x00, // original length
    // link layer
    0x02, 0x00, // loopback family
    0x08, 0x00, // ethertype
    // IPv4
    0x45, 0x00, // version/IHL, DSCP
    0x00, 0x00, // total length
    0x00, 0x00, 0x00, 0x00, // id, flags, fragment
    0x80, 0x11, // TTL, protocol UDP
    0x00, 0x00, // checksum
    0x00, 0x00, 0x00, 0x00, // source
    0x00, 0x00, 0x00, 0x00, // destination
    // UDP
    0xBA, 0xC0, // source port
    0xBA, 0xC0, // destination port
    0x00, 0x00, // length
    0x00, 0x00, // checksum
    // BVLC
    0x81, 0x0A, 0x00, 0x00,
];

const CAPTURED_LEN_OFFSET: usize = 8;
const ORIGINAL_LEN_OFFSET: usize = 12;
const IPV4_TOTAL_LEN_OFFSET: usize = 22;
const UDP_LEN_OFFSET: usize = 44;
const BVLC_OFFSET: usize = 48;

/// Bytes of encapsulation counted by the record length fields
const CAPTURED_OVERHEAD: usize = RECORD_PREFIX_LEN - RECORD_HEADER_LEN;
const IPV4_OVERHEAD: usize = IPV4_HEADER_LEN + UDP_HEADER_LEN + BVLC_HEADER_LEN;
const UDP_OVERHEAD: usize = UDP_HEADER_LEN + BVLC_HEADER_LEN;

/// Largest frame whose IPv4 total length still fits in 16 bits
pub const MAX_FRAME_LEN: usize = u16::MAX as usize - IPV4_OVERHEAD;

/// Build the 52-byte record prefix for a frame of `frame_len` bytes
pub fn record_prefix(frame_len: usize) -> Result<[u8; RECORD_PREFIX_LEN]> {
    if frame_len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len: frame_len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut prefix = RECORD_TEMPLATE;
    let captured = ((frame_len + CAPTURED_OVERHEAD) as u32).to_le_bytes();
    prefix[CAPTURED_LEN_OFFSET..CAPTURED_LEN_OFFSET + 4].copy_from_slice(&captured);
    prefix[ORIGINAL_LEN_OFFSET..ORIGINAL_LEN_OFFSET + 4].copy_from_slice(&captured);

    let ipv4_len = ((frame_len + IPV4_OVERHEAD) as u16).to_be_bytes();
    prefix[IPV4_TOTAL_LEN_OFFSET..IPV4_TOTAL_LEN_OFFSET + 2].copy_from_slice(&ipv4_len);

    let udp_len = ((frame_len + UDP_OVERHEAD) as u16).to_be_bytes();
    prefix[UDP_LEN_OFFSET..UDP_LEN_OFFSET + 2].copy_from_slice(&udp_len);

    let bvlc = BvlcHeader::for_npdu(frame_len)?.encode();
    prefix[BVLC_OFFSET..BVLC_OFFSET + BVLC_HEADER_LEN].copy_from_slice(&bvlc);

    Ok(prefix)
}

/// Streaming pcap writer; the global header is written on creation
#[derive(Debug)]
pub struct CaptureWriter<W: Write> {
    inner: W,
    records: usize,
    buffer: BytesMut,
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(&GLOBAL_HEADER)?;
        Ok(Self {
            inner,
            records: 0,
            buffer: BytesMut::new(),
        })
    }

    /// Append one record for `frame`
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let prefix = record_prefix(frame.len())?;

        self.buffer.clear();
        self.buffer.reserve(RECORD_PREFIX_LEN + frame.len());
        self.buffer.put_slice(&prefix);
        self.buffer.put_slice(frame);
        self.inner.write_all(&self.buffer).map_err(Error::Write)?;

        self.records += 1;
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Write a capture of `frames` to `sink`, returning the number of records.
///
/// Errors stop the conversion; bytes already handed to `sink` stay there.
pub fn write_capture<'a, W, I>(sink: W, frames: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Result<FrameSegment<'a>>>,
{
    let mut writer = CaptureWriter::new(sink).map_err(Error::Write)?;

    for frame in frames {
        let frame = frame?;
        debug!(
            "Record {}: {} byte frame from offset {}",
            writer.records() + 1,
            frame.len(),
            frame.offset()
        );
        writer.write_frame(frame.data())?;
    }

    let records = writer.records();
    writer.finish().map_err(Error::Write)?;
    Ok(records)
}

/// Convert `image` into a capture file at `path`, replacing any existing file
pub fn convert_to_file(image: &RawImage, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let file_error = |source: io::Error| Error::FileAccess {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(file_error)?;
    let records = match write_capture(BufWriter::new(file), image.frames()) {
        Err(Error::Write(source)) => return Err(file_error(source)),
        other => other?,
    };

    info!("Wrote {} records to {}", records, path.display());
    Ok(records)
}

/// Convert `image` into [`CAPTURE_FILE_NAME`] in the current directory
pub fn convert(image: &RawImage) -> Result<(PathBuf, usize)> {
    let path = std::env::current_dir()
        .map_err(|source| Error::FileAccess {
            path: PathBuf::from("."),
            source,
        })?
        .join(CAPTURE_FILE_NAME);

    let records = convert_to_file(image, &path)?;
    Ok((path, records))
}
