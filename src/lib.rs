#![doc = include_str!("../README.md")]

pub mod capture;
pub mod datalink;
pub mod encoding;
pub mod error;
pub mod image;
pub mod network;
pub mod util;

// Re-export main types without glob imports to avoid conflicts
pub use capture::{convert, convert_to_file, write_capture, CaptureWriter, CAPTURE_FILE_NAME};
pub use datalink::{replay, DatagramSink, ReplayConfig, ReplaySender, BACNET_IP_PORT};
pub use encoding::{EncodingError, FieldName, FieldQuery, FieldValue, HeaderField};
pub use error::{Error, Result};
pub use image::RawImage;
pub use network::{FrameSegment, SegmentReader};
