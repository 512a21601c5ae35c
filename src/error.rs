//! Crate-level error type shared by every image operation.

use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::encoding::EncodingError;

/// Result type for image operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by header queries, capture conversion and replay
#[derive(Debug, Error)]
pub enum Error {
    /// The image or capture file could not be opened, created or written
    #[error("cannot access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Header tags describe a read outside the image or an inconsistent layout
    #[error("header decode failed: {0}")]
    Decode(#[from] EncodingError),

    /// A frame length prefix or payload runs past the end of the image
    #[error("truncated frame at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedFrame {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A frame is too long for the 16-bit length fields it must be wrapped in
    #[error("frame of {len} bytes exceeds the {max} byte encapsulation limit")]
    FrameTooLarge { len: usize, max: usize },

    /// Writing to a capture sink failed
    #[error("capture write failed: {0}")]
    Write(#[source] io::Error),

    /// The replay socket could not be bound or connected
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A datagram could not be sent; `sent` datagrams went out before it
    #[error("send failed after {sent} datagrams: {source}")]
    Send {
        sent: usize,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Map a cursor shortfall while walking frames to [`Error::TruncatedFrame`]
    pub(crate) fn truncated(err: EncodingError) -> Self {
        match err {
            EncodingError::UnexpectedEndOfData {
                offset,
                needed,
                available,
            } => Error::TruncatedFrame {
                offset,
                needed,
                available,
            },
            other => Error::Decode(other),
        }
    }
}
