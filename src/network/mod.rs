//! NPDU Frame Segmentation Module
//!
//! After the header, a device image is a plain sequence of NPDUs, each preceded
//! by a 2-byte big-endian length. This module walks that sequence.
//!
//! # Overview
//!
//! - Segment boundaries come only from the declared lengths; there is no terminator
//! - A declared length larger than the remaining bytes is a [`Error::TruncatedFrame`]
//! - The first segment of an image is a preamble (it contains the header region),
//!   not a transmittable frame. [`SegmentReader::skip_preamble`] drops it, so
//!   downstream consumers never deal with it themselves
//! - Readers borrow the image and are cheap to recreate, so walking the same bytes
//!   twice always yields the same segments
//!
//! # Example
//!
//! ```
//! use bacnet_imagetool::network::SegmentReader;
//!
//! let image = [0x00, 0x01, 0xAA, 0x00, 0x02, 0x01, 0x02];
//! let frames: Vec<_> = SegmentReader::new(&image)
//!     .skip_preamble(true)
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].data(), &[0x01, 0x02]);
//! ```

use std::iter::FusedIterator;

use log::{debug, trace};

use crate::encoding::ByteCursor;
use crate::error::{Error, Result};
use crate::util::hex_preview;

/// One length-delimited frame borrowed from an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSegment<'a> {
    offset: usize,
    data: &'a [u8],
}

impl<'a> FrameSegment<'a> {
    /// Offset of the segment payload (just past its length prefix)
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lazy reader over the length-prefixed segments of an image.
///
/// Yields `Err` at most once; after an error the reader is exhausted.
#[derive(Debug, Clone)]
pub struct SegmentReader<'a> {
    cursor: ByteCursor<'a>,
    skip_preamble: bool,
    decoded: usize,
    failed: bool,
}

impl<'a> SegmentReader<'a> {
    /// Read segments from the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self::starting_at(data, 0)
    }

    /// Read segments beginning at `offset`
    pub fn starting_at(data: &'a [u8], offset: usize) -> Self {
        Self {
            cursor: ByteCursor::at(data, offset),
            skip_preamble: false,
            decoded: 0,
            failed: false,
        }
    }

    /// Drop the first decoded segment instead of yielding it
    pub fn skip_preamble(mut self, skip: bool) -> Self {
        self.skip_preamble = skip;
        self
    }

    fn read_segment(&mut self) -> Result<FrameSegment<'a>> {
        let length = self.cursor.read_u16_be().map_err(Error::truncated)?;
        let offset = self.cursor.position();
        let data = self
            .cursor
            .read_bytes(length as usize)
            .map_err(Error::truncated)?;

        Ok(FrameSegment { offset, data })
    }
}

impl<'a> Iterator for SegmentReader<'a> {
    type Item = Result<FrameSegment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed || self.cursor.is_empty() {
                return None;
            }

            match self.read_segment() {
                Ok(segment) => {
                    self.decoded += 1;
                    if self.skip_preamble && self.decoded == 1 {
                        debug!(
                            "Skipping {} byte preamble at offset {}",
                            segment.len(),
                            segment.offset()
                        );
                        continue;
                    }
                    trace!(
                        "Segment {} at offset {}: {}",
                        self.decoded,
                        segment.offset(),
                        hex_preview(segment.data())
                    );
                    return Some(Ok(segment));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl FusedIterator for SegmentReader<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn image_with_segments(lengths: &[usize]) -> Vec<u8> {
        let mut image = Vec::new();
        for (i, &len) in lengths.iter().enumerate() {
            image.extend_from_slice(&(len as u16).to_be_bytes());
            image.extend((0..len).map(|b| (i * 16 + b) as u8));
        }
        image
    }

    fn lengths(reader: SegmentReader<'_>) -> Vec<usize> {
        reader.map(|s| s.unwrap().len()).collect()
    }

    #[test]
    fn test_segments_follow_declared_lengths() {
        let image = image_with_segments(&[5, 10, 3]);
        let segments: Vec<_> = SegmentReader::new(&image).map(|s| s.unwrap()).collect();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].offset(), 2);
        assert_eq!(segments[1].offset(), 9);
        assert_eq!(segments[2].offset(), 21);
        assert_eq!(segments[2].data(), &[0x20, 0x21, 0x22]);
    }

    #[test]
    fn test_skip_preamble() {
        let image = image_with_segments(&[5, 10, 3]);
        assert_eq!(
            lengths(SegmentReader::new(&image).skip_preamble(true)),
            vec![10, 3]
        );
    }

    #[test]
    fn test_empty_segments_allowed() {
        let image = image_with_segments(&[0, 0, 2]);
        assert_eq!(lengths(SegmentReader::new(&image)), vec![0, 0, 2]);
    }

    #[test]
    fn test_empty_image_yields_nothing() {
        assert_eq!(SegmentReader::new(&[]).count(), 0);
        assert_eq!(SegmentReader::new(&[]).skip_preamble(true).count(), 0);
    }

    #[test]
    fn test_truncated_payload() {
        let mut image = image_with_segments(&[5, 10]);
        image.extend_from_slice(&[0x00, 0x08, 0x01, 0x02]);

        let mut reader = SegmentReader::new(&image);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(Error::TruncatedFrame {
                offset,
                needed,
                available,
            })) => {
                assert_eq!(offset, 21);
                assert_eq!(needed, 8);
                assert_eq!(available, 2);
            }
            other => panic!("expected truncated frame, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_length_prefix() {
        let mut image = image_with_segments(&[3]);
        image.push(0x00);

        let results: Vec<_> = SegmentReader::new(&image).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(Error::TruncatedFrame {
                offset: 5,
                needed: 2,
                available: 1,
            })
        ));
    }

    #[test]
    fn test_starting_offset() {
        let mut image = vec![0xAA, 0xBB, 0xCC];
        image.extend(image_with_segments(&[4]));

        assert_eq!(lengths(SegmentReader::starting_at(&image, 3)), vec![4]);
        assert_eq!(SegmentReader::starting_at(&image, 100).count(), 0);
    }

    proptest! {
        #[test]
        fn prop_reader_is_pure(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let first: Vec<_> = SegmentReader::new(&bytes)
                .map(|s| s.map(|s| (s.offset(), s.data().to_vec())).map_err(|e| e.to_string()))
                .collect();
            let second: Vec<_> = SegmentReader::new(&bytes)
                .map(|s| s.map(|s| (s.offset(), s.data().to_vec())).map_err(|e| e.to_string()))
                .collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_segments_cover_image(lens in proptest::collection::vec(0usize..64, 0..16)) {
            let image = image_with_segments(&lens);
            let decoded: Vec<usize> = SegmentReader::new(&image).map(|s| s.unwrap().len()).collect();
            prop_assert_eq!(&decoded, &lens);

            let skipped: Vec<usize> = SegmentReader::new(&image)
                .skip_preamble(true)
                .map(|s| s.unwrap().len())
                .collect();
            prop_assert_eq!(skipped.as_slice(), lens.get(1..).unwrap_or(&[]));
        }
    }
}
