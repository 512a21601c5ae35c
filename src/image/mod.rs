//! Device Image Module
//!
//! A [`RawImage`] is the whole image file, read once into memory and never
//! modified. Header queries and frame walks both borrow from it independently:
//! the header is decoded from a fixed offset, while frames are walked from the
//! very first byte (the header region is itself the first, preamble, segment).
//!
//! # Example
//!
//! ```no_run
//! use bacnet_imagetool::image::RawImage;
//! use bacnet_imagetool::encoding::FieldQuery;
//!
//! # fn example() -> Result<(), bacnet_imagetool::Error> {
//! let image = RawImage::open("controller.img")?;
//! for field in image.header(FieldQuery::All)? {
//!     println!("{}", field);
//! }
//! println!("{} frames", image.frames().count());
//! # Ok(())
//! # }
//! ```

use std::{fs, path::Path};

use bytes::Bytes;
use log::info;

use crate::encoding::{decode_header, FieldName, FieldQuery, HeaderField};
use crate::error::{Error, Result};
use crate::network::SegmentReader;
use crate::util::format_bytes;

/// Immutable contents of one image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    data: Bytes,
}

impl RawImage {
    /// Read the whole file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| Error::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            "Loaded {} from {}",
            format_bytes(data.len() as u64),
            path.display()
        );
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the requested header fields
    pub fn header(&self, query: FieldQuery) -> Result<Vec<HeaderField>> {
        Ok(decode_header(&self.data, query)?)
    }

    /// Decode a single header field
    pub fn field(&self, name: FieldName) -> Result<HeaderField> {
        let mut fields = self.header(FieldQuery::Single(name))?;
        // decode_header returns exactly one field for a single query or fails
        Ok(fields.remove(0))
    }

    /// Every length-prefixed segment, preamble included
    pub fn segments(&self) -> SegmentReader<'_> {
        SegmentReader::new(&self.data)
    }

    /// Transmittable frames: every segment after the preamble
    pub fn frames(&self) -> SegmentReader<'_> {
        self.segments().skip_preamble(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::FieldValue;

    fn sample_image() -> Vec<u8> {
        // Preamble segment holding the header, then two frames.
        let header = [
            0x01, 0x74, 0x00, 0x00, b'M', b'P', b'X', 0x72, 0x00, 0x00, b'2', 0x71, 0x00,
            0x00, 0x10,
        ];
        let mut image = (header.len() as u16).to_be_bytes().to_vec();
        image.extend_from_slice(&header);
        image.extend_from_slice(&[0x00, 0x02, 0x01, 0x20]);
        image.extend_from_slice(&[0x00, 0x03, 0x01, 0x04, 0x00]);
        image
    }

    #[test]
    fn test_header_and_frames_share_image() {
        let image = RawImage::from_bytes(sample_image());

        let lines: Vec<String> = image
            .header(FieldQuery::All)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                "Model_Name: MPX",
                "Min_Script_Version: 2",
                "Min_FB_Version: ",
                "Type: True",
            ]
        );

        assert_eq!(image.segments().count(), 3);
        let frames: Vec<Vec<u8>> = image
            .frames()
            .map(|f| f.unwrap().data().to_vec())
            .collect();
        assert_eq!(frames, vec![vec![0x01, 0x20], vec![0x01, 0x04, 0x00]]);
    }

    #[test]
    fn test_single_field() {
        let image = RawImage::from_bytes(sample_image());
        let field = image.field(FieldName::MinScriptVersion).unwrap();
        assert_eq!(field.value, FieldValue::Text("2".into()));
    }

    #[test]
    fn test_malformed_header_is_decode_error() {
        let image = RawImage::from_bytes(vec![0x00, 0x01, 0x00, 0x7F]);
        assert!(matches!(
            image.header(FieldQuery::All),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let path = std::env::temp_dir().join("bacnet-imagetool-no-such-image.img");
        match RawImage::open(&path) {
            Err(Error::FileAccess { path: failed, source }) => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected file access error, got {:?}", other),
        }
    }

    #[test]
    fn test_open_reads_file() {
        let path = std::env::temp_dir().join(format!(
            "bacnet-imagetool-open-{}.img",
            std::process::id()
        ));
        fs::write(&path, sample_image()).unwrap();

        let image = RawImage::open(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(image.as_bytes(), sample_image().as_slice());
        assert_eq!(image.frames().count(), 2);
    }
}
