//! IDX binary files as used by MNIST and its derivatives.
//!
//! IDX3 image file:
//! ```text
//! bytes  0-1:   0x00 0x00   (reserved)
//! byte   2:     0x08        (dtype = uint8)
//! byte   3:     0x03        (number of dimensions)
//! bytes  4-7:   N           (big-endian u32)
//! bytes  8-11:  rows
//! bytes 12-15:  cols
//! bytes 16..:   N * rows * cols pixels, row-major
//! ```
//!
//! IDX1 label file: the same 4-byte magic with 0x01 dimensions, a
//! big-endian count, then one byte per label.

use crate::error::{Error, Result};

/// Raw pixel payload of an IDX3 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

impl IdxImages {
    pub fn image_len(&self) -> usize {
        self.rows * self.cols
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> usize {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]) as usize
}

fn check_magic(bytes: &[u8], dims: u8, what: &str) -> Result<()> {
    if bytes[0] != 0x00 || bytes[1] != 0x00 {
        return Err(Error::idx(format!(
            "{what}: bytes 0-1 must be 0x00 0x00, got 0x{:02X} 0x{:02X}",
            bytes[0], bytes[1]
        )));
    }
    if bytes[2] != 0x08 {
        return Err(Error::idx(format!(
            "{what}: byte 2 (dtype) must be 0x08 (uint8), got 0x{:02X}",
            bytes[2]
        )));
    }
    if bytes[3] != dims {
        return Err(Error::idx(format!(
            "{what}: byte 3 (dimensions) must be {dims}, got {}",
            bytes[3]
        )));
    }
    Ok(())
}

pub fn parse_images(bytes: &[u8]) -> Result<IdxImages> {
    if bytes.len() < 16 {
        return Err(Error::idx(format!(
            "image file too short: expected at least 16 header bytes, got {}",
            bytes.len()
        )));
    }
    check_magic(bytes, 0x03, "image file")?;

    let count = read_u32(bytes, 4);
    let rows = read_u32(bytes, 8);
    let cols = read_u32(bytes, 12);
    let payload = count
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .ok_or_else(|| Error::idx("image file: declared size overflows usize"))?;

    let data = &bytes[16..];
    if data.len() < payload {
        return Err(Error::idx(format!(
            "image file declares {count} images of {rows}x{cols} ({payload} bytes) but holds {}",
            data.len()
        )));
    }
    Ok(IdxImages { count, rows, cols, pixels: data[..payload].to_vec() })
}

pub fn parse_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() < 8 {
        return Err(Error::idx(format!(
            "label file too short: expected at least 8 header bytes, got {}",
            bytes.len()
        )));
    }
    check_magic(bytes, 0x01, "label file")?;

    let count = read_u32(bytes, 4);
    let data = &bytes[8..];
    if data.len() < count {
        return Err(Error::idx(format!(
            "label file declares {count} labels but holds {}",
            data.len()
        )));
    }
    Ok(data[..count].to_vec())
}

/// Encodes an IDX3 file; the inverse of [`parse_images`].
pub fn encode_images(images: &IdxImages) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x08, 0x03];
    for v in [images.count, images.rows, images.cols] {
        out.extend_from_slice(&(v as u32).to_be_bytes());
    }
    out.extend_from_slice(&images.pixels);
    out
}

/// Encodes an IDX1 label file; the inverse of [`parse_labels`].
pub fn encode_labels(labels: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x08, 0x01];
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    out.extend_from_slice(labels);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_payload() {
        let images = IdxImages { count: 2, rows: 2, cols: 3, pixels: (0..12).collect() };
        let parsed = parse_images(&encode_images(&images)).unwrap();
        assert_eq!(parsed, images);
        assert_eq!(parsed.image_len(), 6);
        assert_eq!(parse_labels(&encode_labels(&[7, 1, 9])).unwrap(), vec![7, 1, 9]);
    }

    #[test]
    fn rejects_wrong_dimension_byte() {
        let mut bytes = encode_labels(&[1, 2]);
        bytes[3] = 0x03;
        let err = parse_labels(&bytes).unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn rejects_truncated_payload() {
        let images = IdxImages { count: 3, rows: 2, cols: 2, pixels: vec![0; 12] };
        let mut bytes = encode_images(&images);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(parse_images(&bytes), Err(Error::Idx(_))));
    }

    #[test]
    fn rejects_short_header() {
        assert!(parse_images(&[0, 0, 8]).is_err());
        assert!(parse_labels(&[0, 0, 8, 1, 0]).is_err());
    }
}
