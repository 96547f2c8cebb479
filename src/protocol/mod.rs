//! Fixed-layout HID report codecs.
//!
//! Every report starts with a one-byte report ID and has a fixed size. Multi-byte
//! fields are little-endian unless a field says otherwise; nothing here depends on
//! host byte order. Decoding rejects buffers that are too short or carry the wrong
//! ID instead of guessing.

pub mod radio;
pub mod rift;
pub mod vive;

use crate::error::DecodeError;

// -- USB identifiers --
pub const VID_OCULUS: u16 = 0x2833;
pub const PID_RIFT_DK2: u16 = 0x0021;
pub const PID_RIFT_CV1: u16 = 0x0031;
pub const VID_VALVE: u16 = 0x28DE;
pub const PID_VIVE_CONTROLLER_USB: u16 = 0x2012;

/// Largest report exchanged with any supported device.
pub const MAX_REPORT_SIZE: usize = 64;

/// A fixed-size report with a leading ID byte.
pub trait Report: Sized {
    const ID: u8;
    const SIZE: usize;

    /// Decodes fields from a buffer already checked by [`check_header`].
    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError>;

    /// Writes fields into a zeroed `SIZE`-byte buffer whose ID byte is set.
    fn encode_fields(&self, buf: &mut [u8]);

    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        check_header(buf, Self::ID, Self::SIZE)?;
        Self::decode_fields(&buf[..Self::SIZE])
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        buf[0] = Self::ID;
        self.encode_fields(&mut buf);
        buf
    }

    /// Zeroed request buffer for a GET_FEATURE of this report.
    fn request() -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        buf[0] = Self::ID;
        buf
    }
}

/// Validates length and leading ID byte of a report buffer.
pub fn check_header(buf: &[u8], id: u8, size: usize) -> Result<(), DecodeError> {
    if buf.len() < size {
        return Err(DecodeError::TooShort {
            id,
            expected: size,
            actual: buf.len(),
        });
    }
    if buf[0] != id {
        return Err(DecodeError::WrongId {
            expected: id,
            actual: buf[0],
        });
    }
    Ok(())
}

pub(crate) fn le16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn le32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn be64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(bytes)
}

pub(crate) fn put_le16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_le32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_be64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_be_bytes());
}

/// Unpacks three signed 21-bit lanes from a 64-bit word.
///
/// Lane 0 occupies bits 63..43, lane 1 bits 42..22, lane 2 bits 21..1. Bit 0 is
/// unused.
pub fn unpack_3x21(word: u64) -> [i32; 3] {
    let w = word as i64;
    [
        (w >> 43) as i32,
        ((w << 21) >> 43) as i32,
        ((w << 42) >> 43) as i32,
    ]
}

/// Inverse of [`unpack_3x21`]. Lanes are truncated to 21 bits.
pub fn pack_3x21(lanes: [i32; 3]) -> u64 {
    const MASK: u64 = (1 << 21) - 1;
    ((lanes[0] as u64 & MASK) << 43)
        | ((lanes[1] as u64 & MASK) << 22)
        | ((lanes[2] as u64 & MASK) << 1)
}

/// Collects the leading run of bytes accepted by `keep` into a string.
pub(crate) fn extract_prefix(data: &[u8], keep: impl Fn(u8) -> bool) -> String {
    let end = data.iter().position(|&b| !keep(b)).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

/// Formats a buffer as space-separated hex for diagnostics.
pub fn hex_dump(buf: &[u8]) -> String {
    buf.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_header() {
        assert_eq!(
            check_header(&[0x0b, 0, 0], 0x0b, 4),
            Err(DecodeError::TooShort {
                id: 0x0b,
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            check_header(&[0x0c, 0, 0, 0], 0x0b, 4),
            Err(DecodeError::WrongId {
                expected: 0x0b,
                actual: 0x0c
            })
        );
        assert_eq!(check_header(&[0x0b, 0, 0, 0, 0], 0x0b, 4), Ok(()));
    }

    #[test]
    fn test_unpack_3x21_sign_extension() {
        // x = -1, y = 1, z = -1048576 (most negative 21-bit value)
        let word = (0x1F_FFFFu64 << 43) | (1u64 << 22) | (0x10_0000u64 << 1);
        assert_eq!(unpack_3x21(word), [-1, 1, -1_048_576]);
    }

    #[test]
    fn test_unpack_3x21_lanes_do_not_bleed() {
        // Only lane 1 set to its maximum: lanes 0 and 2 must stay zero.
        let word = 0x0F_FFFFu64 << 22;
        assert_eq!(unpack_3x21(word), [0, 1_048_575, 0]);
        assert_eq!(pack_3x21([0, 1_048_575, 0]), word);
    }

    #[test]
    fn test_pack_3x21_ignores_bit_zero() {
        let lanes = [12345, -6789, 1_000_000];
        let word = pack_3x21(lanes);
        assert_eq!(word & 1, 0);
        assert_eq!(unpack_3x21(word | 1), lanes);
    }

    #[test]
    fn test_extract_prefix() {
        assert_eq!(extract_prefix(b"WMHD1234\0junk", |b| b.is_ascii_alphanumeric()), "WMHD1234");
        assert_eq!(extract_prefix(b"ABC", |b| b.is_ascii_alphanumeric()), "ABC");
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x0c, 0x00, 0xff]), "0c 00 ff");
    }
}
