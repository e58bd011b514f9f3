//! The fixed-format record stored at a Value key: `window:LE32 ‖
//! value:LEf32 ‖ flags:u8`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use tsdb_core::{Error, Result};

/// Bit 0 of `flags`: the slot holds a live sample. If clear, the slot is
/// logically empty regardless of what bytes happen to be stored there.
pub const VALID_FLAG: u8 = 0x01;

/// A decoded Value record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRecord {
    /// `ts / step`, the integer window index this sample belongs to.
    pub window: u32,
    /// The raw sample value (gauge reading or counter raw value).
    pub value: f32,
    /// Flag byte; only bit 0 (`VALID_FLAG`) is currently defined.
    pub flags: u8,
}

impl ValueRecord {
    /// Whether this slot currently holds a live sample.
    pub fn is_valid(&self) -> bool {
        self.flags & VALID_FLAG != 0
    }
}

/// Encode `(window, value, VALID)` into the fixed 9-byte wire format.
pub fn encode_value_record(window: u32, value: f32, flags: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    buf.write_u32::<LittleEndian>(window).unwrap();
    buf.write_f32::<LittleEndian>(value).unwrap();
    buf.write_u8(flags).unwrap();
    buf
}

/// Decode a Value record.
///
/// Returns [`Error::DecodeError`] if the record is shorter than the fixed
/// 9-byte format or carries flag bits this codec doesn't recognize — both
/// cases the Ring Store treats as "skip this sample" rather than failing
/// the whole range read, to stay forward-compatible with partial writes.
pub fn decode_value_record(bytes: &[u8]) -> Result<ValueRecord> {
    if bytes.len() < 9 {
        return Err(Error::DecodeError(format!(
            "value record too short: {} bytes, need 9",
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    let window = cursor.read_u32::<LittleEndian>().unwrap();
    let value = cursor.read_f32::<LittleEndian>().unwrap();
    let flags = cursor.read_u8().unwrap();
    if flags & !VALID_FLAG != 0 {
        return Err(Error::DecodeError(format!(
            "value record has unrecognized flag bits: {:#04x}",
            flags
        )));
    }
    Ok(ValueRecord { window, value, flags })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let encoded = encode_value_record(42, 3.5, VALID_FLAG);
        let decoded = decode_value_record(&encoded).unwrap();
        assert_eq!(decoded.window, 42);
        assert_eq!(decoded.value, 3.5);
        assert!(decoded.is_valid());
    }

    #[test]
    fn short_record_is_decode_error() {
        assert!(decode_value_record(&[0u8; 4]).is_err());
    }

    #[test]
    fn unrecognized_flag_bits_are_decode_error() {
        let mut encoded = encode_value_record(1, 1.0, VALID_FLAG);
        *encoded.last_mut().unwrap() = 0xFE;
        assert!(decode_value_record(&encoded).is_err());
    }
}
