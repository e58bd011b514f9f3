//! The Meta record: `step:LEi32 ‖ slots:LEi32 ‖ type:u8`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use tsdb_core::{Error, MetricType, Result};

/// A metric's immutable configuration: its sample cadence, ring capacity,
/// and whether it is a gauge or a counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meta {
    /// Seconds per sample window. Must be positive.
    pub step: i32,
    /// Ring capacity. Must be positive.
    pub slots: i32,
    /// Gauge or counter.
    pub metric_type: MetricType,
}

/// Encode a Meta record.
pub fn encode_meta(meta: Meta) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    buf.write_i32::<LittleEndian>(meta.step).unwrap();
    buf.write_i32::<LittleEndian>(meta.slots).unwrap();
    buf.write_u8(meta.metric_type.to_byte()).unwrap();
    buf
}

/// Decode a Meta record.
pub fn decode_meta(bytes: &[u8]) -> Result<Meta> {
    if bytes.len() < 9 {
        return Err(Error::DecodeError(format!(
            "meta record too short: {} bytes, need 9",
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    let step = cursor.read_i32::<LittleEndian>().unwrap();
    let slots = cursor.read_i32::<LittleEndian>().unwrap();
    let type_byte = cursor.read_u8().unwrap();
    let metric_type = MetricType::from_byte(type_byte)
        .ok_or_else(|| Error::DecodeError(format!("unknown metric type byte: {}", type_byte)))?;
    Ok(Meta { step, slots, metric_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let meta = Meta { step: 10, slots: 60, metric_type: MetricType::Counter };
        let decoded = decode_meta(&encode_meta(meta)).unwrap();
        assert_eq!(decoded, meta);
    }
}
