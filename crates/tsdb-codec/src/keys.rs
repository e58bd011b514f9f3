//! Key construction for all six key families.

use crate::tuple::{pack_tuple, TupleElement};
use byteorder::{BigEndian, WriteBytesExt};
use tsdb_core::MetricId;

/// Value key family tag.
pub const TAG_VALUE: u8 = 0x01;
/// Meta key family tag.
pub const TAG_META: u8 = 0x02;
/// Meta-Info key family tag.
pub const TAG_META_INFO: u8 = 0x04;
/// Descriptor key family tag (tuple-packed).
pub const TAG_DESCRIPTOR: u8 = 5;
/// ID counter key family tag (tuple-packed).
pub const TAG_ID_COUNTER: u8 = 6;
/// Dashboard key family tag (tuple-packed).
pub const TAG_DASHBOARD: u8 = 7;

/// `0x01 ‖ metric_id:BE32 ‖ slot:BE32`.
pub fn value_key(metric_id: MetricId, slot: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(TAG_VALUE);
    key.write_u32::<BigEndian>(metric_id).unwrap();
    key.write_u32::<BigEndian>(slot).unwrap();
    key
}

/// `0x01 ‖ metric_id:BE32`, the common prefix of every slot belonging to
/// one metric. Used to build scan bounds.
pub fn value_key_prefix(metric_id: MetricId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(TAG_VALUE);
    key.write_u32::<BigEndian>(metric_id).unwrap();
    key
}

/// Inclusive/exclusive scan bounds `[value_key(metric_id, start_slot),
/// value_key(metric_id, end_slot_exclusive))` for one contiguous segment
/// of slots within a metric's ring.
pub fn value_key_range(metric_id: MetricId, start_slot: u32, end_slot_exclusive: u32) -> (Vec<u8>, Vec<u8>) {
    (value_key(metric_id, start_slot), value_key(metric_id, end_slot_exclusive))
}

/// `0x02 ‖ metric_id:BE32`.
pub fn meta_key(metric_id: MetricId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(TAG_META);
    key.write_u32::<BigEndian>(metric_id).unwrap();
    key
}

/// `0x04 ‖ metric_id:BE32`.
pub fn meta_info_key(metric_id: MetricId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(TAG_META_INFO);
    key.write_u32::<BigEndian>(metric_id).unwrap();
    key
}

/// `(5, name, [(k,v), …])` with tag pairs already sorted by key.
pub fn descriptor_key(name: &str, sorted_tags: &[(String, String)]) -> Vec<u8> {
    pack_tuple(
        TAG_DESCRIPTOR,
        &[
            TupleElement::Str(name),
            TupleElement::Pairs(sorted_tags),
        ],
    )
}

/// `(6,)`.
pub fn id_counter_key() -> Vec<u8> {
    pack_tuple(TAG_ID_COUNTER, &[])
}

/// `(7, slug)`.
pub fn dashboard_key(slug: &str) -> Vec<u8> {
    pack_tuple(TAG_DASHBOARD, &[TupleElement::Str(slug)])
}

/// Scan bounds `[meta_key(0), meta_key(u32::MAX)]` covering every metric's
/// Meta record, used by the Descriptor Catalog's linear `find` scan.
pub fn meta_key_full_range() -> (Vec<u8>, Vec<u8>) {
    let start = meta_key(0);
    let mut end = meta_key(u32::MAX);
    end.push(0xff);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_key_is_nine_bytes_and_be_ordered() {
        let a = value_key(1, 0);
        let b = value_key(1, 1);
        let c = value_key(2, 0);
        assert_eq!(a.len(), 9);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn meta_and_value_keys_never_collide() {
        assert_ne!(meta_key(1)[0], value_key(1, 0)[0]);
    }

    #[test]
    fn descriptor_key_is_deterministic() {
        let tags = vec![("env".to_string(), "qa".to_string())];
        assert_eq!(descriptor_key("foo", &tags), descriptor_key("foo", &tags));
        assert_ne!(descriptor_key("foo", &tags), descriptor_key("bar", &tags));
    }
}
