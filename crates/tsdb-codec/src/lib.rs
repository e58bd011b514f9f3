//! Deterministic byte layouts for the five key families the storage
//! engine is built on: Value, Meta, Meta-Info, Descriptor, ID counter,
//! and Dashboard.
//!
//! Endianness is deliberate, not incidental: big-endian for identifiers
//! (`metric_id`, `slot`) keeps ordered iteration over those keys matching
//! numeric order, which the Ring Store's segment scans and the
//! Descriptor Catalog's meta-range scan both depend on; little-endian for
//! payloads matches common machine order for fast decode. These layouts
//! must be reproduced bit-exactly — a re-implementation is expected to
//! read and write the same bytes.

mod keys;
mod meta;
mod meta_info;
mod tuple;
mod value_record;

pub use keys::{
    dashboard_key, descriptor_key, id_counter_key, meta_info_key, meta_key, meta_key_full_range,
    value_key, value_key_prefix, value_key_range, TAG_DASHBOARD, TAG_DESCRIPTOR, TAG_ID_COUNTER,
    TAG_META, TAG_META_INFO, TAG_VALUE,
};
pub use meta::{decode_meta, encode_meta, Meta};
pub use meta_info::MetaInfo;
pub use value_record::{decode_value_record, encode_value_record, ValueRecord, VALID_FLAG};
