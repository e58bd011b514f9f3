//! The Ring Store: a fixed-size circular buffer of samples per metric,
//! with transactional write, range read, and gauge-only retention
//! rewrite.

mod sample;

pub use sample::Sample;

use tsdb_codec::{decode_meta, decode_value_record, encode_value_record, meta_key, value_key, value_key_range, VALID_FLAG};
use tsdb_catalog::DescriptorCatalog;
use tsdb_core::{Error, MetricId, MetricType, Result};
use tsdb_kvstore::KvStore;

/// Computes `ts / step` using floor division (matching the reference
/// implementation's behavior, which differs from Rust's truncating `/`
/// for negative operands).
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    a - floor_div(a, b) * b
}

/// The per-metric circular sample buffer.
#[derive(Clone)]
pub struct RingStore {
    store: KvStore,
    retry_attempts: u32,
}

impl RingStore {
    /// Wrap a KV store handle. Range reads retry up to 3 times on
    /// `ConflictRetryable`; use [`Self::with_retry_attempts`] to
    /// configure a different bound.
    pub fn new(store: KvStore) -> Self {
        Self { store, retry_attempts: 3 }
    }

    /// Override the retry bound range reads use (§5's retry policy,
    /// configurable via the top-level builder).
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Write `(ts, value)` into the slot `(ts / step) mod slots`,
    /// overwriting whatever sample previously occupied it without
    /// reading it first.
    pub fn write(&self, metric_id: MetricId, ts: i64, value: f32) -> Result<()> {
        let mut txn = self.store.begin();
        let meta = match txn.get(&meta_key(metric_id)) {
            Some(bytes) => decode_meta(&bytes)?,
            None => return Err(Error::NotFound(metric_id)),
        };
        let window = floor_div(ts, meta.step as i64);
        let slot = floor_mod(window, meta.slots as i64) as u32;
        txn.put(
            value_key(metric_id, slot),
            encode_value_record(window as u32, value, VALID_FLAG),
        );
        txn.commit()
    }

    /// Read every sample in `[start_ts, end_ts]`, sorted ascending by
    /// `ts`. Returns empty if the metric has no Meta record, or if the
    /// requested range covers no windows.
    pub fn read_range(&self, metric_id: MetricId, start_ts: i64, end_ts: i64) -> Result<Vec<Sample>> {
        self.store.with_retry(self.retry_attempts, |txn| {
            let meta = match txn.get(&meta_key(metric_id)) {
                Some(bytes) => decode_meta(&bytes)?,
                None => return Ok(Vec::new()),
            };
            let step = meta.step as i64;
            let slots = meta.slots as i64;

            let start_window = floor_div(start_ts, step);
            let end_window = floor_div(end_ts, step);
            let count = end_window.saturating_sub(start_window).saturating_add(1).min(slots);
            if count <= 0 {
                return Ok(Vec::new());
            }
            let start_slot = floor_mod(start_window, slots) as u32;
            let count = count as u32;
            let slots_u32 = slots as u32;

            let segments: Vec<(u32, u32)> = if start_slot + count <= slots_u32 {
                vec![(start_slot, start_slot + count)]
            } else {
                let first_len = slots_u32 - start_slot;
                vec![(start_slot, slots_u32), (0, count - first_len)]
            };

            let mut samples = Vec::new();
            for (seg_start, seg_end) in segments {
                let (skey, ekey) = value_key_range(metric_id, seg_start, seg_end);
                for (_, raw) in txn.scan(&skey, &ekey) {
                    let record = match decode_value_record(&raw) {
                        Ok(r) => r,
                        Err(_) => continue,
                    };
                    if !record.is_valid() {
                        continue;
                    }
                    let ts = record.window as i64 * step;
                    if ts < start_ts || ts > end_ts {
                        continue;
                    }
                    samples.push(Sample { ts, value: record.value, metric_type: meta.metric_type });
                }
            }
            samples.sort_by_key(|s| s.ts);
            Ok(samples)
        })
    }

    /// Re-bucket a gauge metric into a new `(step, slots)` ring.
    ///
    /// Not atomic across its four steps (snapshot, delete, recreate,
    /// replay): a concurrent write landing in the old ring during the
    /// window between snapshot and delete is lost. Counters are rejected
    /// outright since their slot-wrap reset semantics cannot survive a
    /// re-bucketing.
    pub fn retention_rewrite(
        &self,
        catalog: &DescriptorCatalog,
        metric_id: MetricId,
        new_step: i32,
        new_slots: i32,
    ) -> Result<MetricId> {
        let record = catalog
            .metric_record(metric_id)?
            .ok_or(Error::NotFound(metric_id))?;
        if record.metric_type != MetricType::Gauge {
            return Err(Error::validation("retention rewrite is only supported for gauges"));
        }

        tracing::info!(metric_id, new_step, new_slots, "retention rewrite starting");
        let snapshot = self.read_range(metric_id, 0, i64::MAX)?;

        catalog.delete_metric(metric_id)?;
        catalog.ensure_descriptor(
            Some(metric_id),
            MetricType::Gauge,
            Some(new_step),
            Some(new_slots),
            record.name.as_deref(),
            &record.tags,
        )?;
        for sample in &snapshot {
            self.write(metric_id, sample.ts, sample.value)?;
        }
        tracing::info!(metric_id, replayed = snapshot.len(), "retention rewrite complete");
        Ok(metric_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tsdb_catalog::DescriptorCatalog;

    fn setup(metric_type: MetricType, step: i32, slots: i32) -> (DescriptorCatalog, RingStore, MetricId) {
        let store = KvStore::new();
        let catalog = DescriptorCatalog::new(store.clone());
        let ring = RingStore::new(store);
        let id = catalog
            .ensure_descriptor(None, metric_type, Some(step), Some(slots), None, &BTreeMap::new())
            .unwrap();
        (catalog, ring, id)
    }

    #[test]
    fn ring_wrap_keeps_only_most_recent_slots() {
        let (_cat, ring, id) = setup(MetricType::Gauge, 1, 3);
        let t = 1_000_000i64;
        for (i, v) in [(0, 0.0), (1, 1.0), (2, 2.0), (3, 3.0)] {
            ring.write(id, t + i, v).unwrap();
        }
        let result = ring.read_range(id, t, t + 3).unwrap();
        let ts_values: Vec<(i64, f32)> = result.iter().map(|s| (s.ts, s.value)).collect();
        assert_eq!(ts_values, vec![(t + 1, 1.0), (t + 2, 2.0), (t + 3, 3.0)]);
    }

    #[test]
    fn counter_reset_is_retained_raw() {
        let (_cat, ring, id) = setup(MetricType::Counter, 1, 4);
        let t = 2_000_000i64;
        ring.write(id, t, 100.0).unwrap();
        ring.write(id, t + 1, 90.0).unwrap();
        let result = ring.read_range(id, t, t + 1).unwrap();
        let values: Vec<f32> = result.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![100.0, 90.0]);
    }

    #[test]
    fn read_range_of_missing_metric_is_empty() {
        let store = KvStore::new();
        let ring = RingStore::new(store);
        assert!(ring.read_range(999, 0, 100).unwrap().is_empty());
    }

    #[test]
    fn write_to_missing_metric_is_not_found() {
        let store = KvStore::new();
        let ring = RingStore::new(store);
        let err = ring.write(999, 0, 1.0).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn retention_rewrite_preserves_visible_samples_under_new_shape() {
        let (cat, ring, id) = setup(MetricType::Gauge, 1, 3);
        let t = 5_000_000i64;
        ring.write(id, t, 1.0).unwrap();
        ring.write(id, t + 1, 2.0).unwrap();
        ring.retention_rewrite(&cat, id, 2, 10).unwrap();

        let result = ring.read_range(id, 0, i64::MAX).unwrap();
        let values: Vec<f32> = result.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
        let record = cat.metric_record(id).unwrap().unwrap();
        assert_eq!(record.step, 2);
        assert_eq!(record.slots, 10);
    }

    #[test]
    fn retention_rewrite_rejects_counters() {
        let (cat, ring, id) = setup(MetricType::Counter, 1, 3);
        let err = ring.retention_rewrite(&cat, id, 2, 10).unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }
}
