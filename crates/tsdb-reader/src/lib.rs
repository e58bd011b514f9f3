//! The Range Reader: converts a set of metric ids plus a `(start_ts,
//! end_ts)` window into three Arrow record batches — `samples`,
//! `metrics`, `metric_tags` — the shape the query engine registers as
//! tables for one SQL execution. Nothing here is retained across calls:
//! a fresh set of batches is built per request.

use datafusion::arrow::array::{Float64Array, Int64Array, Int8Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use tsdb_catalog::DescriptorCatalog;
use tsdb_core::{MetricId, Result};
use tsdb_ring::RingStore;

/// The three columnar tables one query's range reader produces.
pub struct MaterializedBatches {
    /// `(metric_id, ts, value, type)` rows, one per in-range sample.
    pub samples: RecordBatch,
    /// `(metric_id, name, type, step, slots)`, one row per metric.
    pub metrics: RecordBatch,
    /// `(metric_id, tag_key, tag_value)`, one row per metric/tag pair.
    pub metric_tags: RecordBatch,
}

/// Builds [`MaterializedBatches`] from a [`RingStore`] and
/// [`DescriptorCatalog`].
#[derive(Clone)]
pub struct RangeReader {
    ring: RingStore,
    catalog: DescriptorCatalog,
}

impl RangeReader {
    /// Wrap the ring store and catalog this reader scans.
    pub fn new(ring: RingStore, catalog: DescriptorCatalog) -> Self {
        Self { ring, catalog }
    }

    /// Read each of `metric_ids`'s range into `samples`. The
    /// `metrics`/`metric_tags` catalog tables are independent of
    /// `metric_ids`: they cover every metric currently in the catalog, so
    /// a query can join against them to discover metrics beyond the ones
    /// its `samples` rows are scoped to.
    pub fn materialize(
        &self,
        metric_ids: &[MetricId],
        start_ts: i64,
        end_ts: i64,
    ) -> Result<MaterializedBatches> {
        let mut s_metric_id = Vec::new();
        let mut s_ts = Vec::new();
        let mut s_value = Vec::new();
        let mut s_type = Vec::new();

        for &metric_id in metric_ids {
            let samples = self.ring.read_range(metric_id, start_ts, end_ts)?;
            for sample in samples {
                s_metric_id.push(metric_id as i64);
                s_ts.push(sample.ts);
                s_value.push(sample.value as f64);
                s_type.push(sample.metric_type.to_byte() as i8);
            }
        }

        let mut m_metric_id = Vec::new();
        let mut m_name: Vec<Option<String>> = Vec::new();
        let mut m_type = Vec::new();
        let mut m_step = Vec::new();
        let mut m_slots = Vec::new();

        let mut t_metric_id = Vec::new();
        let mut t_key = Vec::new();
        let mut t_value = Vec::new();

        for record in self.catalog.list_all_metrics()? {
            m_metric_id.push(record.metric_id as i64);
            m_name.push(record.name);
            m_type.push(record.metric_type.to_byte() as i8);
            m_step.push(record.step as i64);
            m_slots.push(record.slots as i64);

            for (key, value) in record.tags {
                t_metric_id.push(record.metric_id as i64);
                t_key.push(key);
                t_value.push(value);
            }
        }

        let samples = RecordBatch::try_new(
            samples_schema(),
            vec![
                Arc::new(Int64Array::from(s_metric_id)),
                Arc::new(Int64Array::from(s_ts)),
                Arc::new(Float64Array::from(s_value)),
                Arc::new(Int8Array::from(s_type)),
            ],
        )
        .expect("samples batch schema matches its arrays");

        let metrics = RecordBatch::try_new(
            metrics_schema(),
            vec![
                Arc::new(Int64Array::from(m_metric_id)),
                Arc::new(StringArray::from(m_name)),
                Arc::new(Int8Array::from(m_type)),
                Arc::new(Int64Array::from(m_step)),
                Arc::new(Int64Array::from(m_slots)),
            ],
        )
        .expect("metrics batch schema matches its arrays");

        let metric_tags = RecordBatch::try_new(
            metric_tags_schema(),
            vec![
                Arc::new(Int64Array::from(t_metric_id)),
                Arc::new(StringArray::from(t_key)),
                Arc::new(StringArray::from(t_value)),
            ],
        )
        .expect("metric_tags batch schema matches its arrays");

        Ok(MaterializedBatches { samples, metrics, metric_tags })
    }
}

/// The `samples(metric_id, ts, value, type)` schema.
pub fn samples_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("metric_id", DataType::Int64, false),
        Field::new("ts", DataType::Int64, false),
        Field::new("value", DataType::Float64, false),
        Field::new("type", DataType::Int8, false),
    ]))
}

/// The `metrics(metric_id, name, type, step, slots)` schema.
pub fn metrics_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("metric_id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("type", DataType::Int8, false),
        Field::new("step", DataType::Int64, false),
        Field::new("slots", DataType::Int64, false),
    ]))
}

/// The `metric_tags(metric_id, tag_key, tag_value)` schema.
pub fn metric_tags_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("metric_id", DataType::Int64, false),
        Field::new("tag_key", DataType::Utf8, false),
        Field::new("tag_value", DataType::Utf8, false),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tsdb_core::MetricType;
    use tsdb_kvstore::KvStore;

    #[test]
    fn materializes_samples_and_catalog_tables() {
        let store = KvStore::new();
        let catalog = DescriptorCatalog::new(store.clone());
        let ring = RingStore::new(store);
        let mut tags = BTreeMap::new();
        tags.insert("role".to_string(), "web".to_string());
        let id = catalog
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(10), Some("cpu"), &tags)
            .unwrap();
        ring.write(id, 100, 1.5).unwrap();
        ring.write(id, 101, 2.5).unwrap();

        let reader = RangeReader::new(ring, catalog);
        let batches = reader.materialize(&[id], 0, 200).unwrap();
        assert_eq!(batches.samples.num_rows(), 2);
        assert_eq!(batches.metrics.num_rows(), 1);
        assert_eq!(batches.metric_tags.num_rows(), 1);
    }

    #[test]
    fn metrics_and_metric_tags_cover_the_whole_catalog_not_just_metric_ids() {
        let store = KvStore::new();
        let catalog = DescriptorCatalog::new(store.clone());
        let ring = RingStore::new(store);
        let mut tags = BTreeMap::new();
        tags.insert("role".to_string(), "web".to_string());
        let queried = catalog
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(10), Some("cpu"), &tags)
            .unwrap();
        let other = catalog
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(10), Some("mem"), &BTreeMap::new())
            .unwrap();
        ring.write(queried, 100, 1.5).unwrap();
        ring.write(other, 100, 2.5).unwrap();

        let reader = RangeReader::new(ring, catalog);
        let batches = reader.materialize(&[queried], 0, 200).unwrap();

        assert_eq!(batches.samples.num_rows(), 1);
        assert_eq!(batches.metrics.num_rows(), 2);
        assert_eq!(batches.metric_tags.num_rows(), 1);
    }
}
