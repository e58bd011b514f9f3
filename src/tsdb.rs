//! The top-level `Tsdb` handle: the single entry point over the
//! Descriptor Catalog, Ring Store, and Query Engine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tsdb_catalog::{DescriptorCatalog, MetricRecord};
use tsdb_core::{MetricId, MetricType, Result};
use tsdb_kvstore::KvStore;
use tsdb_query::{QueryEngine, Row};
use tsdb_ring::{RingStore, Sample};
use tsdb_reader::RangeReader;

use crate::labels;
use crate::retry::RetryPolicy;

/// Builder for a [`Tsdb`] handle.
///
/// # Example
///
/// ```ignore
/// let db = Tsdb::builder()
///     .with_retry_policy(RetryPolicy { max_attempts: 5 })
///     .build()?;
/// ```
pub struct TsdbBuilder {
    kv_store: Option<KvStore>,
    retry_policy: RetryPolicy,
}

impl TsdbBuilder {
    /// A builder with a fresh in-memory store and the default retry policy.
    pub fn new() -> Self {
        Self { kv_store: None, retry_policy: RetryPolicy::default() }
    }

    /// Use a specific KV store handle instead of a freshly created one —
    /// e.g. to share one store across two `Tsdb` handles in tests.
    pub fn with_kv_store(mut self, store: KvStore) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Configure the bound on transparent read-only retries (§5).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Build the handle.
    pub fn build(self) -> Result<Tsdb> {
        let store = self.kv_store.unwrap_or_default();
        let catalog = DescriptorCatalog::new(store.clone())
            .with_retry_attempts(self.retry_policy.max_attempts);
        let ring =
            RingStore::new(store).with_retry_attempts(self.retry_policy.max_attempts);
        let reader = RangeReader::new(ring.clone(), catalog.clone());
        let query_engine = QueryEngine::new(reader);
        Ok(Tsdb { catalog, ring, query_engine: Arc::new(query_engine), retry_policy: self.retry_policy })
    }
}

impl Default for TsdbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The database handle. Cheap to clone; every operation opens its own
/// transaction(s) against the shared KV store.
#[derive(Clone)]
pub struct Tsdb {
    catalog: DescriptorCatalog,
    ring: RingStore,
    query_engine: Arc<QueryEngine>,
    retry_policy: RetryPolicy,
}

impl Tsdb {
    /// Open a fresh in-memory database with default settings.
    pub fn new() -> Self {
        TsdbBuilder::new().build().expect("in-memory construction cannot fail")
    }

    /// Start building a database with non-default settings.
    pub fn builder() -> TsdbBuilder {
        TsdbBuilder::new()
    }

    /// The configured retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Lower-level catalog access, for callers that need multi-step
    /// sequencing (e.g. a retention-rewrite or delete workflow).
    pub fn descriptor_catalog(&self) -> &DescriptorCatalog {
        &self.catalog
    }

    /// Lower-level ring-store access.
    pub fn ring_store(&self) -> &RingStore {
        &self.ring
    }

    /// Lower-level query-engine access.
    pub fn query_engine(&self) -> &QueryEngine {
        &self.query_engine
    }

    /// Ingest one gauge sample, creating the metric on first use if
    /// `name` is supplied and it doesn't already exist.
    #[allow(clippy::too_many_arguments)]
    pub fn write_gauge(
        &self,
        metric_id: Option<MetricId>,
        ts: i64,
        value: f32,
        name: Option<&str>,
        tags: &BTreeMap<String, String>,
        step: Option<i32>,
        slots: Option<i32>,
    ) -> Result<MetricId> {
        let id = self.catalog.ensure_descriptor(metric_id, MetricType::Gauge, step, slots, name, tags)?;
        self.ring.write(id, ts, value)?;
        Ok(id)
    }

    /// Ingest one counter sample (a raw, monotonic reading — rate is
    /// computed at query time, never stored).
    #[allow(clippy::too_many_arguments)]
    pub fn write_counter(
        &self,
        metric_id: Option<MetricId>,
        ts: i64,
        raw_value: f32,
        name: Option<&str>,
        tags: &BTreeMap<String, String>,
        step: Option<i32>,
        slots: Option<i32>,
    ) -> Result<MetricId> {
        let id = self.catalog.ensure_descriptor(metric_id, MetricType::Counter, step, slots, name, tags)?;
        self.ring.write(id, ts, raw_value)?;
        Ok(id)
    }

    /// Read every sample in `[start_ts, end_ts]` for one metric.
    pub fn read_range(&self, metric_id: MetricId, start_ts: i64, end_ts: i64) -> Result<Vec<Sample>> {
        self.ring.read_range(metric_id, start_ts, end_ts)
    }

    /// Exact-match lookup by `(name, tags)`.
    pub fn lookup(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<Option<MetricId>> {
        self.catalog.lookup(name, tags)
    }

    /// Tag-subset search, capped at `cap` matches.
    pub fn find(
        &self,
        name: Option<&str>,
        tags_subset: Option<&BTreeMap<String, String>>,
        cap: usize,
    ) -> Result<(Vec<MetricRecord>, bool)> {
        self.catalog.find(name, tags_subset, cap)
    }

    /// Every distinct, non-empty metric name.
    pub fn list_names(&self) -> Result<Vec<String>> {
        self.catalog.list_names()
    }

    /// Tag key -> observed values, optionally scoped to one metric name.
    pub fn tag_catalog(&self, name: Option<&str>) -> Result<BTreeMap<String, BTreeSet<String>>> {
        self.catalog.tag_catalog(name)
    }

    /// A metric's full catalog entry, fetched directly by id.
    pub fn metric_record(&self, metric_id: MetricId) -> Result<Option<MetricRecord>> {
        self.catalog.metric_record(metric_id)
    }

    /// The name a caller should display for `metric_id`: its stored name
    /// if one was ever supplied, else the built-in label table (§4.11),
    /// else `None`.
    pub fn metric_display_name(&self, metric_id: MetricId) -> Result<Option<String>> {
        match self.catalog.metric_record(metric_id)? {
            Some(record) if record.name.is_some() => Ok(record.name),
            _ => Ok(labels::built_in_name(metric_id).map(str::to_string)),
        }
    }

    /// Delete a metric: its samples, metadata, and (best-effort) its
    /// descriptor binding.
    pub fn delete_metric(&self, metric_id: MetricId) -> Result<()> {
        self.catalog.delete_metric(metric_id)
    }

    /// Re-bucket a gauge metric into a new `(step, slots)` ring. Rejects
    /// counters.
    pub fn retention_rewrite(&self, metric_id: MetricId, new_step: i32, new_slots: i32) -> Result<MetricId> {
        self.ring.retention_rewrite(&self.catalog, metric_id, new_step, new_slots)
    }

    /// Run a SQL query over `metric_ids`' samples in `[start_ts, end_ts]`.
    pub fn run_sql(&self, metric_ids: &[MetricId], start_ts: i64, end_ts: i64, sql: &str) -> Result<Vec<Row>> {
        self.query_engine.run_sql(metric_ids, start_ts, end_ts, sql)
    }

    /// Store an opaque dashboard JSON blob under `slug`.
    pub fn put_dashboard(&self, slug: &str, json: &[u8]) -> Result<()> {
        self.catalog.put_dashboard(slug, json)
    }

    /// Fetch a previously stored dashboard blob.
    pub fn get_dashboard(&self, slug: &str) -> Result<Option<Vec<u8>>> {
        self.catalog.get_dashboard(slug)
    }

    /// Delete a dashboard blob. Idempotent.
    pub fn delete_dashboard(&self, slug: &str) -> Result<()> {
        self.catalog.delete_dashboard(slug)
    }
}

impl Default for Tsdb {
    fn default() -> Self {
        Self::new()
    }
}
