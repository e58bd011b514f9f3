//! The Descriptor Catalog: the exclusive `(name, sorted_tags) <->
//! metric_id` binding, metric metadata (`type`, `step`, `slots`), and the
//! name/tag sidecar used to resolve selectors.

mod record;

pub use record::MetricRecord;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{BTreeMap, BTreeSet};
use tsdb_codec::{
    dashboard_key, decode_meta, descriptor_key, encode_meta, id_counter_key, meta_info_key,
    meta_key, meta_key_full_range, value_key_prefix, Meta, MetaInfo,
};
use tsdb_core::{Error, MetricId, MetricType, Result};
use tsdb_kvstore::{KvStore, Txn};

/// Maps metric names/tags to ids, and ids to their immutable metadata.
///
/// Every operation here opens its own transaction against the shared
/// [`KvStore`] handle; multi-step mutations (allocation + descriptor
/// bind + meta write + meta-info merge) happen inside a single
/// transaction so a concurrent first-write of the same name can only
/// ever succeed once (the loser's id-counter increment conflicts).
#[derive(Clone)]
pub struct DescriptorCatalog {
    store: KvStore,
    retry_attempts: u32,
}

impl DescriptorCatalog {
    /// Wrap a KV store handle. Read-only operations retry up to 3 times
    /// on `ConflictRetryable`; use [`Self::with_retry_attempts`] to
    /// configure a different bound.
    pub fn new(store: KvStore) -> Self {
        Self { store, retry_attempts: 3 }
    }

    /// Override the retry bound read-only operations use (§5's retry
    /// policy, configurable via the top-level builder).
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Resolve or allocate a metric id for `(name, tags)`, create or
    /// validate its Meta record, and merge `name`/`tags` into its
    /// Meta-Info sidecar.
    ///
    /// See the module-level semantics in the system specification:
    /// reusing a bound descriptor requires the stored type to match;
    /// an existing Meta record must match `(step, slots, type)` exactly;
    /// a brand new metric requires `step`/`slots` to be supplied.
    pub fn ensure_descriptor(
        &self,
        metric_id: Option<MetricId>,
        metric_type: MetricType,
        step: Option<i32>,
        slots: Option<i32>,
        name: Option<&str>,
        tags: &BTreeMap<String, String>,
    ) -> Result<MetricId> {
        let mut txn = self.store.begin();
        let sorted_tags: Vec<(String, String)> =
            tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut descriptor_already_bound = false;
        let resolved_id = if let Some(name) = name {
            let dkey = descriptor_key(name, &sorted_tags);
            if let Some(bytes) = txn.get(&dkey) {
                descriptor_already_bound = true;
                decode_id(&bytes)?
            } else if let Some(id) = metric_id {
                id
            } else {
                allocate_id(&mut txn)
            }
        } else {
            metric_id.ok_or_else(|| {
                Error::validation("ensure_descriptor requires either metric_id or name")
            })?
        };

        let mkey = meta_key(resolved_id);
        match txn.get(&mkey) {
            Some(bytes) => {
                let existing = decode_meta(&bytes)?;
                if existing.metric_type != metric_type {
                    return Err(Error::validation(format!(
                        "metric {} type mismatch: stored {:?}, requested {:?}",
                        resolved_id, existing.metric_type, metric_type
                    )));
                }
                if let Some(step) = step {
                    if existing.step != step {
                        return Err(Error::validation(format!(
                            "metric {} step mismatch: stored {}, requested {}",
                            resolved_id, existing.step, step
                        )));
                    }
                }
                if let Some(slots) = slots {
                    if existing.slots != slots {
                        return Err(Error::validation(format!(
                            "metric {} slots mismatch: stored {}, requested {}",
                            resolved_id, existing.slots, slots
                        )));
                    }
                }
            }
            None => {
                let step = step
                    .ok_or_else(|| Error::validation("step is required for a new metric"))?;
                let slots = slots
                    .ok_or_else(|| Error::validation("slots is required for a new metric"))?;
                if step <= 0 {
                    return Err(Error::validation("step must be positive"));
                }
                if slots <= 0 {
                    return Err(Error::validation("slots must be positive"));
                }
                txn.put(mkey, encode_meta(Meta { step, slots, metric_type }));
            }
        }

        if let Some(name) = name {
            if !descriptor_already_bound {
                let dkey = descriptor_key(name, &sorted_tags);
                txn.put(dkey, encode_id(resolved_id));
            }
        }

        let mi_key = meta_info_key(resolved_id);
        let mut meta_info = match txn.get(&mi_key) {
            Some(bytes) => MetaInfo::decode(&bytes)?,
            None => MetaInfo::default(),
        };
        meta_info.merge(name, tags)?;
        txn.put(mi_key, meta_info.encode());

        txn.commit()?;
        Ok(resolved_id)
    }

    /// Exact-match lookup by `(name, tags)`. Does not allocate.
    pub fn lookup(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<Option<MetricId>> {
        self.store.with_retry(self.retry_attempts, |txn| {
            let sorted_tags: Vec<(String, String)> =
                tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            match txn.get(&descriptor_key(name, &sorted_tags)) {
                Some(bytes) => Ok(Some(decode_id(&bytes)?)),
                None => Ok(None),
            }
        })
    }

    /// Linear scan over every metric's metadata, filtered by optional
    /// name equality and tag-subset containment. Returns the matches
    /// (capped at `cap`) and whether the cap was hit.
    pub fn find(
        &self,
        name: Option<&str>,
        tags_subset: Option<&BTreeMap<String, String>>,
        cap: usize,
    ) -> Result<(Vec<MetricRecord>, bool)> {
        self.store.with_retry(self.retry_attempts, |txn| {
            let all = self.scan_all_metrics(txn)?;
            let mut matches: Vec<MetricRecord> = all
                .into_iter()
                .filter(|m| match name {
                    Some(n) => m.name.as_deref() == Some(n),
                    None => true,
                })
                .filter(|m| match tags_subset {
                    Some(subset) => subset.iter().all(|(k, v)| m.tags.get(k) == Some(v)),
                    None => true,
                })
                .collect();
            let hit_limit = matches.len() > cap;
            matches.truncate(cap);
            Ok((matches, hit_limit))
        })
    }

    /// Distinct, non-empty metric names.
    pub fn list_names(&self) -> Result<Vec<String>> {
        self.store.with_retry(self.retry_attempts, |txn| {
            let all = self.scan_all_metrics(txn)?;
            let mut names: BTreeSet<String> =
                all.into_iter().filter_map(|m| m.name).collect();
            Ok(names.drain().collect())
        })
    }

    /// Tag key -> sorted set of observed values, optionally scoped to one
    /// metric name.
    pub fn tag_catalog(&self, name: Option<&str>) -> Result<BTreeMap<String, BTreeSet<String>>> {
        self.store.with_retry(self.retry_attempts, |txn| {
            let all = self.scan_all_metrics(txn)?;
            let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for metric in all {
                if let Some(n) = name {
                    if metric.name.as_deref() != Some(n) {
                        continue;
                    }
                }
                for (k, v) in metric.tags {
                    out.entry(k).or_default().insert(v);
                }
            }
            Ok(out)
        })
    }

    /// Every metric currently in the catalog, full entries, unfiltered.
    /// Used to build the `metrics`/`metric_tags` discovery tables, which
    /// are independent of whatever `metric_ids` a query scoped its
    /// `samples` table to.
    pub fn list_all_metrics(&self) -> Result<Vec<MetricRecord>> {
        self.store.with_retry(self.retry_attempts, |txn| self.scan_all_metrics(txn))
    }

    /// Fetch one metric's full catalog entry directly by id, without a
    /// linear scan. Returns `None` if the metric has no Meta record.
    pub fn metric_record(&self, metric_id: MetricId) -> Result<Option<MetricRecord>> {
        self.store.with_retry(self.retry_attempts, |txn| {
            let meta = match txn.get(&meta_key(metric_id)) {
                Some(bytes) => decode_meta(&bytes)?,
                None => return Ok(None),
            };
            let meta_info = match txn.get(&meta_info_key(metric_id)) {
                Some(bytes) => MetaInfo::decode(&bytes)?,
                None => MetaInfo::default(),
            };
            Ok(Some(MetricRecord {
                metric_id,
                name: meta_info.name,
                tags: meta_info.tags,
                metric_type: meta.metric_type,
                step: meta.step,
                slots: meta.slots,
            }))
        })
    }

    /// Clear a metric's value slots, meta, meta-info, and (best-effort)
    /// its descriptor binding.
    ///
    /// Delete is best-effort and idempotent: if the meta-info record is
    /// missing or fails to decode, the descriptor binding (if any) is
    /// left in place rather than failing the delete — see the open
    /// question on orphaned descriptors in the design notes.
    pub fn delete_metric(&self, metric_id: MetricId) -> Result<()> {
        let mut txn = self.store.begin();
        let mkey = meta_key(metric_id);
        let meta = match txn.get(&mkey) {
            Some(bytes) => decode_meta(&bytes)?,
            None => return Err(Error::NotFound(metric_id)),
        };

        let prefix = value_key_prefix(metric_id);
        let mut end = prefix.clone();
        end.push(0xff);
        for (key, _) in txn.scan(&prefix, &end) {
            txn.delete(key);
        }

        let mi_key = meta_info_key(metric_id);
        match txn.get(&mi_key).map(|b| MetaInfo::decode(&b)) {
            Some(Ok(meta_info)) => {
                if let Some(name) = &meta_info.name {
                    let sorted_tags = meta_info.sorted_tag_pairs();
                    txn.delete(descriptor_key(name, &sorted_tags));
                }
            }
            Some(Err(_)) => {
                tracing::error!(
                    metric_id,
                    "meta-info failed to decode during delete; descriptor binding (if any) left orphaned"
                );
            }
            None => {
                tracing::error!(
                    metric_id,
                    "meta-info missing during delete; descriptor binding (if any) left orphaned"
                );
            }
        }
        txn.delete(mi_key);
        txn.delete(mkey);
        let _ = meta; // meta validated existence; type not otherwise needed here
        txn.commit()
    }

    /// Store an opaque dashboard JSON blob under `slug`. The core does
    /// not interpret its contents.
    pub fn put_dashboard(&self, slug: &str, json: &[u8]) -> Result<()> {
        let mut txn = self.store.begin();
        txn.put(dashboard_key(slug), json.to_vec());
        txn.commit()
    }

    /// Fetch a previously stored dashboard blob.
    pub fn get_dashboard(&self, slug: &str) -> Result<Option<Vec<u8>>> {
        self.store.with_retry(self.retry_attempts, |txn| Ok(txn.get(&dashboard_key(slug))))
    }

    /// Delete a dashboard blob. Idempotent.
    pub fn delete_dashboard(&self, slug: &str) -> Result<()> {
        let mut txn = self.store.begin();
        txn.delete(dashboard_key(slug));
        txn.commit()
    }

    fn scan_all_metrics(&self, txn: &mut Txn) -> Result<Vec<MetricRecord>> {
        let (start, end) = meta_key_full_range();
        let mut out = Vec::new();
        for (key, value) in txn.scan(&start, &end) {
            let metric_id = decode_metric_id_from_meta_key(&key)?;
            let meta = decode_meta(&value)?;
            let meta_info = match txn.get(&meta_info_key(metric_id)) {
                Some(bytes) => MetaInfo::decode(&bytes).unwrap_or_default(),
                None => MetaInfo::default(),
            };
            out.push(MetricRecord {
                metric_id,
                name: meta_info.name,
                tags: meta_info.tags,
                metric_type: meta.metric_type,
                step: meta.step,
                slots: meta.slots,
            });
        }
        Ok(out)
    }
}

fn allocate_id(txn: &mut Txn) -> MetricId {
    let key = id_counter_key();
    let next = match txn.get(&key) {
        Some(bytes) => decode_id(&bytes).unwrap_or(1),
        None => 1,
    };
    txn.put(key, encode_id(next + 1));
    next
}

fn encode_id(id: MetricId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.write_u64::<LittleEndian>(id as u64).unwrap();
    buf
}

fn decode_id(bytes: &[u8]) -> Result<MetricId> {
    if bytes.len() < 8 {
        return Err(Error::DecodeError("id record too short".into()));
    }
    let mut cursor = std::io::Cursor::new(bytes);
    let id = cursor.read_u64::<LittleEndian>().unwrap();
    Ok(id as MetricId)
}

fn decode_metric_id_from_meta_key(key: &[u8]) -> Result<MetricId> {
    if key.len() < 5 {
        return Err(Error::DecodeError("meta key too short".into()));
    }
    let mut cursor = std::io::Cursor::new(&key[1..5]);
    Ok(cursor.read_u32::<byteorder::BigEndian>().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> DescriptorCatalog {
        DescriptorCatalog::new(KvStore::new())
    }

    #[test]
    fn allocates_id_without_caller_supplying_one() {
        let cat = catalog();
        let mut tags = BTreeMap::new();
        tags.insert("env".to_string(), "qa".to_string());
        let id1 = cat
            .ensure_descriptor(None, MetricType::Gauge, Some(2), Some(10), Some("foo"), &tags)
            .unwrap();
        let id2 = cat
            .ensure_descriptor(None, MetricType::Gauge, Some(2), Some(10), Some("foo"), &tags)
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn conflicting_meta_triple_is_rejected() {
        let cat = catalog();
        let id = cat
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), None, &BTreeMap::new())
            .unwrap();
        let err = cat
            .ensure_descriptor(Some(id), MetricType::Gauge, Some(2), Some(5), None, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }

    #[test]
    fn identical_meta_triple_is_idempotent() {
        let cat = catalog();
        let id = cat
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), None, &BTreeMap::new())
            .unwrap();
        let id2 = cat
            .ensure_descriptor(Some(id), MetricType::Gauge, Some(1), Some(5), None, &BTreeMap::new())
            .unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn find_respects_tag_subset_and_cap() {
        let cat = catalog();
        let mut web = BTreeMap::new();
        web.insert("role".to_string(), "web".to_string());
        let mut db = BTreeMap::new();
        db.insert("role".to_string(), "db".to_string());
        cat.ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), Some("cpu"), &web)
            .unwrap();
        cat.ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), Some("cpu"), &db)
            .unwrap();

        let (matches, hit_limit) = cat.find(Some("cpu"), Some(&web), 10).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(!hit_limit);

        let (all_matches, hit_limit) = cat.find(Some("cpu"), None, 1).unwrap();
        assert_eq!(all_matches.len(), 1);
        assert!(hit_limit);
    }

    #[test]
    fn delete_metric_removes_descriptor_binding() {
        let cat = catalog();
        let id = cat
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), Some("cpu"), &BTreeMap::new())
            .unwrap();
        cat.delete_metric(id).unwrap();
        assert_eq!(cat.lookup("cpu", &BTreeMap::new()).unwrap(), None);
        assert!(cat.find(Some("cpu"), None, 10).unwrap().0.is_empty());
    }

    #[test]
    fn metric_record_reads_back_by_id_directly() {
        let cat = catalog();
        let mut tags = BTreeMap::new();
        tags.insert("role".to_string(), "web".to_string());
        let id = cat
            .ensure_descriptor(None, MetricType::Counter, Some(1), Some(5), Some("reqs"), &tags)
            .unwrap();
        let record = cat.metric_record(id).unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("reqs"));
        assert_eq!(record.metric_type, MetricType::Counter);
        assert!(cat.metric_record(id + 1).unwrap().is_none());
    }

    #[test]
    fn dashboard_blob_is_opaque() {
        let cat = catalog();
        cat.put_dashboard("overview", br#"{"widgets":[]}"#).unwrap();
        assert_eq!(
            cat.get_dashboard("overview").unwrap(),
            Some(br#"{"widgets":[]}"#.to_vec())
        );
    }
}
