use std::collections::BTreeMap;
use tsdb_core::{MetricId, MetricType};

/// A metric's full catalog entry: identity, configuration, and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// The metric's id.
    pub metric_id: MetricId,
    /// Display name, if one was ever supplied.
    pub name: Option<String>,
    /// Tags observed for this metric.
    pub tags: BTreeMap<String, String>,
    /// Gauge or counter.
    pub metric_type: MetricType,
    /// Seconds per sample window.
    pub step: i32,
    /// Ring capacity.
    pub slots: i32,
}
