use tsdb_core::MetricType;

/// One decoded, in-range sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Reconstructed from the stored window: `window * step`.
    pub ts: i64,
    /// The raw stored value.
    pub value: f32,
    /// Gauge or counter, from the metric's Meta record.
    pub metric_type: MetricType,
}
