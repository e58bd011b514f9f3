//! Built-in `metric_id -> name` labels for the common OS-level metrics a
//! collector shell would report without ever registering a display name.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tsdb_core::MetricId;

static BUILTIN_LABELS: Lazy<HashMap<MetricId, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (3001, "cpu_percent"),
        (3002, "load_avg_1m"),
        (3003, "mem_used_percent"),
        (3004, "disk_used_percent"),
        (3010, "disk_read_bytes"),
        (3011, "disk_write_bytes"),
        (3020, "net_bytes_sent"),
        (3021, "net_bytes_recv"),
    ])
});

/// The built-in display name for `metric_id`, if it's one of the reserved
/// OS-metric ids. Does not consult stored metadata.
pub fn built_in_name(metric_id: MetricId) -> Option<&'static str> {
    BUILTIN_LABELS.get(&metric_id).copied()
}
