//! Convenient imports.
//!
//! ```ignore
//! use tsdb::prelude::*;
//!
//! let db = Tsdb::new();
//! db.write_gauge(None, 0, 1.0, Some("cpu"), &Default::default(), Some(10), Some(100))?;
//! ```

pub use crate::{
    resolve_selectors, substitute_aliases, verify_metric_ids_union, Cell, Error, MetricId,
    MetricRecord, MetricType, ResolvedSelector, RetryPolicy, Result, Row, Sample, Selector, Tsdb,
    TsdbBuilder,
};
