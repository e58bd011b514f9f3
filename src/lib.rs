//! # tsdb
//!
//! A time-series database layered atop an ordered, transactional
//! key/value store: gauges and counters under a fixed-retention,
//! slotted ring buffer, queried through a SQL engine extended with
//! time-series-aware scalar and window functions.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tsdb::prelude::*;
//!
//! let db = Tsdb::new();
//!
//! let id = db.write_gauge(None, 1_700_000_000, 42.0, Some("cpu_percent"), &Default::default(), Some(10), Some(360))?;
//!
//! let rows = db.run_sql(&[id], 1_699_999_000, 1_700_001_000, "select ts, value from samples order by ts")?;
//! ```
//!
//! ## Progressive Disclosure
//!
//! - **Simple** — `Tsdb::new()` for an in-memory database with default settings.
//! - **Configured** — `Tsdb::builder().with_retry_policy(..).build()?`.
//! - **Full control** — `db.descriptor_catalog()` / `db.ring_store()` / `db.query_engine()`
//!   for callers that need to sequence multiple catalog/ring operations themselves.

#![warn(missing_docs)]

mod labels;
mod retry;
mod selector;
mod tsdb;

pub mod prelude;

pub use retry::RetryPolicy;
pub use selector::{resolve_selectors, substitute_aliases, verify_metric_ids_union, ResolvedSelector, Selector};
pub use tsdb::{Tsdb, TsdbBuilder};

pub use tsdb_catalog::MetricRecord;
pub use tsdb_core::{Error, MetricId, MetricType, Result};
pub use tsdb_query::{Cell, Row};
pub use tsdb_ring::Sample;
