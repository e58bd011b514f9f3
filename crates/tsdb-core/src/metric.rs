//! The metric identifier and type enum shared by every layer.

/// A metric identifier. Fits in 32 bits; values outside that range are
/// rejected at the API boundary (see [`crate::Error::ValidationError`]).
pub type MetricId = u32;

/// The two kinds of series this store can hold.
///
/// Encoded as a single byte in the Meta record (`0` gauge, `1` counter).
/// Immutable for the lifetime of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// An instantaneous value.
    Gauge,
    /// A raw, monotonically non-decreasing value. Rate is a query-time
    /// computation, never a storage concern.
    Counter,
}

impl MetricType {
    /// Encode as the wire byte used by the Meta key family.
    pub fn to_byte(self) -> u8 {
        match self {
            MetricType::Gauge => 0,
            MetricType::Counter => 1,
        }
    }

    /// Decode the wire byte used by the Meta key family.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(MetricType::Gauge),
            1 => Some(MetricType::Counter),
            _ => None,
        }
    }
}
