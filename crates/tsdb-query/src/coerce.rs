//! A single typed helper shared by every window function that takes a
//! "periods"/"window" argument: default to 1 when the argument is
//! missing or non-positive, rather than handling that polymorphism
//! per-function.

use datafusion::arrow::array::{Array, Int64Array};

/// Read the periods/window argument at row `i`, substituting the default
/// when the array is absent, the value at `i` is NULL, or non-positive.
pub fn coerce_periods(periods: Option<&Int64Array>, i: usize) -> i64 {
    match periods {
        Some(arr) if !arr.is_null(i) => {
            let v = arr.value(i);
            if v > 0 {
                v
            } else {
                1
            }
        }
        _ => 1,
    }
}
