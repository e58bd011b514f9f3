//! Window UDFs: `diff`, `period_diff`, `pct_change`, `rolling_mean`,
//! `rolling_sum`, `counter_rate`.
//!
//! All six are inherently sequential (each row looks back at earlier rows
//! in the same ordered partition), so they're built on `evaluate_all`
//! rather than the bounded/streaming `evaluate` path: DataFusion hands us
//! the whole partition, already sorted, and we walk it once.

use datafusion::arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use datafusion::arrow::datatypes::{DataType, Field};
use datafusion::common::Result as DFResult;
use datafusion::logical_expr::{
    PartitionEvaluator, Signature, Volatility, WindowUDF, WindowUDFImpl, WindowUDFFieldArgs,
};
use std::any::Any;
use std::sync::Arc;

use crate::coerce::coerce_periods;

fn f64_at(array: &ArrayRef, i: usize) -> Option<f64> {
    let arr = array.as_any().downcast_ref::<Float64Array>()?;
    if arr.is_null(i) {
        None
    } else {
        Some(arr.value(i))
    }
}

fn i64_array(array: &ArrayRef) -> Option<&Int64Array> {
    array.as_any().downcast_ref::<Int64Array>()
}

type EvalFn = dyn Fn(&[ArrayRef], usize) -> DFResult<ArrayRef> + Send + Sync;

struct ClosureEvaluator {
    func: Arc<EvalFn>,
}

impl std::fmt::Debug for ClosureEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureEvaluator").finish()
    }
}

impl PartitionEvaluator for ClosureEvaluator {
    fn evaluate_all(&mut self, values: &[ArrayRef], num_rows: usize) -> DFResult<ArrayRef> {
        (self.func)(values, num_rows)
    }
}

pub struct SimpleWindowUdf {
    name: String,
    signature: Signature,
    return_type: DataType,
    func: Arc<EvalFn>,
}

impl std::fmt::Debug for SimpleWindowUdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleWindowUdf").field("name", &self.name).finish()
    }
}

impl WindowUDFImpl for SimpleWindowUdf {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn signature(&self) -> &Signature {
        &self.signature
    }
    fn partition_evaluator(&self) -> DFResult<Box<dyn PartitionEvaluator>> {
        Ok(Box::new(ClosureEvaluator { func: self.func.clone() }))
    }
    fn field(&self, field_args: WindowUDFFieldArgs) -> DFResult<Field> {
        Ok(Field::new(field_args.name(), self.return_type.clone(), true))
    }
}

fn window_udf(
    name: &str,
    arity: usize,
    func: impl Fn(&[ArrayRef], usize) -> DFResult<ArrayRef> + Send + Sync + 'static,
) -> WindowUDF {
    WindowUDF::new_from_impl(SimpleWindowUdf {
        name: name.to_string(),
        signature: Signature::any(arity, Volatility::Immutable),
        return_type: DataType::Float64,
        func: Arc::new(func),
    })
}

/// `diff(value, periods) -> value[i] - value[i-periods]`. `periods`
/// defaults to 1 when missing, NULL, or non-positive. NULL before enough
/// history exists or when either endpoint is NULL. Identical semantics to
/// `period_diff`, kept as a separate registration since both names are
/// used interchangeably by callers.
pub fn diff() -> WindowUDF {
    window_udf("diff", 2, |values, rows| {
        let periods_arr = values.get(1).and_then(i64_array);
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let periods = coerce_periods(periods_arr, i) as usize;
            out.push(if i < periods {
                None
            } else {
                match (f64_at(&values[0], i), f64_at(&values[0], i - periods)) {
                    (Some(curr), Some(prev)) => Some(curr - prev),
                    _ => None,
                }
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `period_diff(value, periods) -> value[i] - value[i-periods]`. `periods`
/// defaults to 1 when missing, NULL, or non-positive. NULL before enough
/// history exists or when either endpoint is NULL.
pub fn period_diff() -> WindowUDF {
    window_udf("period_diff", 2, |values, rows| {
        let periods_arr = values.get(1).and_then(i64_array);
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let periods = coerce_periods(periods_arr, i) as usize;
            out.push(if i < periods {
                None
            } else {
                match (f64_at(&values[0], i), f64_at(&values[0], i - periods)) {
                    (Some(curr), Some(prev)) => Some(curr - prev),
                    _ => None,
                }
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `pct_change(value, periods) -> (value[i] - value[i-periods]) / value[i-periods]`.
/// NULL before enough history exists, when either endpoint is NULL, or when
/// the denominator is zero.
pub fn pct_change() -> WindowUDF {
    window_udf("pct_change", 2, |values, rows| {
        let periods_arr = values.get(1).and_then(i64_array);
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let periods = coerce_periods(periods_arr, i) as usize;
            out.push(if i < periods {
                None
            } else {
                match (f64_at(&values[0], i), f64_at(&values[0], i - periods)) {
                    (Some(curr), Some(prev)) if prev != 0.0 => Some((curr - prev) / prev),
                    _ => None,
                }
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `rolling_mean(value, periods) -> mean of the last `periods` values ending
/// at the current row`, ignoring NULLs inside the window. NULL only when
/// every value in the window is NULL.
pub fn rolling_mean() -> WindowUDF {
    window_udf("rolling_mean", 2, |values, rows| {
        let periods_arr = values.get(1).and_then(i64_array);
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let periods = coerce_periods(periods_arr, i) as usize;
            let start = i + 1 - periods.min(i + 1);
            let mut sum = 0.0;
            let mut count = 0usize;
            for j in start..=i {
                if let Some(v) = f64_at(&values[0], j) {
                    sum += v;
                    count += 1;
                }
            }
            out.push(if count == 0 { None } else { Some(sum / count as f64) });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `rolling_sum(value, periods) -> sum of the last `periods` values ending
/// at the current row`, ignoring NULLs inside the window. NULL only when
/// every value in the window is NULL.
pub fn rolling_sum() -> WindowUDF {
    window_udf("rolling_sum", 2, |values, rows| {
        let periods_arr = values.get(1).and_then(i64_array);
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let periods = coerce_periods(periods_arr, i) as usize;
            let start = i + 1 - periods.min(i + 1);
            let mut sum = 0.0;
            let mut count = 0usize;
            for j in start..=i {
                if let Some(v) = f64_at(&values[0], j) {
                    sum += v;
                    count += 1;
                }
            }
            out.push(if count == 0 { None } else { Some(sum) });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `counter_rate(value, ts) -> (value[i] - value[i-1]) / (ts[i] - ts[i-1])`.
/// NULL at the first row, when any operand is NULL, when `ts[i] <= ts[i-1]`,
/// or when `value[i] < value[i-1]` (a counter reset).
pub fn counter_rate() -> WindowUDF {
    window_udf("counter_rate", 2, |values, rows| {
        let ts_arr = values.get(1).and_then(i64_array);
        let ts_at = |i: usize| ts_arr.and_then(|arr| if arr.is_null(i) { None } else { Some(arr.value(i)) });
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            out.push(if i == 0 {
                None
            } else {
                match (f64_at(&values[0], i), f64_at(&values[0], i - 1), ts_at(i), ts_at(i - 1)) {
                    (Some(curr), Some(prev), Some(t1), Some(t0)) if t1 > t0 && curr >= prev => {
                        Some((curr - prev) / (t1 - t0) as f64)
                    }
                    _ => None,
                }
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// Every window UDF this engine registers.
pub fn all() -> Vec<WindowUDF> {
    vec![diff(), period_diff(), pct_change(), rolling_mean(), rolling_sum(), counter_rate()]
}
