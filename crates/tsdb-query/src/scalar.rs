//! Scalar UDFs: `ts_bucket`, `align_time`, `clamp`, `null_if_outside`,
//! `series_add/sub/mul/div`, `bucket_rate`, `shift_ts`.
//!
//! Every one of these is NULL-propagating in its own specific way (see
//! each function's doc comment), so rather than writing eight near-
//! identical `ScalarUDFImpl`s, [`SimpleScalarUdf`] is a single generic
//! implementation parameterized by a row-wise closure; argument
//! scalar/array polymorphism is resolved once, at the dispatcher level,
//! by broadcasting every argument into an array before the closure runs.

use datafusion::arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use datafusion::arrow::datatypes::DataType;
use datafusion::common::Result as DFResult;
use datafusion::logical_expr::{ColumnarValue, ScalarUDF, ScalarUDFImpl, Signature, Volatility};
use std::any::Any;
use std::sync::Arc;

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn num_rows(args: &[ColumnarValue]) -> usize {
    args.iter()
        .find_map(|a| match a {
            ColumnarValue::Array(arr) => Some(arr.len()),
            ColumnarValue::Scalar(_) => None,
        })
        .unwrap_or(1)
}

fn to_arrays(args: &[ColumnarValue]) -> DFResult<(Vec<ArrayRef>, usize)> {
    let rows = num_rows(args);
    let arrays = args
        .iter()
        .map(|a| a.clone().into_array(rows))
        .collect::<DFResult<Vec<_>>>()?;
    Ok((arrays, rows))
}

fn i64_at(array: &ArrayRef, i: usize) -> Option<i64> {
    let arr = array.as_any().downcast_ref::<Int64Array>()?;
    if arr.is_null(i) {
        None
    } else {
        Some(arr.value(i))
    }
}

fn f64_at(array: &ArrayRef, i: usize) -> Option<f64> {
    let arr = array.as_any().downcast_ref::<Float64Array>()?;
    if arr.is_null(i) {
        None
    } else {
        Some(arr.value(i))
    }
}

/// A scalar UDF whose per-row logic is a plain Rust closure.
pub struct SimpleScalarUdf {
    name: String,
    signature: Signature,
    return_type: DataType,
    func: Box<dyn Fn(&[ArrayRef], usize) -> DFResult<ArrayRef> + Send + Sync>,
}

impl std::fmt::Debug for SimpleScalarUdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleScalarUdf").field("name", &self.name).finish()
    }
}

impl ScalarUDFImpl for SimpleScalarUdf {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn signature(&self) -> &Signature {
        &self.signature
    }
    fn return_type(&self, _arg_types: &[DataType]) -> DFResult<DataType> {
        Ok(self.return_type.clone())
    }
    fn invoke(&self, args: &[ColumnarValue]) -> DFResult<ColumnarValue> {
        let (arrays, rows) = to_arrays(args)?;
        Ok(ColumnarValue::Array((self.func)(&arrays, rows)?))
    }
}

fn int64_udf(
    name: &str,
    arity: usize,
    func: impl Fn(&[ArrayRef], usize) -> DFResult<ArrayRef> + Send + Sync + 'static,
) -> ScalarUDF {
    ScalarUDF::new_from_impl(SimpleScalarUdf {
        name: name.to_string(),
        signature: Signature::any(arity, Volatility::Immutable),
        return_type: DataType::Int64,
        func: Box::new(func),
    })
}

fn float64_udf(
    name: &str,
    arity: usize,
    func: impl Fn(&[ArrayRef], usize) -> DFResult<ArrayRef> + Send + Sync + 'static,
) -> ScalarUDF {
    ScalarUDF::new_from_impl(SimpleScalarUdf {
        name: name.to_string(),
        signature: Signature::any(arity, Volatility::Immutable),
        return_type: DataType::Float64,
        func: Box::new(func),
    })
}

/// `ts_bucket(ts, step) -> (ts / step) * step`, NULL if either operand is
/// NULL or `step` is zero.
pub fn ts_bucket() -> ScalarUDF {
    int64_udf("ts_bucket", 2, |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let ts = i64_at(&args[0], i);
            let step = i64_at(&args[1], i);
            out.push(match (ts, step) {
                (Some(ts), Some(step)) if step != 0 => Some(floor_div(ts, step) * step),
                _ => None,
            });
        }
        Ok(Arc::new(Int64Array::from(out)))
    })
}

/// `align_time(ts, step, origin?) -> ((ts - origin) / step) * step + origin`.
/// `origin` defaults to 0 when missing or NULL.
pub fn align_time() -> ScalarUDF {
    int64_udf("align_time", 3, |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let ts = i64_at(&args[0], i);
            let step = i64_at(&args[1], i);
            let origin = args.get(2).and_then(|a| i64_at(a, i)).unwrap_or(0);
            out.push(match (ts, step) {
                (Some(ts), Some(step)) if step != 0 => {
                    Some(floor_div(ts - origin, step) * step + origin)
                }
                _ => None,
            });
        }
        Ok(Arc::new(Int64Array::from(out)))
    })
}

/// `clamp(v, lo, hi) -> max(lo, min(v, hi))`, NULL if any argument is NULL.
pub fn clamp() -> ScalarUDF {
    float64_udf("clamp", 3, |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let v = f64_at(&args[0], i);
            let lo = f64_at(&args[1], i);
            let hi = f64_at(&args[2], i);
            out.push(match (v, lo, hi) {
                (Some(v), Some(lo), Some(hi)) => Some(v.min(hi).max(lo)),
                _ => None,
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `null_if_outside(v, lo, hi) -> v if lo <= v <= hi else NULL`.
pub fn null_if_outside() -> ScalarUDF {
    float64_udf("null_if_outside", 3, |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let v = f64_at(&args[0], i);
            let lo = f64_at(&args[1], i);
            let hi = f64_at(&args[2], i);
            out.push(match (v, lo, hi) {
                (Some(v), Some(lo), Some(hi)) if v >= lo && v <= hi => Some(v),
                _ => None,
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

fn series_binop(name: &'static str, op: impl Fn(f64, f64) -> Option<f64> + Send + Sync + 'static) -> ScalarUDF {
    float64_udf(name, 2, move |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let a = f64_at(&args[0], i);
            let b = f64_at(&args[1], i);
            out.push(match (a, b) {
                (Some(a), Some(b)) => op(a, b),
                _ => None,
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// Elementwise `a + b`. NULL if either operand is NULL.
pub fn series_add() -> ScalarUDF {
    series_binop("series_add", |a, b| Some(a + b))
}

/// Elementwise `a - b`. NULL if either operand is NULL.
pub fn series_sub() -> ScalarUDF {
    series_binop("series_sub", |a, b| Some(a - b))
}

/// Elementwise `a * b`. NULL if either operand is NULL.
pub fn series_mul() -> ScalarUDF {
    series_binop("series_mul", |a, b| Some(a * b))
}

/// Elementwise `a / b`. NULL if either operand is NULL, or if `b` is 0.
pub fn series_div() -> ScalarUDF {
    series_binop("series_div", |a, b| if b == 0.0 { None } else { Some(a / b) })
}

/// `bucket_rate(curr, prev, bucket_seconds) -> (curr - prev) / bucket_seconds`.
/// NULL if any argument is NULL, `bucket_seconds <= 0`, or `curr < prev`
/// (treated as a counter reset).
pub fn bucket_rate() -> ScalarUDF {
    float64_udf("bucket_rate", 3, |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let curr = f64_at(&args[0], i);
            let prev = f64_at(&args[1], i);
            let bucket_seconds = i64_at(&args[2], i);
            out.push(match (curr, prev, bucket_seconds) {
                (Some(curr), Some(prev), Some(b)) if b > 0 && curr >= prev => {
                    Some((curr - prev) / b as f64)
                }
                _ => None,
            });
        }
        Ok(Arc::new(Float64Array::from(out)))
    })
}

/// `shift_ts(ts, offset) -> ts + offset`. NULL-propagating.
pub fn shift_ts() -> ScalarUDF {
    int64_udf("shift_ts", 2, |args, rows| {
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let ts = i64_at(&args[0], i);
            let offset = i64_at(&args[1], i);
            out.push(match (ts, offset) {
                (Some(ts), Some(offset)) => Some(ts + offset),
                _ => None,
            });
        }
        Ok(Arc::new(Int64Array::from(out)))
    })
}

/// Every scalar UDF this engine registers.
pub fn all() -> Vec<ScalarUDF> {
    vec![
        ts_bucket(),
        align_time(),
        clamp(),
        null_if_outside(),
        series_add(),
        series_sub(),
        series_mul(),
        series_div(),
        bucket_rate(),
        shift_ts(),
    ]
}
