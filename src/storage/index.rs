//! Secondary index ordering
//!
//! An index is a table's records sorted by one field. Range queries run
//! two binary searches over the sorted sequence; without an index the same
//! answer comes from filtering the full table and sorting the matches.
//! Both paths use [`compare_values`], so they agree record for record.

use std::cmp::Ordering;

use serde_json::Value;

use crate::snapshot::Record;

/// Value of `field` in `record`, `Null` when absent or not an object
pub fn field_value<'a>(record: &'a Record, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&Value::Null)
}

/// Total order over JSON values:
/// null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()).then_with(|| {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    match (as_integer(x), as_integer(y)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(a), None) => compare_integer_float(a, y.as_f64().unwrap_or(f64::NAN)),
        (None, Some(b)) => compare_integer_float(b, x.as_f64().unwrap_or(f64::NAN)).reverse(),
        (None, None) => {
            let (a, b) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            // -0.0 == 0.0, matching the integer 0
            a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
        }
    }
}

fn as_integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Exact comparison of an integer with a float, without rounding the integer
/// through f64
fn compare_integer_float(int: i128, float: f64) -> Ordering {
    if float.is_nan() {
        return Ordering::Less;
    }

    let floor = float.floor();
    // i128::MIN as f64 is exactly -2^127; i128::MAX as f64 rounds up to 2^127
    if floor >= i128::MAX as f64 {
        return Ordering::Less;
    }
    if floor < i128::MIN as f64 {
        return Ordering::Greater;
    }

    match int.cmp(&(floor as i128)) {
        Ordering::Equal if float > floor => Ordering::Less,
        ord => ord,
    }
}

/// Stable sort by `field`; equal values keep their table order
pub fn sort_by_field(records: &mut [Record], field: &str) {
    records.sort_by(|a, b| compare_values(field_value(a, field), field_value(b, field)));
}

/// Half-open bounds `lo..hi` of the records whose `field` lies in `[min, max]`
///
/// `sorted` must be ordered by [`sort_by_field`]. `lo` is the first position
/// whose value is not less than `min`, `hi - 1` the last position whose
/// value is not greater than `max`.
pub fn range_bounds(sorted: &[Record], field: &str, min: &Value, max: &Value) -> (usize, usize) {
    let lo = sorted.partition_point(|r| compare_values(field_value(r, field), min) == Ordering::Less);
    let hi = sorted
        .partition_point(|r| compare_values(field_value(r, field), max) != Ordering::Greater);
    (lo, hi.max(lo))
}

/// Full-scan equivalent of an index lookup
pub fn filter_range(records: &[Record], field: &str, min: &Value, max: &Value) -> Vec<Record> {
    let mut matches: Vec<Record> = records
        .iter()
        .filter(|r| {
            let value = field_value(r, field);
            compare_values(value, min) != Ordering::Less
                && compare_values(value, max) != Ordering::Greater
        })
        .cloned()
        .collect();
    sort_by_field(&mut matches, field);
    matches
}
