//! Per-group aggregate accumulation. The executor's projection stage
//! drives one [`AggregateAccumulator`] per aggregate expression per group,
//! feeding it one evaluated argument value at a time as rows in the group
//! are consumed, then reads back a final [`Value`] once the group closes.

use crate::ast::AggregateFunction;
use crate::evaluator::compare;
use nornicdb_api::Value;

#[derive(Debug, Clone)]
pub enum AggregateAccumulator {
    Count {
        distinct: bool,
        seen: Vec<Value>,
        count: i64,
    },
    CountStar(i64),
    Sum {
        total: f64,
        any_float: bool,
        count: i64,
    },
    Avg {
        total: f64,
        count: i64,
    },
    Min(Option<Value>),
    Max(Option<Value>),
    Collect {
        distinct: bool,
        items: Vec<Value>,
    },
    StdDev(Vec<f64>),
    PercentileCont {
        values: Vec<f64>,
        fraction: f64,
    },
    PercentileDisc {
        values: Vec<f64>,
        fraction: f64,
    },
}

impl AggregateAccumulator {
    pub fn new(function: AggregateFunction, distinct: bool, fraction: f64) -> Self {
        match function {
            AggregateFunction::Count => AggregateAccumulator::Count {
                distinct,
                seen: Vec::new(),
                count: 0,
            },
            AggregateFunction::CountDistinctStar => AggregateAccumulator::CountStar(0),
            AggregateFunction::Sum => AggregateAccumulator::Sum {
                total: 0.0,
                any_float: false,
                count: 0,
            },
            AggregateFunction::Avg => AggregateAccumulator::Avg {
                total: 0.0,
                count: 0,
            },
            AggregateFunction::Min => AggregateAccumulator::Min(None),
            AggregateFunction::Max => AggregateAccumulator::Max(None),
            AggregateFunction::Collect => AggregateAccumulator::Collect {
                distinct,
                items: Vec::new(),
            },
            AggregateFunction::StdDev => AggregateAccumulator::StdDev(Vec::new()),
            AggregateFunction::PercentileCont => AggregateAccumulator::PercentileCont {
                values: Vec::new(),
                fraction,
            },
            AggregateFunction::PercentileDisc => AggregateAccumulator::PercentileDisc {
                values: Vec::new(),
                fraction,
            },
        }
    }

    /// Feeds one row's evaluated argument value into the accumulator.
    /// `Null` is ignored by every aggregate except `count(*)`, matching
    /// Cypher's aggregation semantics.
    pub fn update(&mut self, value: &Value) {
        match self {
            AggregateAccumulator::CountStar(n) => *n += 1,
            _ if value.is_null() => {}
            AggregateAccumulator::Count {
                distinct,
                seen,
                count,
            } => {
                if *distinct {
                    if seen.iter().any(|s| s == value) {
                        return;
                    }
                    seen.push(value.clone());
                }
                *count += 1;
            }
            AggregateAccumulator::Sum {
                total,
                any_float,
                count,
            } => {
                if let Some(f) = value.as_f64() {
                    *total += f;
                    *count += 1;
                    if matches!(value, Value::Float(_)) {
                        *any_float = true;
                    }
                }
            }
            AggregateAccumulator::Avg { total, count } => {
                if let Some(f) = value.as_f64() {
                    *total += f;
                    *count += 1;
                }
            }
            AggregateAccumulator::Min(current) => {
                if current.as_ref().map_or(true, |cur| {
                    nornicdb_api::value::order_compare(value, cur) == std::cmp::Ordering::Less
                }) {
                    *current = Some(value.clone());
                }
            }
            AggregateAccumulator::Max(current) => {
                if current.as_ref().map_or(true, |cur| {
                    nornicdb_api::value::order_compare(value, cur) == std::cmp::Ordering::Greater
                }) {
                    *current = Some(value.clone());
                }
            }
            AggregateAccumulator::Collect { distinct, items } => {
                if *distinct && items.iter().any(|i| i == value) {
                    return;
                }
                items.push(value.clone());
            }
            AggregateAccumulator::StdDev(values) => {
                if let Some(f) = value.as_f64() {
                    values.push(f);
                }
            }
            AggregateAccumulator::PercentileCont { values, .. }
            | AggregateAccumulator::PercentileDisc { values, .. } => {
                if let Some(f) = value.as_f64() {
                    values.push(f);
                }
            }
        }
    }

    pub fn finish(self) -> Value {
        match self {
            AggregateAccumulator::Count { count, .. } => Value::Int(count),
            AggregateAccumulator::CountStar(n) => Value::Int(n),
            AggregateAccumulator::Sum {
                total,
                any_float,
                count,
            } => {
                if count == 0 {
                    Value::Int(0)
                } else if any_float {
                    Value::Float(total)
                } else {
                    Value::Int(total as i64)
                }
            }
            AggregateAccumulator::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Float(total / count as f64)
                }
            }
            AggregateAccumulator::Min(v) => v.unwrap_or(Value::Null),
            AggregateAccumulator::Max(v) => v.unwrap_or(Value::Null),
            AggregateAccumulator::Collect { items, .. } => Value::List(items),
            AggregateAccumulator::StdDev(values) => Value::Float(sample_stddev(&values)),
            AggregateAccumulator::PercentileCont { values, fraction } => {
                Value::Float(percentile_cont(values, fraction))
            }
            AggregateAccumulator::PercentileDisc { values, fraction } => {
                percentile_disc(values, fraction)
            }
        }
    }
}

fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn percentile_cont(mut values: Vec<f64>, fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let fraction = fraction.clamp(0.0, 1.0);
    let rank = fraction * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        values[lower]
    } else {
        let weight = rank - lower as f64;
        values[lower] * (1.0 - weight) + values[upper] * weight
    }
}

fn percentile_disc(mut values: Vec<f64>, fraction: f64) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let fraction = fraction.clamp(0.0, 1.0);
    let idx = (fraction * (values.len() - 1) as f64).ceil() as usize;
    Value::Float(values[idx.min(values.len() - 1)])
}

/// Equality used by `collect(DISTINCT ...)`/`count(DISTINCT ...)`, kept
/// separate from `==` so `Null` never collapses distinct groups.
pub fn aggregate_eq(a: &Value, b: &Value) -> bool {
    compare::values_equal(a, b).as_bool() == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_ignores_nulls() {
        let mut acc = AggregateAccumulator::new(AggregateFunction::Count, false, 0.0);
        acc.update(&Value::Int(1));
        acc.update(&Value::Null);
        acc.update(&Value::Int(2));
        assert_eq!(acc.finish(), Value::Int(2));
    }

    #[test]
    fn count_distinct_dedupes() {
        let mut acc = AggregateAccumulator::new(AggregateFunction::Count, true, 0.0);
        acc.update(&Value::Int(1));
        acc.update(&Value::Int(1));
        acc.update(&Value::Int(2));
        assert_eq!(acc.finish(), Value::Int(2));
    }

    #[test]
    fn sum_stays_integer_when_all_inputs_are_integer() {
        let mut acc = AggregateAccumulator::new(AggregateFunction::Sum, false, 0.0);
        acc.update(&Value::Int(2));
        acc.update(&Value::Int(3));
        assert_eq!(acc.finish(), Value::Int(5));
    }

    #[test]
    fn avg_of_empty_group_is_null() {
        let acc = AggregateAccumulator::new(AggregateFunction::Avg, false, 0.0);
        assert_eq!(acc.finish(), Value::Null);
    }

    #[test]
    fn percentile_cont_interpolates() {
        let mut acc = AggregateAccumulator::new(AggregateFunction::PercentileCont, false, 0.5);
        for v in [1.0, 2.0, 3.0, 4.0] {
            acc.update(&Value::Float(v));
        }
        assert_eq!(acc.finish(), Value::Float(2.5));
    }
}
