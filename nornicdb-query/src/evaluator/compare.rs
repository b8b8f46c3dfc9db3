//! Three-valued equality/ordering, grounded on the same shape of compare
//! function the evaluator has always used: `Null` poisons equality and
//! ordering comparisons (propagates to `Null` rather than `false`), but
//! `ORDER BY`'s total order (`nornicdb_api::value::order_compare`) sorts
//! `Null` last instead of propagating.

use crate::ast::BinaryOperator;
use nornicdb_api::Value;
use std::cmp::Ordering;

/// Cypher equality: `=`/`<>` with three-valued `Null` propagation.
pub fn values_equal(left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    Value::Bool(left == right)
}

/// `<`, `<=`, `>`, `>=` with `Null` propagation and numeric cross-type
/// comparison (`Int` vs `Float`).
pub fn compare_ordered(left: &Value, right: &Value, op: BinaryOperator) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let ordering = match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (left.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => None,
            }
        }
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Timestamp(l), Value::Timestamp(r)) => Some(l.cmp(r)),
        _ => None,
    };
    let Some(ordering) = ordering else {
        return Value::Null;
    };
    let result = match op {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterOrEqual => ordering != Ordering::Less,
        _ => unreachable!("compare_ordered called with non-ordering operator"),
    };
    Value::Bool(result)
}

/// Cypher's three-valued `AND`: `false` is absorbing, `Null` otherwise
/// propagates unless the other operand is `false`.
pub fn and(left: &Value, right: &Value) -> Value {
    match (left.as_bool(), right.as_bool()) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ if left.is_null() || right.is_null() => Value::Null,
        _ => Value::Null,
    }
}

pub fn or(left: &Value, right: &Value) -> Value {
    match (left.as_bool(), right.as_bool()) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ if left.is_null() || right.is_null() => Value::Null,
        _ => Value::Null,
    }
}

pub fn xor(left: &Value, right: &Value) -> Value {
    match (left.as_bool(), right.as_bool()) {
        (Some(l), Some(r)) => Value::Bool(l != r),
        _ => Value::Null,
    }
}

pub fn not(value: &Value) -> Value {
    match value.as_bool() {
        Some(b) => Value::Bool(!b),
        None if value.is_null() => Value::Null,
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_false_is_absorbing_even_with_null() {
        assert_eq!(and(&Value::Bool(false), &Value::Null), Value::Bool(false));
        assert_eq!(and(&Value::Null, &Value::Bool(false)), Value::Bool(false));
    }

    #[test]
    fn or_true_is_absorbing_even_with_null() {
        assert_eq!(or(&Value::Bool(true), &Value::Null), Value::Bool(true));
    }

    #[test]
    fn equality_with_null_is_null() {
        assert_eq!(values_equal(&Value::Null, &Value::Int(1)), Value::Null);
    }

    #[test]
    fn int_float_ordering_coerces() {
        let v = compare_ordered(&Value::Int(3), &Value::Float(3.5), BinaryOperator::LessThan);
        assert_eq!(v, Value::Bool(true));
    }
}
