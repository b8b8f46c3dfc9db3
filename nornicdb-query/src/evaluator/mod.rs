//! C3 -- expression evaluation.
//!
//! [`eval`] turns an [`Expression`] plus a binding [`Row`] into a
//! [`Value`], consulting the storage snapshot only when a node/edge
//! reference's property is actually accessed (nodes/edges are never
//! copied into a row -- see [`crate::frame`]).

pub mod aggregate;
pub mod compare;
pub mod functions;
mod temporal;

use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::error::{Error, Result};
use crate::frame::Row;
use nornicdb_api::{Embedder, StorageEngine, Value};
use std::collections::BTreeMap;

pub struct EvalContext<'a> {
    pub storage: &'a dyn StorageEngine,
    pub params: &'a BTreeMap<String, Value>,
    pub embedder: Option<&'a dyn Embedder>,
}

impl<'a> EvalContext<'a> {
    pub fn new(storage: &'a dyn StorageEngine, params: &'a BTreeMap<String, Value>) -> Self {
        EvalContext { storage, params, embedder: None }
    }

    pub fn with_embedder(
        storage: &'a dyn StorageEngine,
        params: &'a BTreeMap<String, Value>,
        embedder: Option<&'a dyn Embedder>,
    ) -> Self {
        EvalContext { storage, params, embedder }
    }
}

pub fn eval(expr: &Expression, row: &Row, ctx: &EvalContext<'_>) -> Result<Value> {
    match expr {
        Expression::Literal(lit) => Ok(literal_value(lit)),
        Expression::Parameter(name) => ctx
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingParameter(name.clone())),
        Expression::Variable(name) => Ok(row.get(name).cloned().unwrap_or(Value::Null)),
        Expression::Property { target, property } => {
            let base = eval(target, row, ctx)?;
            property_of(&base, property, ctx)
        }
        Expression::Index { target, index } => {
            let base = eval(target, row, ctx)?;
            let idx = eval(index, row, ctx)?;
            index_into(&base, &idx)
        }
        Expression::Slice { target, start, end } => {
            let base = eval(target, row, ctx)?;
            let start = start
                .as_ref()
                .map(|e| eval(e, row, ctx))
                .transpose()?;
            let end = end.as_ref().map(|e| eval(e, row, ctx)).transpose()?;
            slice_list(&base, start, end)
        }
        Expression::Unary { op, operand } => eval_unary(*op, operand, row, ctx),
        Expression::Binary { op, left, right } => eval_binary(*op, left, right, row, ctx),
        Expression::FunctionCall {
            name,
            arguments,
            distinct,
        } => {
            let mut values = Vec::with_capacity(arguments.len());
            for arg in arguments {
                values.push(eval(arg, row, ctx)?);
            }
            if *distinct {
                dedup_values(&mut values);
            }
            functions::call_function(name, &values, ctx)
        }
        Expression::Aggregate { .. } => Err(Error::Internal(
            "aggregate expressions are evaluated by the projection stage, not eval()".to_string(),
        )),
        Expression::Case {
            subject,
            branches,
            default,
        } => eval_case(subject.as_deref(), branches, default.as_deref(), row, ctx),
        Expression::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, row, ctx)?);
            }
            Ok(Value::List(values))
        }
        Expression::Map(pairs) => {
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in pairs {
                map.insert(k.clone(), eval(v, row, ctx)?);
            }
            Ok(Value::Map(map))
        }
        Expression::ListComprehension {
            variable,
            source,
            predicate,
            projection,
        } => eval_list_comprehension(variable, source, predicate.as_deref(), projection.as_deref(), row, ctx),
        Expression::PatternComprehension { .. } => Err(Error::Internal(
            "pattern comprehensions are expanded by the executor before evaluation".to_string(),
        )),
        Expression::Exists(_) | Expression::PatternPredicate(_) => Err(Error::Internal(
            "pattern/subquery existence is resolved by the executor before evaluation".to_string(),
        )),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn property_of(base: &Value, property: &str, ctx: &EvalContext<'_>) -> Result<Value> {
    match base {
        Value::Null => Ok(Value::Null),
        Value::Node(id) => {
            let node = ctx.storage.get_node(id)?;
            Ok(node.map(|n| n.property(property)).unwrap_or(Value::Null))
        }
        Value::Edge(id) => {
            let edge = ctx.storage.get_edge(id)?;
            Ok(edge.map(|e| e.property(property)).unwrap_or(Value::Null))
        }
        Value::Map(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        other => Err(Error::type_error("Node, Relationship, or Map", other.type_name())),
    }
}

fn index_into(base: &Value, index: &Value) -> Result<Value> {
    match (base, index) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::List(items), Value::Int(i)) => {
            let idx = normalize_index(*i, items.len());
            Ok(idx.and_then(|i| items.get(i).cloned()).unwrap_or(Value::Null))
        }
        (Value::Map(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        (other, _) => Err(Error::type_error("List or Map", other.type_name())),
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        let i = i as usize;
        if i < len {
            Some(i)
        } else {
            None
        }
    } else {
        let from_end = (-i) as usize;
        len.checked_sub(from_end)
    }
}

fn slice_list(base: &Value, start: Option<Value>, end: Option<Value>) -> Result<Value> {
    let Value::List(items) = base else {
        if base.is_null() {
            return Ok(Value::Null);
        }
        return Err(Error::type_error("List", base.type_name()));
    };
    let len = items.len() as i64;
    let to_idx = |v: Option<Value>, default: i64| -> i64 {
        match v {
            Some(Value::Int(i)) if i < 0 => (len + i).max(0),
            Some(Value::Int(i)) => i.min(len),
            _ => default,
        }
    };
    let start_idx = to_idx(start, 0).max(0) as usize;
    let end_idx = to_idx(end, len).max(0) as usize;
    if start_idx >= end_idx || start_idx >= items.len() {
        return Ok(Value::List(vec![]));
    }
    Ok(Value::List(items[start_idx..end_idx.min(items.len())].to_vec()))
}

fn eval_unary(
    op: UnaryOperator,
    operand: &Expression,
    row: &Row,
    ctx: &EvalContext<'_>,
) -> Result<Value> {
    let value = eval(operand, row, ctx)?;
    Ok(match op {
        UnaryOperator::Negate => match value {
            Value::Int(i) => Value::Int(-i),
            Value::Float(f) => Value::Float(-f),
            Value::Null => Value::Null,
            other => return Err(Error::type_error("Integer or Float", other.type_name())),
        },
        UnaryOperator::Not => compare::not(&value),
        UnaryOperator::IsNull => Value::Bool(value.is_null()),
        UnaryOperator::IsNotNull => Value::Bool(!value.is_null()),
    })
}

fn eval_binary(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    row: &Row,
    ctx: &EvalContext<'_>,
) -> Result<Value> {
    use BinaryOperator::*;
    if op == And {
        let l = eval(left, row, ctx)?;
        if l.as_bool() == Some(false) {
            return Ok(Value::Bool(false));
        }
        let r = eval(right, row, ctx)?;
        return Ok(compare::and(&l, &r));
    }
    if op == Or {
        let l = eval(left, row, ctx)?;
        if l.as_bool() == Some(true) {
            return Ok(Value::Bool(true));
        }
        let r = eval(right, row, ctx)?;
        return Ok(compare::or(&l, &r));
    }

    let l = eval(left, row, ctx)?;
    let r = eval(right, row, ctx)?;
    match op {
        Xor => Ok(compare::xor(&l, &r)),
        Equal => Ok(compare::values_equal(&l, &r)),
        NotEqual => Ok(compare::not(&compare::values_equal(&l, &r))),
        LessThan | LessOrEqual | GreaterThan | GreaterOrEqual => {
            Ok(compare::compare_ordered(&l, &r, op))
        }
        Add => arithmetic_add(&l, &r),
        Subtract => arithmetic_numeric(&l, &r, |a, b| a - b, |a, b| a - b),
        Multiply => arithmetic_numeric(&l, &r, |a, b| a * b, |a, b| a * b),
        Divide => arithmetic_divide(&l, &r),
        Modulo => arithmetic_modulo(&l, &r),
        Power => arithmetic_power(&l, &r),
        In => eval_in(&l, &r),
        StartsWith => string_predicate(&l, &r, str::starts_with),
        EndsWith => string_predicate(&l, &r, str::ends_with),
        Contains => string_predicate(&l, &r, str::contains),
        RegexMatch => regex_match(&l, &r),
        And | Or => unreachable!("handled above with short-circuiting"),
    }
}

fn arithmetic_add(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), b) => Ok(Value::String(format!("{a}{b}"))),
        (a, Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        (Value::List(a), b) => {
            let mut out = a.clone();
            out.push(b.clone());
            Ok(Value::List(out))
        }
        (Value::Duration(a), Value::Duration(b)) => a
            .checked_add(b)
            .map(Value::Duration)
            .ok_or_else(|| Error::Internal("duration overflow".to_string())),
        _ => arithmetic_numeric(l, r, |a, b| a + b, |a, b| a + b),
    }
}

fn arithmetic_numeric(
    l: &Value,
    r: &Value,
    f64_op: impl Fn(f64, f64) -> f64,
    i64_op: impl Fn(i64, i64) -> i64,
) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(i64_op(*a, *b))),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(af), Some(bf)) => Ok(Value::Float(f64_op(af, bf))),
            _ => Err(Error::type_error("Integer or Float", format!("{}/{}", a.type_name(), b.type_name()))),
        },
    }
}

/// `0` divisor, integer or float, degrades to `null` rather than erroring
/// -- matches Cypher's arithmetic-null semantics, not IEEE 754 infinity.
fn arithmetic_divide(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Ok(Value::Null)
            } else {
                Ok(Value::Int(a.div_euclid(*b)))
            }
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(_), Some(bf)) if bf == 0.0 => Ok(Value::Null),
            (Some(af), Some(bf)) => Ok(Value::Float(af / bf)),
            _ => Err(Error::type_error("Integer or Float", a.type_name())),
        },
    }
}

/// See [`arithmetic_divide`]: zero modulus also degrades to `null`.
fn arithmetic_modulo(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Ok(Value::Null)
            } else {
                Ok(Value::Int(a.rem_euclid(*b)))
            }
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(_), Some(bf)) if bf == 0.0 => Ok(Value::Null),
            (Some(af), Some(bf)) => Ok(Value::Float(af % bf)),
            _ => Err(Error::type_error("Integer or Float", a.type_name())),
        },
    }
}

fn arithmetic_power(l: &Value, r: &Value) -> Result<Value> {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::Float(a.powf(b))),
        _ if l.is_null() || r.is_null() => Ok(Value::Null),
        _ => Err(Error::type_error("Integer or Float", l.type_name())),
    }
}

fn eval_in(l: &Value, r: &Value) -> Result<Value> {
    match r {
        Value::Null => Ok(Value::Null),
        Value::List(items) => {
            if l.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in items {
                if item.is_null() {
                    saw_null = true;
                    continue;
                }
                if item == l {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(if saw_null { Value::Null } else { Value::Bool(false) })
        }
        other => Err(Error::type_error("List", other.type_name())),
    }
}

fn string_predicate(l: &Value, r: &Value, f: impl Fn(&str, &str) -> bool) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(f(a, b))),
        _ => Err(Error::type_error("String", l.type_name())),
    }
}

fn regex_match(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(text), Value::String(pattern)) => {
            let re = regex::Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| Error::Internal(format!("invalid regular expression: {e}")))?;
            Ok(Value::Bool(re.is_match(text)))
        }
        _ => Err(Error::type_error("String", l.type_name())),
    }
}

fn eval_case(
    subject: Option<&Expression>,
    branches: &[(Expression, Expression)],
    default: Option<&Expression>,
    row: &Row,
    ctx: &EvalContext<'_>,
) -> Result<Value> {
    let subject_value = subject.map(|s| eval(s, row, ctx)).transpose()?;
    for (condition, result) in branches {
        let matched = match &subject_value {
            Some(subj) => {
                let cond_value = eval(condition, row, ctx)?;
                compare::values_equal(subj, &cond_value).as_bool() == Some(true)
            }
            None => eval(condition, row, ctx)?.as_bool() == Some(true),
        };
        if matched {
            return eval(result, row, ctx);
        }
    }
    match default {
        Some(expr) => eval(expr, row, ctx),
        None => Ok(Value::Null),
    }
}

fn eval_list_comprehension(
    variable: &str,
    source: &Expression,
    predicate: Option<&Expression>,
    projection: Option<&Expression>,
    row: &Row,
    ctx: &EvalContext<'_>,
) -> Result<Value> {
    let source_value = eval(source, row, ctx)?;
    let Value::List(items) = source_value else {
        if source_value.is_null() {
            return Ok(Value::Null);
        }
        return Err(Error::type_error("List", source_value.type_name()));
    };
    let mut out = Vec::new();
    for item in items {
        let mut inner_row = row.clone();
        inner_row.insert(variable.to_string(), item.clone());
        if let Some(pred) = predicate {
            if eval(pred, &inner_row, ctx)?.as_bool() != Some(true) {
                continue;
            }
        }
        match projection {
            Some(proj) => out.push(eval(proj, &inner_row, ctx)?),
            None => out.push(item),
        }
    }
    Ok(Value::List(out))
}

fn dedup_values(values: &mut Vec<Value>) {
    let mut seen: Vec<Value> = Vec::new();
    values.retain(|v| {
        if seen.iter().any(|s| s == v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}

pub use aggregate::AggregateAccumulator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_by_zero_is_null() {
        assert_eq!(arithmetic_divide(&Value::Int(1), &Value::Int(0)).unwrap(), Value::Null);
    }

    #[test]
    fn float_division_by_zero_is_null() {
        assert_eq!(arithmetic_divide(&Value::Float(1.0), &Value::Float(0.0)).unwrap(), Value::Null);
        assert_eq!(arithmetic_divide(&Value::Int(1), &Value::Float(0.0)).unwrap(), Value::Null);
    }

    #[test]
    fn integer_modulo_by_zero_is_null() {
        assert_eq!(arithmetic_modulo(&Value::Int(7), &Value::Int(0)).unwrap(), Value::Null);
    }

    #[test]
    fn float_modulo_by_zero_is_null() {
        assert_eq!(arithmetic_modulo(&Value::Float(7.0), &Value::Float(0.0)).unwrap(), Value::Null);
    }

    #[test]
    fn nonzero_division_still_computes() {
        assert_eq!(arithmetic_divide(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(arithmetic_divide(&Value::Float(7.0), &Value::Float(2.0)).unwrap(), Value::Float(3.5));
    }
}
