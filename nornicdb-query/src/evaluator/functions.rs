//! The closed scalar function catalog (spec's function-name list). An
//! unrecognized name is an [`Error::UnknownFunction`], never a silent
//! pass-through -- the catalog is closed by design.

use super::temporal;
use super::EvalContext;
use crate::error::{Error, Result};
use nornicdb_api::{StorageEngine, Value};
use std::collections::BTreeMap;

/// The function names `call_function` recognizes, surfaced to
/// `dbms.functions` for introspection.
pub const FUNCTION_NAMES: &[&str] = &[
    "id", "elementId", "labels", "type", "properties", "keys", "size", "length", "head", "tail",
    "last", "coalesce", "toString", "toInteger", "toFloat", "toBoolean", "range", "abs", "sqrt",
    "sin", "cos", "tan", "sinh", "cosh", "tanh", "coth", "power", "round", "floor", "ceil", "sign",
    "timestamp", "duration", "date", "datetime", "now", "toUpper", "toLower", "trim", "ltrim",
    "rtrim", "reverse", "substring", "replace", "split", "exists",
];

pub fn call_function(name: &str, args: &[Value], ctx: &EvalContext<'_>) -> Result<Value> {
    match name.to_ascii_lowercase().as_str() {
        "id" => id(args),
        "elementid" => element_id(args),
        "labels" => labels(args, ctx.storage),
        "type" => rel_type(args, ctx.storage),
        "properties" => properties(args, ctx.storage),
        "keys" => keys(args, ctx.storage),
        "size" => size(args),
        "length" => length(args),
        "head" => head(args),
        "tail" => tail(args),
        "last" => last(args),
        "coalesce" => Ok(coalesce(args)),
        "tostring" => to_string_fn(args),
        "tointeger" => to_integer(args),
        "tofloat" => to_float(args),
        "toboolean" => to_boolean(args),
        "range" => range(args),
        "abs" => numeric1(args, f64::abs, i64::abs),
        "sqrt" => float1(args, f64::sqrt),
        "sin" => float1(args, f64::sin),
        "cos" => float1(args, f64::cos),
        "tan" => float1(args, f64::tan),
        "sinh" => float1(args, f64::sinh),
        "cosh" => float1(args, f64::cosh),
        "tanh" => float1(args, f64::tanh),
        "coth" => float1(args, |x| 1.0 / x.tanh()),
        "power" => power(args),
        "round" => float1(args, |x| x.round()),
        "floor" => float1(args, f64::floor),
        "ceil" => float1(args, f64::ceil),
        "sign" => sign(args),
        "timestamp" => Ok(Value::Int(chrono::Utc::now().timestamp_millis())),
        "duration" => duration(args),
        "date" => date(args),
        "datetime" => datetime(args),
        "now" => Ok(Value::Timestamp(temporal::timestamp_now())),
        "toupper" => string1(args, |s| s.to_uppercase()),
        "tolower" => string1(args, |s| s.to_lowercase()),
        "trim" => string1(args, |s| s.trim().to_string()),
        "ltrim" => string1(args, |s| s.trim_start().to_string()),
        "rtrim" => string1(args, |s| s.trim_end().to_string()),
        "reverse" => reverse(args),
        "substring" => substring(args),
        "replace" => replace(args),
        "split" => split(args),
        "exists" => exists(args, ctx),
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

fn arity_error(name: &str, expected: usize, got: usize) -> Error {
    Error::Internal(format!(
        "{name} expects {expected} argument(s), got {got}"
    ))
}

fn id(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Node(id)] | [Value::Edge(id)] => Ok(Value::String(id.clone())),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("Node or Relationship", other.type_name())),
        _ => Err(arity_error("id", 1, args.len())),
    }
}

fn element_id(args: &[Value]) -> Result<Value> {
    id(args)
}

fn labels(args: &[Value], storage: &dyn StorageEngine) -> Result<Value> {
    match args {
        [Value::Node(id)] => {
            let node = storage.get_node(id)?;
            Ok(Value::List(
                node.map(|n| n.labels.into_iter().map(Value::String).collect())
                    .unwrap_or_default(),
            ))
        }
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("Node", other.type_name())),
        _ => Err(arity_error("labels", 1, args.len())),
    }
}

fn rel_type(args: &[Value], storage: &dyn StorageEngine) -> Result<Value> {
    match args {
        [Value::Edge(id)] => {
            let edge = storage.get_edge(id)?;
            Ok(edge.map(|e| Value::String(e.rel_type)).unwrap_or(Value::Null))
        }
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("Relationship", other.type_name())),
        _ => Err(arity_error("type", 1, args.len())),
    }
}

fn properties(args: &[Value], storage: &dyn StorageEngine) -> Result<Value> {
    match args {
        [Value::Node(id)] => {
            let node = storage.get_node(id)?;
            Ok(node
                .map(|n| Value::Map(n.properties))
                .unwrap_or(Value::Null))
        }
        [Value::Edge(id)] => {
            let edge = storage.get_edge(id)?;
            Ok(edge
                .map(|e| Value::Map(e.properties))
                .unwrap_or(Value::Null))
        }
        [m @ Value::Map(_)] => Ok(m.clone()),
        [Value::Null] => Ok(Value::Null),
        _ => Err(arity_error("properties", 1, args.len())),
    }
}

fn keys(args: &[Value], storage: &dyn StorageEngine) -> Result<Value> {
    let map = match &args {
        [Value::Node(id)] => storage.get_node(id)?.map(|n| n.properties),
        [Value::Edge(id)] => storage.get_edge(id)?.map(|e| e.properties),
        [Value::Map(m)] => Some(m.clone()),
        [Value::Null] => None,
        _ => return Err(arity_error("keys", 1, args.len())),
    };
    Ok(Value::List(
        map.map(|m| m.into_keys().map(Value::String).collect())
            .unwrap_or_default(),
    ))
}

fn size(args: &[Value]) -> Result<Value> {
    match args {
        [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
        [Value::String(s)] => Ok(Value::Int(s.chars().count() as i64)),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("List or String", other.type_name())),
        _ => Err(arity_error("size", 1, args.len())),
    }
}

fn length(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Path(steps)] => {
            let edge_count = steps
                .iter()
                .filter(|s| matches!(s, nornicdb_api::PathStep::Edge { .. }))
                .count();
            Ok(Value::Int(edge_count as i64))
        }
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("Path", other.type_name())),
        _ => Err(arity_error("length", 1, args.len())),
    }
}

fn head(args: &[Value]) -> Result<Value> {
    match args {
        [Value::List(items)] => Ok(items.first().cloned().unwrap_or(Value::Null)),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("List", other.type_name())),
        _ => Err(arity_error("head", 1, args.len())),
    }
}

fn tail(args: &[Value]) -> Result<Value> {
    match args {
        [Value::List(items)] => Ok(Value::List(items.iter().skip(1).cloned().collect())),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("List", other.type_name())),
        _ => Err(arity_error("tail", 1, args.len())),
    }
}

fn last(args: &[Value]) -> Result<Value> {
    match args {
        [Value::List(items)] => Ok(items.last().cloned().unwrap_or(Value::Null)),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("List", other.type_name())),
        _ => Err(arity_error("last", 1, args.len())),
    }
}

fn coalesce(args: &[Value]) -> Value {
    args.iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

fn to_string_fn(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [v] => Ok(Value::String(v.to_string())),
        _ => Err(arity_error("toString", 1, args.len())),
    }
}

fn to_integer(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [Value::Int(i)] => Ok(Value::Int(*i)),
        [Value::Float(f)] => Ok(Value::Int(f.trunc() as i64)),
        [Value::String(s)] => Ok(s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or(Value::Null)),
        [Value::Bool(b)] => Ok(Value::Int(if *b { 1 } else { 0 })),
        [other] => Err(Error::type_error("Integer, Float, String, or Boolean", other.type_name())),
        _ => Err(arity_error("toInteger", 1, args.len())),
    }
}

fn to_float(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [Value::Int(i)] => Ok(Value::Float(*i as f64)),
        [Value::Float(f)] => Ok(Value::Float(*f)),
        [Value::String(s)] => Ok(s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null)),
        [other] => Err(Error::type_error("Integer, Float, or String", other.type_name())),
        _ => Err(arity_error("toFloat", 1, args.len())),
    }
}

fn to_boolean(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [Value::Bool(b)] => Ok(Value::Bool(*b)),
        [Value::String(s)] => Ok(match s.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        }),
        [other] => Err(Error::type_error("Boolean or String", other.type_name())),
        _ => Err(arity_error("toBoolean", 1, args.len())),
    }
}

fn range(args: &[Value]) -> Result<Value> {
    let (start, end, step) = match args {
        [Value::Int(a), Value::Int(b)] => (*a, *b, 1i64),
        [Value::Int(a), Value::Int(b), Value::Int(step)] => (*a, *b, *step),
        _ => return Err(arity_error("range", 2, args.len())),
    };
    if step == 0 {
        return Err(Error::Internal("range() step must not be zero".to_string()));
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i <= end {
            out.push(Value::Int(i));
            i += step;
        }
    } else {
        while i >= end {
            out.push(Value::Int(i));
            i += step;
        }
    }
    Ok(Value::List(out))
}

fn numeric1(args: &[Value], f_op: impl Fn(f64) -> f64, i_op: impl Fn(i64) -> i64) -> Result<Value> {
    match args {
        [Value::Int(i)] => Ok(Value::Int(i_op(*i))),
        [Value::Float(f)] => Ok(Value::Float(f_op(*f))),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("Integer or Float", other.type_name())),
        _ => Err(arity_error("numeric function", 1, args.len())),
    }
}

fn float1(args: &[Value], op: impl Fn(f64) -> f64) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [v] => v
            .as_f64()
            .map(|f| Value::Float(op(f)))
            .ok_or_else(|| Error::type_error("Integer or Float", v.type_name())),
        _ => Err(arity_error("math function", 1, args.len())),
    }
}

fn power(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Null, _] | [_, Value::Null] => Ok(Value::Null),
        [a, b] => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a.powf(b))),
            _ => Err(Error::type_error("Integer or Float", a.type_name())),
        },
        _ => Err(arity_error("power", 2, args.len())),
    }
}

fn sign(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Int(i)] => Ok(Value::Int(i.signum())),
        [Value::Float(f)] => Ok(Value::Int(if *f > 0.0 { 1 } else if *f < 0.0 { -1 } else { 0 })),
        [Value::Null] => Ok(Value::Null),
        [other] => Err(Error::type_error("Integer or Float", other.type_name())),
        _ => Err(arity_error("sign", 1, args.len())),
    }
}

fn duration(args: &[Value]) -> Result<Value> {
    match args {
        [Value::String(text)] => Ok(Value::Duration(temporal::duration_value_for_text(text)?)),
        [Value::Map(fields)] => Ok(Value::Duration(duration_from_map(fields)?)),
        [Value::Null] => Ok(Value::Null),
        _ => Err(arity_error("duration", 1, args.len())),
    }
}

fn duration_from_map(fields: &BTreeMap<String, Value>) -> Result<nornicdb_api::Duration> {
    let field = |name: &str| -> i64 {
        fields
            .get(name)
            .and_then(|v| v.as_f64())
            .map(|f| f as i64)
            .unwrap_or(0)
    };
    Ok(nornicdb_api::Duration {
        months: field("years") * 12 + field("months"),
        days: field("days") + field("weeks") * 7,
        seconds: field("seconds") + field("minutes") * 60 + field("hours") * 3600,
        nanos: 0,
    })
}

fn date(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::Timestamp(
            temporal::timestamp_now().split('T').next().unwrap_or_default().to_string(),
        )),
        [Value::String(s)] => Ok(Value::Timestamp(s.clone())),
        [Value::Null] => Ok(Value::Null),
        _ => Err(arity_error("date", 0, args.len())),
    }
}

fn datetime(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::Timestamp(temporal::timestamp_now())),
        [Value::String(s)] => {
            temporal::parse_timestamp(s)?;
            Ok(Value::Timestamp(s.clone()))
        }
        [Value::Null] => Ok(Value::Null),
        _ => Err(arity_error("datetime", 0, args.len())),
    }
}

fn string1(args: &[Value], op: impl Fn(&str) -> String) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => Ok(Value::String(op(s))),
        [other] => Err(Error::type_error("String", other.type_name())),
        _ => Err(arity_error("string function", 1, args.len())),
    }
}

fn reverse(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => Ok(Value::String(s.chars().rev().collect())),
        [Value::List(items)] => {
            let mut out = items.clone();
            out.reverse();
            Ok(Value::List(out))
        }
        [other] => Err(Error::type_error("String or List", other.type_name())),
        _ => Err(arity_error("reverse", 1, args.len())),
    }
}

fn substring(args: &[Value]) -> Result<Value> {
    let (s, start, length) = match args {
        [Value::String(s), Value::Int(start)] => (s, *start, None),
        [Value::String(s), Value::Int(start), Value::Int(len)] => (s, *start, Some(*len)),
        [Value::Null, ..] => return Ok(Value::Null),
        _ => return Err(arity_error("substring", 2, args.len())),
    };
    let chars: Vec<char> = s.chars().collect();
    let start = start.max(0) as usize;
    if start >= chars.len() {
        return Ok(Value::String(String::new()));
    }
    let end = match length {
        Some(len) => (start + len.max(0) as usize).min(chars.len()),
        None => chars.len(),
    };
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn replace(args: &[Value]) -> Result<Value> {
    match args {
        [Value::String(s), Value::String(from), Value::String(to)] => {
            Ok(Value::String(s.replace(from.as_str(), to)))
        }
        [Value::Null, ..] => Ok(Value::Null),
        _ => Err(arity_error("replace", 3, args.len())),
    }
}

fn split(args: &[Value]) -> Result<Value> {
    match args {
        [Value::String(s), Value::String(sep)] => Ok(Value::List(
            s.split(sep.as_str())
                .map(|p| Value::String(p.to_string()))
                .collect(),
        )),
        [Value::Null, ..] => Ok(Value::Null),
        _ => Err(arity_error("split", 2, args.len())),
    }
}

/// `exists(n.prop)` — whether a property-access expression resolves to a
/// non-null value. Pattern/subquery `EXISTS { ... }` is resolved by the
/// executor before the wrapping expression ever reaches `eval`.
fn exists(args: &[Value], _ctx: &EvalContext<'_>) -> Result<Value> {
    match args {
        [v] => Ok(Value::Bool(!v.is_null())),
        _ => Err(arity_error("exists", 1, args.len())),
    }
}
