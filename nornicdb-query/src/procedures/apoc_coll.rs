//! `apoc.coll.*` -- pure list/set operations, dispatched on the
//! dot-suffix after the shared `apoc.coll.` prefix.

use super::Record;
use crate::error::{Error, Result};
use nornicdb_api::{value::order_compare, Value};

pub fn call(name: &str, arguments: &[Value]) -> Result<Vec<Record>> {
    let list = list_arg(arguments, 0)?;
    let suffix = name.strip_prefix("apoc.coll.").unwrap_or(name);
    let value = match suffix {
        "toset" => {
            let mut seen: Vec<Value> = Vec::new();
            for item in list {
                if !seen.contains(&item) {
                    seen.push(item);
                }
            }
            Value::List(seen)
        }
        "sum" => Value::Float(list.iter().filter_map(Value::as_f64).sum()),
        "avg" => {
            let nums: Vec<f64> = list.iter().filter_map(Value::as_f64).collect();
            if nums.is_empty() {
                Value::Null
            } else {
                Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        "sort" => {
            let mut sorted = list;
            sorted.sort_by(order_compare);
            Value::List(sorted)
        }
        "min" => list.into_iter().min_by(order_compare).unwrap_or(Value::Null),
        "max" => list.into_iter().max_by(order_compare).unwrap_or(Value::Null),
        "contains" => {
            let needle = arguments.get(1).cloned().unwrap_or(Value::Null);
            Value::Bool(list.contains(&needle))
        }
        other => return Err(Error::UnknownProcedure(format!("apoc.coll.{other}"))),
    };
    Ok(vec![super::record(&[("value", value)])])
}

fn list_arg(arguments: &[Value], idx: usize) -> Result<Vec<Value>> {
    match arguments.get(idx) {
        Some(Value::List(items)) => Ok(items.clone()),
        other => Err(Error::type_error("List", format!("{other:?}"))),
    }
}
