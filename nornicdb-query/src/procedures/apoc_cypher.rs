//! `apoc.cypher.run`/`runMany` and `apoc.periodic.iterate`/`commit` --
//! dynamic sub-query execution. These recurse back into [`crate::parser`]
//! and [`crate::executor`], the same entry points a top-level `Execute`
//! call uses, so a dynamically built query behaves exactly like a
//! statically written one.

use super::Record;
use crate::error::{Error, Result};
use crate::evaluator::EvalContext;
use crate::frame::Row;
use nornicdb_api::{QueryStats, Value};
use std::collections::BTreeMap;

fn merged_params(ctx: &EvalContext<'_>, overrides: Option<&Value>) -> BTreeMap<String, Value> {
    let mut params = ctx.params.clone();
    if let Some(Value::Map(map)) = overrides {
        for (k, v) in map {
            params.insert(k.clone(), v.clone());
        }
    }
    params
}

fn row_to_map(row: &Row) -> BTreeMap<String, Value> {
    row.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

pub fn run(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let query_text = string_arg(arguments, 0)?;
    let params = merged_params(ctx, arguments.get(1));

    let query = crate::parser::parse_query(&query_text)?;
    let result = crate::executor::execute(&query, ctx.storage, &params)?;

    Ok(result
        .rows
        .iter()
        .map(|row| super::record(&[("value", Value::Map(row_to_map(row)))]))
        .collect())
}

pub fn run_many(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let query_text = string_arg(arguments, 0)?;
    let params = merged_params(ctx, arguments.get(1));

    let mut out = Vec::new();
    for (idx, statement) in query_text.split(';').map(str::trim).filter(|s| !s.is_empty()).enumerate() {
        let query = crate::parser::parse_query(statement)?;
        let result = crate::executor::execute(&query, ctx.storage, &params)?;
        for row in &result.rows {
            out.push(super::record(&[
                ("row", Value::Int(idx as i64)),
                ("result", Value::Map(row_to_map(row))),
            ]));
        }
    }
    Ok(out)
}

pub fn periodic_iterate(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let iterate_query_text = string_arg(arguments, 0)?;
    let action_query_text = string_arg(arguments, 1)?;
    let config = match arguments.get(2) {
        Some(Value::Map(m)) => m.clone(),
        _ => BTreeMap::new(),
    };
    let batch_size = config
        .get("batchSize")
        .and_then(Value::as_f64)
        .map(|v| v as usize)
        .filter(|&v| v > 0)
        .unwrap_or(1000);

    let iterate_query = crate::parser::parse_query(&iterate_query_text)?;
    let iterate_result = crate::executor::execute(&iterate_query, ctx.storage, ctx.params)?;
    let action_query = crate::parser::parse_query(&action_query_text)?;

    let total = iterate_result.rows.len() as i64;
    let mut batches: i64 = 0;
    let mut committed: i64 = 0;
    let mut failed: i64 = 0;
    let mut total_stats = QueryStats::default();

    for batch in iterate_result.rows.chunks(batch_size) {
        batches += 1;
        for row in batch {
            let mut params = ctx.params.clone();
            for (k, v) in row {
                params.insert(k.clone(), v.clone());
            }
            match crate::executor::execute(&action_query, ctx.storage, &params) {
                Ok(action_result) => {
                    committed += 1;
                    total_stats.merge(&action_result.stats);
                }
                Err(_) => failed += 1,
            }
        }
    }

    Ok(vec![super::record(&[
        ("batches", Value::Int(batches)),
        ("total", Value::Int(total)),
        ("committedOperations", Value::Int(committed)),
        ("failedOperations", Value::Int(failed)),
        (
            "updateStatistics",
            Value::Map(BTreeMap::from([
                ("nodesCreated".to_string(), Value::Int(total_stats.nodes_created as i64)),
                ("nodesDeleted".to_string(), Value::Int(total_stats.nodes_deleted as i64)),
                (
                    "relationshipsCreated".to_string(),
                    Value::Int(total_stats.relationships_created as i64),
                ),
                (
                    "relationshipsDeleted".to_string(),
                    Value::Int(total_stats.relationships_deleted as i64),
                ),
                ("propertiesSet".to_string(), Value::Int(total_stats.properties_set as i64)),
            ])),
        ),
    ])])
}

pub fn periodic_commit(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let mut statement = string_arg(arguments, 0)?;
    if !statement.to_ascii_uppercase().contains("LIMIT") {
        statement.push_str(" LIMIT 10000");
    }
    let params = merged_params(ctx, arguments.get(1));

    let mut executions: i64 = 0;
    let mut updates: i64 = 0;
    let mut batches: i64 = 0;
    let start = std::time::Instant::now();

    loop {
        let query = crate::parser::parse_query(&statement)?;
        let result = crate::executor::execute(&query, ctx.storage, &params)?;
        executions += 1;
        batches += 1;
        let round_updates = result.stats.nodes_created
            + result.stats.nodes_deleted
            + result.stats.relationships_created
            + result.stats.relationships_deleted
            + result.stats.properties_set;
        if round_updates == 0 {
            break;
        }
        updates += round_updates as i64;
    }

    Ok(vec![super::record(&[
        ("updates", Value::Int(updates)),
        ("executions", Value::Int(executions)),
        ("runtime", Value::Int(start.elapsed().as_millis() as i64)),
        ("batches", Value::Int(batches)),
    ])])
}

fn string_arg(arguments: &[Value], idx: usize) -> Result<String> {
    match arguments.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(Error::type_error("String", format!("{other:?}"))),
    }
}
