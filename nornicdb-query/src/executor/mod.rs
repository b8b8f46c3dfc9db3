//! C6 -- the clause executor: drives a parsed [`Query`] clause by clause
//! against a [`StorageEngine`], threading a [`Row`] binding frame through
//! `MATCH`, the write clauses, and `WITH`/`RETURN` projection.

pub mod project;
mod write;

use crate::ast::{Clause, Query};
use crate::error::{Error, Result};
use crate::evaluator::{self, EvalContext};
use crate::frame::{self, Row};
use crate::traversal::{self, MatchContext};
use nornicdb_api::{Embedder, QueryStats, StorageEngine, Value};
use std::collections::BTreeMap;

/// The materialized result of running a query to completion: output
/// columns in declaration order, the bound rows, and write statistics
/// accumulated across every clause (zero for a read-only query).
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub stats: QueryStats,
}

pub fn execute(
    query: &Query,
    storage: &dyn StorageEngine,
    params: &BTreeMap<String, Value>,
) -> Result<QueryResult> {
    execute_with_embedder(query, storage, params, None)
}

pub fn execute_with_embedder(
    query: &Query,
    storage: &dyn StorageEngine,
    params: &BTreeMap<String, Value>,
    embedder: Option<&dyn Embedder>,
) -> Result<QueryResult> {
    execute_with_rows(query, storage, params, embedder, vec![Row::new()])
}

fn execute_with_rows(
    query: &Query,
    storage: &dyn StorageEngine,
    params: &BTreeMap<String, Value>,
    embedder: Option<&dyn Embedder>,
    initial_rows: Vec<Row>,
) -> Result<QueryResult> {
    let eval_ctx = EvalContext::with_embedder(storage, params, embedder);
    let match_ctx = MatchContext::new(storage, params);

    let mut rows = initial_rows;
    let mut columns: Vec<String> = Vec::new();
    let mut stats = QueryStats::default();

    // A query with one or more `UNION`/`UNION ALL` clauses finalizes each
    // segment it separates into a branch, then concatenates all branches
    // at the end. Mixing ALL and non-ALL across branches is rejected by
    // the parser upstream; here a single non-ALL anywhere dedupes the
    // whole concatenation.
    let mut union_branches: Vec<(Vec<String>, Vec<Row>)> = Vec::new();
    let mut union_all = true;

    for clause in &query.clauses {
        match clause {
            Clause::Match(m) => {
                rows = if m.optional {
                    traversal::optional_match_patterns(&m.patterns, rows, &match_ctx)?
                } else {
                    traversal::match_patterns(&m.patterns, rows, &match_ctx)?
                };
                if let Some(predicate) = &m.where_clause {
                    rows = filter_rows(rows, predicate, &eval_ctx)?;
                }
            }
            Clause::Unwind(u) => {
                rows = unwind(&u.expression, &u.alias, rows, &eval_ctx)?;
            }
            Clause::Create(c) => {
                rows = write::create_clause(c, rows, &eval_ctx, &mut stats)?;
            }
            Clause::Merge(m) => {
                rows = write::merge_clause(m, rows, &eval_ctx, &mut stats)?;
            }
            Clause::Set(s) => {
                rows = write::set_clause(s, rows, &eval_ctx, &mut stats)?;
            }
            Clause::Remove(r) => {
                rows = write::remove_clause(r, rows, &eval_ctx, &mut stats)?;
            }
            Clause::Delete(d) => {
                rows = write::delete_clause(d, rows, &eval_ctx, &mut stats)?;
            }
            Clause::With(w) => {
                let projected = project::project(
                    &w.items,
                    w.distinct,
                    w.order_by.as_ref(),
                    w.skip.as_ref(),
                    w.limit.as_ref(),
                    rows,
                    &eval_ctx,
                )?;
                rows = projected.rows;
                columns = projected.columns;
                if let Some(predicate) = &w.where_clause {
                    rows = filter_rows(rows, predicate, &eval_ctx)?;
                }
            }
            Clause::Return(r) => {
                let projected = project::project(
                    &r.items,
                    r.distinct,
                    r.order_by.as_ref(),
                    r.skip.as_ref(),
                    r.limit.as_ref(),
                    rows,
                    &eval_ctx,
                )?;
                rows = projected.rows;
                columns = projected.columns;
            }
            Clause::Call(c) => {
                rows = execute_call(c, rows, storage, params, &eval_ctx, &mut stats)?;
            }
            Clause::Foreach(f) => {
                rows = write::foreach_clause(f, rows, &eval_ctx, &mut stats, &run_block)?;
            }
            Clause::Union { all, query: branch } => {
                union_branches.push((std::mem::take(&mut columns), std::mem::take(&mut rows)));
                union_all = union_all && *all;
                let branch_result = execute_with_embedder(branch, storage, params, embedder)?;
                stats.merge(&branch_result.stats);
                union_branches.push((branch_result.columns, branch_result.rows));
            }
            Clause::Raw { text, offset } => {
                return Err(Error::syntax(*offset, format!("unsupported clause: {text}")));
            }
        }
    }

    if union_branches.is_empty() {
        return Ok(QueryResult { columns, rows, stats });
    }

    union_branches.push((columns, rows));
    let final_columns = union_branches
        .iter()
        .find(|(cols, _)| !cols.is_empty())
        .map(|(cols, _)| cols.clone())
        .unwrap_or_default();
    let mut combined: Vec<Row> = union_branches.into_iter().flat_map(|(_, rows)| rows).collect();
    if !union_all {
        dedup_union(&mut combined);
    }
    Ok(QueryResult {
        columns: final_columns,
        rows: combined,
        stats,
    })
}

/// Runs a clause block (a `FOREACH`/`CALL {}` body) against the rows
/// already threaded in, returning the resulting rows without disturbing
/// the caller's notion of output columns.
fn run_block(
    clauses: &[Clause],
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    let sub_query = Query {
        clauses: clauses.to_vec(),
        explain: false,
    };
    let result = execute_with_rows(&sub_query, eval_ctx.storage, eval_ctx.params, eval_ctx.embedder, rows)?;
    stats.merge(&result.stats);
    Ok(result.rows)
}

fn filter_rows(rows: Vec<Row>, predicate: &crate::ast::Expression, eval_ctx: &EvalContext<'_>) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let value = evaluator::eval(predicate, &row, eval_ctx)?;
        if matches!(value, Value::Bool(true)) {
            out.push(row);
        }
    }
    Ok(out)
}

fn unwind(
    expression: &crate::ast::Expression,
    alias: &str,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
) -> Result<Vec<Row>> {
    let mut out = Vec::new();
    for row in rows {
        let value = evaluator::eval(expression, &row, eval_ctx)?;
        match value {
            Value::List(items) => {
                for item in items {
                    let mut next = row.clone();
                    next.insert(alias.to_string(), item);
                    out.push(next);
                }
            }
            Value::Null => {}
            other => {
                let mut next = row.clone();
                next.insert(alias.to_string(), other);
                out.push(next);
            }
        }
    }
    Ok(out)
}

fn execute_call(
    clause: &crate::ast::CallClause,
    rows: Vec<Row>,
    storage: &dyn StorageEngine,
    params: &BTreeMap<String, Value>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    if let Some(subquery) = &clause.subquery {
        let mut out = Vec::new();
        for row in rows {
            let inner = execute_with_rows(subquery, storage, params, eval_ctx.embedder, vec![row.clone()])?;
            stats.merge(&inner.stats);
            for inner_row in inner.rows {
                out.push(frame::merge(row.clone(), &inner_row));
            }
        }
        return Ok(out);
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut arguments = Vec::with_capacity(clause.arguments.len());
        for expr in &clause.arguments {
            arguments.push(evaluator::eval(expr, &row, eval_ctx)?);
        }
        let records = crate::procedures::call(&clause.name, &arguments, eval_ctx)?;
        if records.is_empty() {
            continue;
        }
        for record in records {
            let mut next = row.clone();
            if clause.yield_items.is_empty() {
                for (field, value) in record {
                    next.insert(field, value);
                }
            } else {
                for yield_item in &clause.yield_items {
                    let value = record.get(&yield_item.name).cloned().unwrap_or(Value::Null);
                    let bound_name = yield_item.alias.clone().unwrap_or_else(|| yield_item.name.clone());
                    next.insert(bound_name, value);
                }
            }
            out.push(next);
        }
    }
    if let Some(predicate) = &clause.where_clause {
        out = filter_rows(out, predicate, eval_ctx)?;
    }
    Ok(out)
}

fn dedup_union(rows: &mut Vec<Row>) {
    let mut seen: Vec<String> = Vec::new();
    rows.retain(|row| {
        let key = format!("{row:?}");
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}
