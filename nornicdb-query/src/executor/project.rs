//! Shared `WITH`/`RETURN` projection: grouping + aggregation, `DISTINCT`,
//! `ORDER BY`, `SKIP`, `LIMIT`. Both clauses funnel through [`project`];
//! `WITH` keeps the result as a new binding frame, `RETURN` additionally
//! freezes it as the query's output columns.
//!
//! Aggregation scope is intentionally narrow: an aggregate must appear as
//! a whole return item (`count(n)`, `collect(n.name) AS names`), not
//! nested inside a larger expression (`count(n) + 1`) -- grouping here is
//! a local per-item heuristic, not a general expression rewrite, matching
//! the rest of the engine's clause-sequential, non-cost-based design.

use crate::ast::{
    AggregateFunction, BinaryOperator, Expression, Literal, OrderByClause, ReturnItem,
    SortDirection, UnaryOperator,
};
use crate::error::Result;
use crate::evaluator::{self, AggregateAccumulator, EvalContext};
use crate::frame::Row;
use nornicdb_api::{value::order_compare, Value};
use std::collections::BTreeMap;

pub struct Projected {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[allow(clippy::too_many_arguments)]
pub fn project(
    items: &[ReturnItem],
    distinct: bool,
    order_by: Option<&OrderByClause>,
    skip: Option<&Expression>,
    limit: Option<&Expression>,
    input_rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
) -> Result<Projected> {
    let columns = column_names(items);

    let mut rows = if items.iter().any(|item| is_aggregate(&item.expression)) {
        project_aggregated(items, &columns, input_rows, eval_ctx)?
    } else {
        project_plain(items, &columns, input_rows, eval_ctx)?
    };

    if distinct {
        dedup_rows(&mut rows, &columns);
    }

    if let Some(order_by) = order_by {
        sort_rows(&mut rows, order_by, eval_ctx)?;
    }

    if let Some(skip_expr) = skip {
        let n = evaluator::eval(skip_expr, &Row::new(), eval_ctx)?;
        let n = n.as_f64().unwrap_or(0.0).max(0.0) as usize;
        if n >= rows.len() {
            rows.clear();
        } else {
            rows.drain(0..n);
        }
    }

    if let Some(limit_expr) = limit {
        let n = evaluator::eval(limit_expr, &Row::new(), eval_ctx)?;
        let n = n.as_f64().unwrap_or(0.0).max(0.0) as usize;
        rows.truncate(n);
    }

    Ok(Projected { columns, rows })
}

fn column_names(items: &[ReturnItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.alias.clone().unwrap_or_else(|| render_expression(&item.expression)))
        .collect()
}

/// Reconstructs the Cypher text an unaliased `RETURN`/`WITH` item's column
/// name defaults to -- `n.name`, `count(x)`, `1 + 2` -- matching how a
/// real Cypher engine names result columns rather than leaking an internal
/// `Debug` representation. Not a full pretty-printer: parenthesization is
/// approximate, which only matters for nested binary expressions that
/// nobody aliases in practice.
fn render_expression(expr: &Expression) -> String {
    match expr {
        Expression::Literal(lit) => render_literal(lit),
        Expression::Parameter(name) => format!("${name}"),
        Expression::Variable(name) => name.clone(),
        Expression::Property { target, property } => {
            format!("{}.{property}", render_expression(target))
        }
        Expression::Index { target, index } => {
            format!("{}[{}]", render_expression(target), render_expression(index))
        }
        Expression::Slice { target, start, end } => format!(
            "{}[{}..{}]",
            render_expression(target),
            start.as_deref().map(render_expression).unwrap_or_default(),
            end.as_deref().map(render_expression).unwrap_or_default(),
        ),
        Expression::Binary { op, left, right } => format!(
            "{} {} {}",
            render_expression(left),
            binary_operator_text(*op),
            render_expression(right)
        ),
        Expression::Unary { op, operand } => match op {
            UnaryOperator::Negate => format!("-{}", render_expression(operand)),
            UnaryOperator::Not => format!("NOT {}", render_expression(operand)),
            UnaryOperator::IsNull => format!("{} IS NULL", render_expression(operand)),
            UnaryOperator::IsNotNull => format!("{} IS NOT NULL", render_expression(operand)),
        },
        Expression::FunctionCall { name, arguments, distinct } => format!(
            "{name}({}{})",
            if *distinct { "DISTINCT " } else { "" },
            arguments.iter().map(render_expression).collect::<Vec<_>>().join(", ")
        ),
        Expression::Aggregate { function, argument, distinct } => format!(
            "{}({}{})",
            aggregate_function_text(*function),
            if *distinct { "DISTINCT " } else { "" },
            argument.as_deref().map(render_expression).unwrap_or_else(|| "*".to_string()),
        ),
        Expression::Case { .. } => "case".to_string(),
        Expression::List(items) => {
            format!("[{}]", items.iter().map(render_expression).collect::<Vec<_>>().join(", "))
        }
        Expression::Map(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_expression(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Expression::ListComprehension { variable, source, .. } => {
            format!("[{variable} IN {}]", render_expression(source))
        }
        Expression::PatternComprehension { .. } => "pattern_comprehension".to_string(),
        Expression::Exists(_) => "exists".to_string(),
        Expression::PatternPredicate(_) => "pattern_predicate".to_string(),
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::String(s) => format!("'{s}'"),
    }
}

fn binary_operator_text(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Subtract => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Modulo => "%",
        BinaryOperator::Power => "^",
        BinaryOperator::Equal => "=",
        BinaryOperator::NotEqual => "<>",
        BinaryOperator::LessThan => "<",
        BinaryOperator::LessOrEqual => "<=",
        BinaryOperator::GreaterThan => ">",
        BinaryOperator::GreaterOrEqual => ">=",
        BinaryOperator::And => "AND",
        BinaryOperator::Or => "OR",
        BinaryOperator::Xor => "XOR",
        BinaryOperator::In => "IN",
        BinaryOperator::StartsWith => "STARTS WITH",
        BinaryOperator::EndsWith => "ENDS WITH",
        BinaryOperator::Contains => "CONTAINS",
        BinaryOperator::RegexMatch => "=~",
    }
}

fn aggregate_function_text(function: AggregateFunction) -> &'static str {
    match function {
        AggregateFunction::Count | AggregateFunction::CountDistinctStar => "count",
        AggregateFunction::Sum => "sum",
        AggregateFunction::Avg => "avg",
        AggregateFunction::Min => "min",
        AggregateFunction::Max => "max",
        AggregateFunction::Collect => "collect",
        AggregateFunction::StdDev => "stDev",
        AggregateFunction::PercentileCont => "percentileCont",
        AggregateFunction::PercentileDisc => "percentileDisc",
    }
}

fn is_aggregate(expr: &Expression) -> bool {
    matches!(expr, Expression::Aggregate { .. })
}

fn project_plain(
    items: &[ReturnItem],
    columns: &[String],
    input_rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(input_rows.len());
    for row in &input_rows {
        let mut projected = Row::new();
        for (column, item) in columns.iter().zip(items) {
            projected.insert(column.clone(), evaluator::eval(&item.expression, row, eval_ctx)?);
        }
        out.push(projected);
    }
    Ok(out)
}

fn project_aggregated(
    items: &[ReturnItem],
    columns: &[String],
    input_rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
) -> Result<Vec<Row>> {
    if input_rows.is_empty() {
        // Aggregates over zero rows still produce one row (e.g. `count(n)` => 0),
        // unless there is also a non-aggregate grouping column, which has
        // nothing to group by.
        if items.iter().all(|i| is_aggregate(&i.expression)) {
            let mut row = Row::new();
            for (column, item) in columns.iter().zip(items) {
                let Expression::Aggregate { function, .. } = &item.expression else {
                    unreachable!("checked by is_aggregate above")
                };
                row.insert(column.clone(), AggregateAccumulator::new(*function, false, 0.5).finish());
            }
            return Ok(vec![row]);
        }
        return Ok(Vec::new());
    }

    let group_key_columns: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !is_aggregate(&item.expression))
        .map(|(idx, _)| idx)
        .collect();

    let mut groups: BTreeMap<Vec<String>, Vec<Row>> = BTreeMap::new();
    let mut group_key_values: BTreeMap<Vec<String>, Vec<Value>> = BTreeMap::new();

    for row in &input_rows {
        let mut key_text = Vec::with_capacity(group_key_columns.len());
        let mut key_values = Vec::with_capacity(group_key_columns.len());
        for &idx in &group_key_columns {
            let value = evaluator::eval(&items[idx].expression, row, eval_ctx)?;
            key_text.push(format!("{value:?}"));
            key_values.push(value);
        }
        groups.entry(key_text.clone()).or_default().push(row.clone());
        group_key_values.entry(key_text).or_insert(key_values);
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key_text, group_rows) in groups {
        let key_values = &group_key_values[&key_text];
        let mut projected = Row::new();
        let mut key_iter = key_values.iter();
        for (column, item) in columns.iter().zip(items) {
            match &item.expression {
                Expression::Aggregate {
                    function,
                    argument,
                    distinct,
                } => {
                    let fraction = match argument {
                        Some(arg) => group_rows
                            .first()
                            .map(|r| evaluator::eval(arg, r, eval_ctx))
                            .transpose()?
                            .and_then(|v| v.as_f64())
                            .unwrap_or(0.5),
                        None => 0.5,
                    };
                    let mut acc = AggregateAccumulator::new(*function, *distinct, fraction);
                    for row in &group_rows {
                        let value = match (function, argument) {
                            (AggregateFunction::CountDistinctStar, _) => Value::Int(1),
                            (_, Some(arg)) => evaluator::eval(arg, row, eval_ctx)?,
                            (AggregateFunction::Count, None) => Value::Int(1),
                            (_, None) => Value::Null,
                        };
                        acc.update(&value);
                    }
                    projected.insert(column.clone(), acc.finish());
                }
                _ => {
                    projected.insert(column.clone(), key_iter.next().cloned().unwrap_or(Value::Null));
                }
            }
        }
        out.push(projected);
    }
    Ok(out)
}

fn dedup_rows(rows: &mut Vec<Row>, columns: &[String]) {
    let mut seen: Vec<Vec<String>> = Vec::new();
    rows.retain(|row| {
        let key: Vec<String> = columns
            .iter()
            .map(|c| format!("{:?}", row.get(c).cloned().unwrap_or(Value::Null)))
            .collect();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

fn sort_rows(rows: &mut [Row], order_by: &OrderByClause, eval_ctx: &EvalContext<'_>) -> Result<()> {
    let mut keyed: Vec<(Vec<Value>, usize)> = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let mut key = Vec::with_capacity(order_by.items.len());
        for item in &order_by.items {
            key.push(evaluator::eval(&item.expression, row, eval_ctx)?);
        }
        keyed.push((key, idx));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for (i, item) in order_by.items.iter().enumerate() {
            let ord = order_compare(&a[i], &b[i]);
            let ord = match item.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    let reordered: Vec<Row> = keyed.into_iter().map(|(_, idx)| rows[idx].clone()).collect();
    rows.clone_from_slice(&reordered);
    Ok(())
}
