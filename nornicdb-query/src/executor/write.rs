//! `CREATE`/`MERGE`/`SET`/`REMOVE`/`DELETE`/`FOREACH`: the mutating clause
//! handlers. Each borrows the live [`StorageEngine`] directly -- the
//! reference engine applies writes immediately (see
//! `nornicdb_storage::MemoryEngine`), so a later clause in the same query
//! observes earlier ones without re-reading a snapshot.

use crate::ast::{
    CreateClause, DeleteClause, ForeachClause, MergeClause, NodePattern, PathElement,
    RelationshipPattern, RemoveClause, RemoveItem, SetClause, SetItem,
};
use crate::error::{Error, Result};
use crate::evaluator::{self, EvalContext};
use crate::frame::Row;
use crate::schema_bridge;
use nornicdb_api::{Edge, Node, QueryStats, StorageEngine, Value};
use std::collections::BTreeMap;

/// The property name that routes a list-of-numbers value into a node's
/// dedicated `embedding` slot instead of its property map (spec.md §4.6:
/// "dense-vector valued properties are routed into the node's dedicated
/// embedding slot when the target variable is a node and the property
/// name matches the configured embedding key").
pub const EMBEDDING_PROPERTY_KEY: &str = "embedding";

/// `Some(vector)` when `value` is a non-empty list of purely numeric
/// entries -- the shape `db.index.vector.*` and `SET n.embedding = [...]`
/// both expect. A list containing a non-numeric element is left as an
/// ordinary property instead of silently truncating it.
fn as_embedding_vector(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::List(items) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>(),
        _ => None,
    }
}

/// Applies one `key: value` write to a node, routing into the embedding
/// slot when `key` is [`EMBEDDING_PROPERTY_KEY`] and `value` is numeric-
/// list shaped, otherwise into the property map (or removing the key
/// when `value` is null).
fn set_node_field(node: &mut Node, key: &str, value: Value) {
    if key == EMBEDDING_PROPERTY_KEY {
        if value.is_null() {
            node.embedding = None;
            return;
        }
        if let Some(vector) = as_embedding_vector(&value) {
            node.embedding = Some(vector);
            return;
        }
    }
    if value.is_null() {
        node.properties.remove(key);
    } else {
        node.properties.insert(key.to_string(), value);
    }
}

pub fn create_clause(
    clause: &CreateClause,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut next_row = row;
        for pattern in &clause.patterns {
            create_pattern(pattern, &mut next_row, eval_ctx, stats)?;
        }
        out.push(next_row);
    }
    Ok(out)
}

fn create_pattern(
    pattern: &crate::ast::Pattern,
    row: &mut Row,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<()> {
    let mut last_node_id: Option<String> = None;
    let mut pending_rel: Option<&RelationshipPattern> = None;

    for element in &pattern.elements {
        match element {
            PathElement::Node(node_pattern) => {
                let id = resolve_or_create_node(node_pattern, row, eval_ctx, stats)?;
                if let (Some(from), Some(rel)) = (&last_node_id, pending_rel.take()) {
                    create_edge_for(rel, from, &id, row, eval_ctx, stats)?;
                }
                last_node_id = Some(id);
            }
            PathElement::Relationship(rel) => {
                pending_rel = Some(rel);
            }
        }
    }
    Ok(())
}

/// `CREATE` always mints a fresh node unless the variable is already
/// bound (reusing a node a prior pattern/clause introduced in the same
/// row, e.g. `CREATE (a), (a)-[:X]->(b)`).
fn resolve_or_create_node(
    node_pattern: &NodePattern,
    row: &mut Row,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<String> {
    if let Some(var) = &node_pattern.variable {
        if let Some(Value::Node(id)) = row.get(var) {
            return Ok(id.clone());
        }
    }

    let id = eval_ctx.storage.new_node_id()?;
    let mut node = Node::new(&id);
    node.labels = node_pattern.labels.clone();
    if let Some(props) = &node_pattern.properties {
        for (key, expr) in &props.pairs {
            let value = evaluator::eval(expr, row, eval_ctx)?;
            set_node_field(&mut node, key, value);
        }
    }
    schema_bridge::check_node_constraints(eval_ctx.storage, &node)?;
    eval_ctx.storage.create_node(node)?;
    stats.nodes_created += 1;
    stats.labels_added += node_pattern.labels.len() as u64;

    if let Some(var) = &node_pattern.variable {
        row.insert(var.clone(), Value::Node(id.clone()));
    }
    Ok(id)
}

fn create_edge_for(
    rel: &RelationshipPattern,
    from: &str,
    to: &str,
    row: &mut Row,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<()> {
    let rel_type = rel
        .types
        .first()
        .cloned()
        .ok_or_else(|| Error::Internal("CREATE relationship must have exactly one type".to_string()))?;
    let (start, end) = match rel.direction {
        nornicdb_api::Direction::Incoming => (to.to_string(), from.to_string()),
        _ => (from.to_string(), to.to_string()),
    };
    let id = eval_ctx.storage.new_edge_id()?;
    let mut properties = BTreeMap::new();
    if let Some(props) = &rel.properties {
        for (key, expr) in &props.pairs {
            properties.insert(key.clone(), evaluator::eval(expr, row, eval_ctx)?);
        }
    }
    let edge = Edge {
        id: id.clone(),
        rel_type,
        start,
        end,
        properties,
    };
    eval_ctx.storage.create_edge(edge)?;
    stats.relationships_created += 1;
    if let Some(var) = &rel.variable {
        row.insert(var.clone(), Value::Edge(id));
    }
    Ok(())
}

pub fn merge_clause(
    clause: &MergeClause,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    let match_ctx = crate::traversal::MatchContext::new(eval_ctx.storage, eval_ctx.params);
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let existing = crate::traversal::match_patterns(
            std::slice::from_ref(&clause.pattern),
            vec![row.clone()],
            &match_ctx,
        )?;
        if let Some(mut matched_row) = existing.into_iter().next() {
            apply_set_items(&clause.on_match, &mut matched_row, eval_ctx, stats)?;
            out.push(matched_row);
        } else {
            let mut created_row = row;
            create_pattern(&clause.pattern, &mut created_row, eval_ctx, stats)?;
            apply_set_items(&clause.on_create, &mut created_row, eval_ctx, stats)?;
            out.push(created_row);
        }
    }
    Ok(out)
}

pub fn set_clause(
    clause: &SetClause,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        apply_set_items(&clause.items, &mut row, eval_ctx, stats)?;
        out.push(row);
    }
    Ok(out)
}

fn apply_set_items(
    items: &[SetItem],
    row: &mut Row,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<()> {
    for item in items {
        match item {
            SetItem::Property {
                target,
                property,
                value,
            } => {
                let id = evaluator::eval(target, row, eval_ctx)?;
                let new_value = evaluator::eval(value, row, eval_ctx)?;
                set_property(eval_ctx.storage, &id, property, new_value)?;
                stats.properties_set += 1;
            }
            SetItem::Map {
                target,
                value,
                merge,
            } => {
                let id = evaluator::eval(target, row, eval_ctx)?;
                let new_map = evaluator::eval(value, row, eval_ctx)?;
                let Value::Map(fields) = new_map else {
                    return Err(Error::type_error("Map", new_map.type_name()));
                };
                let count = set_property_map(eval_ctx.storage, &id, fields, *merge)?;
                stats.properties_set += count;
            }
            SetItem::Labels { variable, labels } => {
                if let Some(Value::Node(id)) = row.get(variable) {
                    let mut node = eval_ctx
                        .storage
                        .get_node(id)?
                        .ok_or_else(|| Error::NotFound { kind: "node", id: id.clone() })?;
                    for label in labels {
                        if !node.has_label(label) {
                            node.labels.push(label.clone());
                            stats.labels_added += 1;
                        }
                    }
                    schema_bridge::check_node_constraints(eval_ctx.storage, &node)?;
                    eval_ctx.storage.update_node(node)?;
                }
            }
        }
    }
    Ok(())
}

fn set_property(storage: &dyn StorageEngine, id: &Value, property: &str, new_value: Value) -> Result<()> {
    match id {
        Value::Node(node_id) => {
            let mut node = storage
                .get_node(node_id)?
                .ok_or_else(|| Error::NotFound { kind: "node", id: node_id.clone() })?;
            set_node_field(&mut node, property, new_value);
            schema_bridge::check_node_constraints(storage, &node)?;
            storage.update_node(node)?;
            Ok(())
        }
        Value::Edge(edge_id) => {
            let mut edge = storage
                .get_edge(edge_id)?
                .ok_or_else(|| Error::NotFound { kind: "relationship", id: edge_id.clone() })?;
            if new_value.is_null() {
                edge.properties.remove(property);
            } else {
                edge.properties.insert(property.to_string(), new_value);
            }
            storage.update_edge(edge)?;
            Ok(())
        }
        Value::Null => Ok(()),
        other => Err(Error::type_error("Node or Relationship", other.type_name())),
    }
}

fn set_property_map(
    storage: &dyn StorageEngine,
    id: &Value,
    fields: BTreeMap<String, Value>,
    merge: bool,
) -> Result<u64> {
    let count = fields.len() as u64;
    match id {
        Value::Node(node_id) => {
            let mut node = storage
                .get_node(node_id)?
                .ok_or_else(|| Error::NotFound { kind: "node", id: node_id.clone() })?;
            if !merge {
                node.properties.clear();
                node.embedding = None;
            }
            for (key, value) in fields {
                set_node_field(&mut node, &key, value);
            }
            schema_bridge::check_node_constraints(storage, &node)?;
            storage.update_node(node)?;
            Ok(count)
        }
        Value::Edge(edge_id) => {
            let mut edge = storage
                .get_edge(edge_id)?
                .ok_or_else(|| Error::NotFound { kind: "relationship", id: edge_id.clone() })?;
            if !merge {
                edge.properties.clear();
            }
            edge.properties.extend(fields);
            storage.update_edge(edge)?;
            Ok(count)
        }
        Value::Null => Ok(0),
        other => Err(Error::type_error("Node or Relationship", other.type_name())),
    }
}

pub fn remove_clause(
    clause: &RemoveClause,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        for item in &clause.items {
            match item {
                RemoveItem::Property { target, property } => {
                    let id = evaluator::eval(target, &row, eval_ctx)?;
                    set_property(eval_ctx.storage, &id, property, Value::Null)?;
                }
                RemoveItem::Labels { variable, labels } => {
                    if let Some(Value::Node(id)) = row.get(variable) {
                        let mut node = eval_ctx
                            .storage
                            .get_node(id)?
                            .ok_or_else(|| Error::NotFound { kind: "node", id: id.clone() })?;
                        node.labels.retain(|l| {
                            let removed = labels.contains(l);
                            if removed {
                                stats.labels_removed += 1;
                            }
                            !removed
                        });
                        eval_ctx.storage.update_node(node)?;
                    }
                }
            }
        }
        out.push(row);
    }
    Ok(out)
}

pub fn delete_clause(
    clause: &DeleteClause,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
) -> Result<Vec<Row>> {
    for row in &rows {
        for expr in &clause.expressions {
            let value = evaluator::eval(expr, row, eval_ctx)?;
            delete_value(eval_ctx.storage, &value, clause.detach, stats)?;
        }
    }
    Ok(rows)
}

fn delete_value(
    storage: &dyn StorageEngine,
    value: &Value,
    detach: bool,
    stats: &mut QueryStats,
) -> Result<()> {
    match value {
        Value::Node(id) => {
            if detach {
                for edge in storage.outgoing_edges(id)?.into_iter().chain(storage.incoming_edges(id)?) {
                    storage.delete_edge(&edge.id)?;
                    stats.relationships_deleted += 1;
                }
            }
            storage.delete_node(id)?;
            stats.nodes_deleted += 1;
            Ok(())
        }
        Value::Edge(id) => {
            storage.delete_edge(id)?;
            stats.relationships_deleted += 1;
            Ok(())
        }
        Value::Null => Ok(()),
        Value::Path(steps) => {
            for step in steps {
                match step {
                    nornicdb_api::PathStep::Node(id) => {
                        delete_value(storage, &Value::Node(id.clone()), detach, stats)?;
                    }
                    nornicdb_api::PathStep::Edge { id, .. } => {
                        delete_value(storage, &Value::Edge(id.clone()), detach, stats)?;
                    }
                }
            }
            Ok(())
        }
        other => Err(Error::type_error("Node, Relationship, or Path", other.type_name())),
    }
}

pub fn foreach_clause(
    clause: &ForeachClause,
    rows: Vec<Row>,
    eval_ctx: &EvalContext<'_>,
    stats: &mut QueryStats,
    run_clauses: &dyn Fn(&[crate::ast::Clause], Vec<Row>, &EvalContext<'_>, &mut QueryStats) -> Result<Vec<Row>>,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let list = evaluator::eval(&clause.list, &row, eval_ctx)?;
        let Value::List(items) = list else {
            if list.is_null() {
                out.push(row);
                continue;
            }
            return Err(Error::type_error("List", list.type_name()));
        };
        let mut current_row = row;
        for item in items {
            let mut iteration_row = current_row.clone();
            iteration_row.insert(clause.variable.clone(), item);
            let results = run_clauses(&clause.clauses, vec![iteration_row], eval_ctx, stats)?;
            if let Some(first) = results.into_iter().next() {
                current_row = first;
                current_row.remove(&clause.variable);
            }
        }
        out.push(current_row);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nornicdb_storage::MemoryEngine;
    use std::sync::Arc;

    fn run(storage: &dyn StorageEngine, query: &str) -> crate::executor::QueryResult {
        let query = crate::parser::parse_query(query).unwrap();
        crate::executor::execute(&query, storage, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn create_routes_a_numeric_list_property_into_the_embedding_slot() {
        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        run(storage.as_ref(), "CREATE (:Doc {embedding: [1.0, 0.0, 0.0]})");

        let nodes = storage.all_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].embedding, Some(vec![1.0, 0.0, 0.0]));
        assert!(!nodes[0].properties.contains_key("embedding"));
    }

    #[test]
    fn set_routes_a_numeric_list_property_into_the_embedding_slot() {
        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        run(storage.as_ref(), "CREATE (:Doc {name: 'a'})");
        run(storage.as_ref(), "MATCH (d:Doc) SET d.embedding = [0.0, 1.0]");

        let nodes = storage.all_nodes().unwrap();
        assert_eq!(nodes[0].embedding, Some(vec![0.0, 1.0]));
    }

    #[test]
    fn set_with_a_non_numeric_list_stays_an_ordinary_property() {
        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        run(storage.as_ref(), "CREATE (:Doc {name: 'a'})");
        run(storage.as_ref(), "MATCH (d:Doc) SET d.embedding = ['x', 'y']");

        let nodes = storage.all_nodes().unwrap();
        assert_eq!(nodes[0].embedding, None);
        assert!(nodes[0].properties.contains_key("embedding"));
    }
}
