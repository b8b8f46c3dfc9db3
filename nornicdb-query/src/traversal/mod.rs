//! C5 -- pattern matching and traversal.
//!
//! [`match_patterns`] runs a comma-separated pattern list against a set of
//! input rows as a sequence of nested-loop joins: each pattern's node and
//! relationship steps either narrow an already-bound variable to a single
//! candidate (a join condition) or fan out over every matching candidate
//! in storage (a new binding), so patterns sharing a variable behave as a
//! join rather than an independent cartesian product.

mod expand;
mod shortest;

use crate::ast::{NodePattern, PathElement, Pattern, RelationshipPattern, ShortestPathKind};
use crate::error::{Error, Result};
use crate::evaluator::{self, EvalContext};
use crate::frame::Row;
use nornicdb_api::{Node, PathStep, StorageEngine, Value};
use std::collections::BTreeMap;

pub struct MatchContext<'a> {
    pub storage: &'a dyn StorageEngine,
    pub params: &'a BTreeMap<String, Value>,
}

impl<'a> MatchContext<'a> {
    pub fn new(storage: &'a dyn StorageEngine, params: &'a BTreeMap<String, Value>) -> Self {
        MatchContext { storage, params }
    }

    fn eval_ctx(&self) -> EvalContext<'_> {
        EvalContext::new(self.storage, self.params)
    }
}

/// One candidate binding in progress: the row built so far, and the
/// alternating node/edge trail needed to materialize a `Path` value if
/// the pattern carries a `path =` alias.
type Partial = (Row, Vec<PathStep>);

/// Runs every pattern in `patterns` against `rows` as a left-to-right
/// chain of nested-loop joins.
pub fn match_patterns(patterns: &[Pattern], rows: Vec<Row>, ctx: &MatchContext<'_>) -> Result<Vec<Row>> {
    let mut current = rows;
    for pattern in patterns {
        let mut next = Vec::new();
        for row in &current {
            next.extend(match_pattern(pattern, row, ctx)?);
        }
        current = next;
    }
    Ok(current)
}

/// `OPTIONAL MATCH` semantics: a row that fails to extend through every
/// pattern is kept, with every variable the patterns would have bound set
/// to `Null` instead of being dropped (a left outer join).
pub fn optional_match_patterns(
    patterns: &[Pattern],
    rows: Vec<Row>,
    ctx: &MatchContext<'_>,
) -> Result<Vec<Row>> {
    let mut output = Vec::with_capacity(rows.len());
    for row in rows {
        let matches = match_patterns(patterns, vec![row.clone()], ctx)?;
        if matches.is_empty() {
            let mut padded = row;
            for name in patterns.iter().flat_map(pattern_variables) {
                padded.entry(name).or_insert(Value::Null);
            }
            output.push(padded);
        } else {
            output.extend(matches);
        }
    }
    Ok(output)
}

/// Every variable name a pattern would bind: node and relationship
/// variables plus the path alias, if present.
pub fn pattern_variables(pattern: &Pattern) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(alias) = &pattern.path_alias {
        names.push(alias.clone());
    }
    for element in &pattern.elements {
        match element {
            PathElement::Node(n) => {
                if let Some(v) = &n.variable {
                    names.push(v.clone());
                }
            }
            PathElement::Relationship(r) => {
                if let Some(v) = &r.variable {
                    names.push(v.clone());
                }
            }
        }
    }
    names
}

fn match_pattern(pattern: &Pattern, row: &Row, ctx: &MatchContext<'_>) -> Result<Vec<Row>> {
    if let Some(kind) = pattern.shortest {
        return match_shortest(pattern, kind, row, ctx);
    }

    let Some(PathElement::Node(first_node)) = pattern.elements.first() else {
        return Err(Error::Internal("pattern must start with a node".to_string()));
    };

    let mut partials: Vec<Partial> = expand_node(first_node, row, ctx)?;

    let mut idx = 1;
    while idx + 1 < pattern.elements.len() {
        let (PathElement::Relationship(rel), PathElement::Node(next_node)) =
            (&pattern.elements[idx], &pattern.elements[idx + 1])
        else {
            return Err(Error::Internal("malformed pattern element sequence".to_string()));
        };
        let mut next_partials = Vec::new();
        for partial in &partials {
            next_partials.extend(expand_hop(rel, next_node, partial, ctx)?);
        }
        partials = next_partials;
        idx += 2;
    }

    let mut rows = Vec::with_capacity(partials.len());
    for (mut bound_row, trail) in partials {
        if let Some(alias) = &pattern.path_alias {
            bound_row.insert(alias.clone(), Value::Path(trail));
        }
        rows.push(bound_row);
    }
    Ok(rows)
}

fn expand_node(node: &NodePattern, row: &Row, ctx: &MatchContext<'_>) -> Result<Vec<Partial>> {
    let candidates = node_candidates(node, row, ctx)?;
    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let mut next_row = row.clone();
        if let Some(var) = &node.variable {
            next_row.insert(var.clone(), Value::Node(candidate.clone()));
        }
        out.push((next_row, vec![PathStep::Node(candidate)]));
    }
    Ok(out)
}

/// Resolves the set of node ids a `NodePattern` can bind to, given rows
/// that may already have its variable bound (a join, narrowing to one
/// candidate) or unbound (a scan, fanning out to every match).
fn node_candidates(node: &NodePattern, row: &Row, ctx: &MatchContext<'_>) -> Result<Vec<String>> {
    if let Some(var) = &node.variable {
        if let Some(Value::Node(id)) = row.get(var) {
            return Ok(if node_matches(node, id, ctx, row)? {
                vec![id.clone()]
            } else {
                Vec::new()
            });
        }
    }

    let scan: Vec<Node> = match node.labels.as_slice() {
        [] => ctx.storage.all_nodes()?,
        [single] => ctx.storage.nodes_by_label(single)?,
        [first, ..] => {
            let mut candidates = ctx.storage.nodes_by_label(first)?;
            candidates.retain(|n| node.labels.iter().all(|l| n.has_label(l)));
            candidates
        }
    };

    let mut out = Vec::with_capacity(scan.len());
    for candidate in scan {
        if labels_and_properties_match(node, &candidate, ctx, row)? {
            out.push(candidate.id);
        }
    }
    Ok(out)
}

fn node_matches(node: &NodePattern, id: &str, ctx: &MatchContext<'_>, row: &Row) -> Result<bool> {
    match ctx.storage.get_node(id)? {
        Some(n) => labels_and_properties_match(node, &n, ctx, row),
        None => Ok(false),
    }
}

fn labels_and_properties_match(
    node: &NodePattern,
    candidate: &Node,
    ctx: &MatchContext<'_>,
    row: &Row,
) -> Result<bool> {
    if !node.labels.iter().all(|l| candidate.has_label(l)) {
        return Ok(false);
    }
    if let Some(props) = &node.properties {
        let eval_ctx = ctx.eval_ctx();
        for (key, expr) in &props.pairs {
            let expected = evaluator::eval(expr, row, &eval_ctx)?;
            if candidate.property(key) != expected {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn expand_hop(
    rel: &RelationshipPattern,
    next_node: &NodePattern,
    partial: &Partial,
    ctx: &MatchContext<'_>,
) -> Result<Vec<Partial>> {
    let (row, trail) = partial;
    let Some(PathStep::Node(anchor)) = trail.last() else {
        return Err(Error::Internal("expected anchor node in path trail".to_string()));
    };

    match &rel.var_length {
        None => {
            let mut out = Vec::new();
            for hop in expand::expand_fixed(ctx.storage, anchor, rel)? {
                if !edge_matches(rel, &hop.edge, ctx, row)? {
                    continue;
                }
                if let Some(var) = &rel.variable {
                    if let Some(Value::Edge(bound_id)) = row.get(var) {
                        if bound_id != &hop.edge.id {
                            continue;
                        }
                    }
                }
                if !node_matches(next_node, &hop.to, ctx, row)? {
                    continue;
                }
                let mut next_row = row.clone();
                if let Some(var) = &rel.variable {
                    next_row.insert(var.clone(), Value::Edge(hop.edge.id.clone()));
                }
                if let Some(var) = &next_node.variable {
                    next_row.insert(var.clone(), Value::Node(hop.to.clone()));
                }
                let mut next_trail = trail.clone();
                next_trail.push(PathStep::Edge {
                    id: hop.edge.id.clone(),
                    forward: hop.forward,
                });
                next_trail.push(PathStep::Node(hop.to.clone()));
                out.push((next_row, next_trail));
            }
            Ok(out)
        }
        Some(vl) => {
            let min = vl.min.unwrap_or(1);
            let paths = expand::expand_variable_length(ctx.storage, anchor, rel, min, vl.max)?;
            let mut out = Vec::new();
            for path in paths {
                if !path.edges.iter().all(|e| type_and_property_match(rel, e, ctx, row)) {
                    continue;
                }
                if !node_matches(next_node, &path.end, ctx, row)? {
                    continue;
                }
                let mut next_row = row.clone();
                if let Some(var) = &rel.variable {
                    let rels: Vec<Value> =
                        path.edges.iter().map(|e| Value::Edge(e.id.clone())).collect();
                    next_row.insert(var.clone(), Value::List(rels));
                }
                if let Some(var) = &next_node.variable {
                    next_row.insert(var.clone(), Value::Node(path.end.clone()));
                }
                let mut next_trail = trail.clone();
                let mut cursor = anchor.clone();
                for edge in &path.edges {
                    let forward = edge.start == cursor;
                    next_trail.push(PathStep::Edge {
                        id: edge.id.clone(),
                        forward,
                    });
                    cursor = edge.other_end(&cursor).to_string();
                    next_trail.push(PathStep::Node(cursor.clone()));
                }
                out.push((next_row, next_trail));
            }
            Ok(out)
        }
    }
}

fn edge_matches(
    rel: &RelationshipPattern,
    edge: &nornicdb_api::Edge,
    ctx: &MatchContext<'_>,
    row: &Row,
) -> Result<bool> {
    if let Some(props) = &rel.properties {
        let eval_ctx = ctx.eval_ctx();
        for (key, expr) in &props.pairs {
            let expected = evaluator::eval(expr, row, &eval_ctx)?;
            if edge.property(key) != expected {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn type_and_property_match(
    rel: &RelationshipPattern,
    edge: &nornicdb_api::Edge,
    ctx: &MatchContext<'_>,
    row: &Row,
) -> bool {
    edge_matches(rel, edge, ctx, row).unwrap_or(false)
}

fn match_shortest(
    pattern: &Pattern,
    kind: ShortestPathKind,
    row: &Row,
    ctx: &MatchContext<'_>,
) -> Result<Vec<Row>> {
    let (PathElement::Node(start_pattern), PathElement::Relationship(rel), PathElement::Node(end_pattern)) =
        (
            pattern
                .elements
                .first()
                .ok_or_else(|| Error::Internal("shortestPath needs two nodes".to_string()))?,
            pattern
                .elements
                .get(1)
                .ok_or_else(|| Error::Internal("shortestPath needs a relationship".to_string()))?,
            pattern
                .elements
                .get(2)
                .ok_or_else(|| Error::Internal("shortestPath needs two nodes".to_string()))?,
        )
    else {
        return Err(Error::Internal(
            "shortestPath only supports a single-hop pattern shape".to_string(),
        ));
    };

    let starts = node_candidates(start_pattern, row, ctx)?;
    let ends = node_candidates(end_pattern, row, ctx)?;
    let max_hops = rel
        .var_length
        .and_then(|vl| vl.max)
        .unwrap_or(expand::DEFAULT_MAX_HOPS);
    let all = matches!(kind, ShortestPathKind::All);

    let mut rows = Vec::new();
    for start in &starts {
        for end in &ends {
            if start == end {
                continue;
            }
            let found = shortest::shortest_paths(ctx.storage, start, end, rel, max_hops, all)?;
            for path in found {
                let mut next_row = row.clone();
                if let Some(var) = &start_pattern.variable {
                    next_row.insert(var.clone(), Value::Node(start.clone()));
                }
                if let Some(var) = &end_pattern.variable {
                    next_row.insert(var.clone(), Value::Node(path.end.clone()));
                }
                if let Some(var) = &rel.variable {
                    let rels: Vec<Value> =
                        path.edges.iter().map(|e| Value::Edge(e.id.clone())).collect();
                    next_row.insert(var.clone(), Value::List(rels));
                }
                let mut trail = vec![PathStep::Node(start.clone())];
                let mut cursor = start.clone();
                for edge in &path.edges {
                    let forward = edge.start == cursor;
                    trail.push(PathStep::Edge {
                        id: edge.id.clone(),
                        forward,
                    });
                    cursor = edge.other_end(&cursor).to_string();
                    trail.push(PathStep::Node(cursor.clone()));
                }
                if let Some(alias) = &pattern.path_alias {
                    next_row.insert(alias.clone(), Value::Path(trail));
                }
                rows.push(next_row);
                if !all {
                    break;
                }
            }
        }
    }
    Ok(rows)
}

/// Cartesian product of two row sets with disjoint variable bindings,
/// used by the executor when a `MATCH` has multiple comma-separated
/// patterns that share no variables.
pub fn cartesian_product(left: Vec<Row>, right: &[Row]) -> Vec<Row> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in &left {
        for r in right {
            out.push(crate::frame::merge(l.clone(), r));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nornicdb_api::{Edge, Node};
    use nornicdb_storage::MemoryEngine;

    fn seed_line_graph() -> MemoryEngine {
        let engine = MemoryEngine::new();
        for (id, label) in [("a", "Person"), ("b", "Person"), ("c", "Person")] {
            let mut node = Node::new(id);
            node.labels.push(label.to_string());
            engine.create_node(node).unwrap();
        }
        engine
            .create_edge(Edge {
                id: "e1".to_string(),
                rel_type: "KNOWS".to_string(),
                start: "a".to_string(),
                end: "b".to_string(),
                properties: BTreeMap::new(),
            })
            .unwrap();
        engine
            .create_edge(Edge {
                id: "e2".to_string(),
                rel_type: "KNOWS".to_string(),
                start: "b".to_string(),
                end: "c".to_string(),
                properties: BTreeMap::new(),
            })
            .unwrap();
        engine
    }

    #[test]
    fn fixed_hop_matches_direct_neighbor() {
        let engine = seed_line_graph();
        let params = BTreeMap::new();
        let ctx = MatchContext::new(&engine, &params);
        let pattern = Pattern {
            path_alias: None,
            shortest: None,
            elements: vec![
                PathElement::Node(NodePattern {
                    variable: Some("n".to_string()),
                    labels: vec![],
                    properties: None,
                }),
                PathElement::Relationship(RelationshipPattern {
                    variable: None,
                    types: vec!["KNOWS".to_string()],
                    direction: nornicdb_api::Direction::Outgoing,
                    properties: None,
                    var_length: None,
                }),
                PathElement::Node(NodePattern {
                    variable: Some("m".to_string()),
                    labels: vec![],
                    properties: None,
                }),
            ],
        };
        let rows = match_patterns(&[pattern], vec![Row::new()], &ctx).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn variable_length_reaches_transitive_neighbor() {
        let engine = seed_line_graph();
        let params = BTreeMap::new();
        let ctx = MatchContext::new(&engine, &params);
        let pattern = Pattern {
            path_alias: None,
            shortest: None,
            elements: vec![
                PathElement::Node(NodePattern {
                    variable: Some("n".to_string()),
                    labels: vec![],
                    properties: Some(crate::ast::PropertyMap { pairs: vec![] }),
                }),
                PathElement::Relationship(RelationshipPattern {
                    variable: None,
                    types: vec!["KNOWS".to_string()],
                    direction: nornicdb_api::Direction::Outgoing,
                    properties: None,
                    var_length: Some(crate::ast::VariableLength { min: Some(1), max: Some(2) }),
                }),
                PathElement::Node(NodePattern {
                    variable: Some("m".to_string()),
                    labels: vec![],
                    properties: None,
                }),
            ],
        };
        let mut row = Row::new();
        row.insert("n".to_string(), Value::Node("a".to_string()));
        let rows = match_patterns(&[pattern], vec![row], &ctx).unwrap();
        let ends: Vec<&Value> = rows.iter().map(|r| &r["m"]).collect();
        assert!(ends.contains(&&Value::Node("b".to_string())));
        assert!(ends.contains(&&Value::Node("c".to_string())));
    }

    #[test]
    fn optional_match_pads_null_on_no_match() {
        let engine = seed_line_graph();
        let params = BTreeMap::new();
        let ctx = MatchContext::new(&engine, &params);
        let pattern = Pattern {
            path_alias: None,
            shortest: None,
            elements: vec![
                PathElement::Node(NodePattern {
                    variable: Some("n".to_string()),
                    labels: vec![],
                    properties: None,
                }),
                PathElement::Relationship(RelationshipPattern {
                    variable: None,
                    types: vec!["NOPE".to_string()],
                    direction: nornicdb_api::Direction::Outgoing,
                    properties: None,
                    var_length: None,
                }),
                PathElement::Node(NodePattern {
                    variable: Some("m".to_string()),
                    labels: vec![],
                    properties: None,
                }),
            ],
        };
        let mut row = Row::new();
        row.insert("n".to_string(), Value::Node("a".to_string()));
        let rows = optional_match_patterns(&[pattern], vec![row], &ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["m"], Value::Null);
    }
}
