//! `apoc.path.subgraphNodes`/`expand`/`spanningTree` -- configurable BFS/DFS
//! expansion from a start node, grounded on the fixed-length hop primitive
//! the pattern-matching engine (C5) already uses.

use super::Record;
use crate::error::{Error, Result};
use crate::evaluator::EvalContext;
use nornicdb_api::{Direction, PathStep, StorageEngine, Value};
use std::collections::{HashSet, VecDeque};

struct PathConfig {
    max_level: i64,
    min_level: i64,
    rel_filter: Vec<(String, Direction)>,
    label_include: Vec<String>,
    label_exclude: Vec<String>,
    label_terminate: Vec<String>,
    limit: Option<usize>,
    bfs: bool,
}

impl PathConfig {
    fn parse(arguments: &[Value], idx: usize, default_max_level: i64) -> Self {
        let mut cfg = PathConfig {
            max_level: default_max_level,
            min_level: 0,
            rel_filter: Vec::new(),
            label_include: Vec::new(),
            label_exclude: Vec::new(),
            label_terminate: Vec::new(),
            limit: None,
            bfs: true,
        };
        let Some(Value::Map(map)) = arguments.get(idx) else {
            return cfg;
        };
        if let Some(v) = map.get("maxLevel").and_then(Value::as_f64) {
            cfg.max_level = v as i64;
        }
        if let Some(v) = map.get("minLevel").and_then(Value::as_f64) {
            cfg.min_level = v as i64;
        }
        if let Some(Value::String(s)) = map.get("relationshipFilter") {
            cfg.rel_filter = parse_rel_filter(s);
        }
        if let Some(Value::String(s)) = map.get("labelFilter") {
            parse_label_filter(s, &mut cfg.label_include, &mut cfg.label_exclude, &mut cfg.label_terminate);
        }
        if let Some(v) = map.get("limit").and_then(Value::as_f64) {
            cfg.limit = Some(v as usize);
        }
        if let Some(Value::Bool(b)) = map.get("bfs") {
            cfg.bfs = *b;
        }
        cfg
    }

    fn passes_label_filter(&self, labels: &[String]) -> bool {
        if !self.label_include.is_empty() && !self.label_include.iter().any(|l| labels.contains(l)) {
            return false;
        }
        if self.label_exclude.iter().any(|l| labels.contains(l)) {
            return false;
        }
        true
    }

    fn terminates(&self, labels: &[String]) -> bool {
        self.label_terminate.iter().any(|l| labels.contains(l))
    }
}

fn parse_rel_filter(spec: &str) -> Vec<(String, Direction)> {
    spec.split('|')
        .filter(|s| !s.is_empty())
        .map(|part| {
            if let Some(rest) = part.strip_prefix('>') {
                (rest.to_string(), Direction::Outgoing)
            } else if let Some(rest) = part.strip_prefix('<') {
                (rest.to_string(), Direction::Incoming)
            } else {
                (part.to_string(), Direction::Both)
            }
        })
        .collect()
}

fn parse_label_filter(spec: &str, include: &mut Vec<String>, exclude: &mut Vec<String>, terminate: &mut Vec<String>) {
    for part in spec.split('|').filter(|s| !s.is_empty()) {
        if let Some(rest) = part.strip_prefix('+') {
            include.push(rest.to_string());
        } else if let Some(rest) = part.strip_prefix('-') {
            exclude.push(rest.to_string());
        } else if let Some(rest) = part.strip_prefix('/') {
            terminate.push(rest.to_string());
        }
    }
}

fn hops(storage: &dyn StorageEngine, node_id: &str, cfg: &PathConfig) -> Result<Vec<(String, bool, String)>> {
    let mut out = Vec::new();
    let directions: Vec<(&str, Direction)> = if cfg.rel_filter.is_empty() {
        vec![("", Direction::Both)]
    } else {
        cfg.rel_filter.iter().map(|(t, d)| (t.as_str(), *d)).collect()
    };
    for (rel_type, direction) in directions {
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for edge in storage.outgoing_edges(node_id)? {
                if rel_type.is_empty() || edge.rel_type == rel_type {
                    out.push((edge.id.clone(), true, edge.end.clone()));
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for edge in storage.incoming_edges(node_id)? {
                if rel_type.is_empty() || edge.rel_type == rel_type {
                    out.push((edge.id.clone(), false, edge.start.clone()));
                }
            }
        }
    }
    Ok(out)
}

fn node_id_arg(arguments: &[Value]) -> Result<String> {
    match arguments.first() {
        Some(Value::Node(id)) => Ok(id.clone()),
        Some(Value::String(id)) => Ok(id.clone()),
        other => Err(Error::type_error("Node", format!("{other:?}"))),
    }
}

pub fn subgraph_nodes(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let start = node_id_arg(arguments)?;
    let cfg = PathConfig::parse(arguments, 1, 3);

    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(String, i64)> = VecDeque::new();
    frontier.push_back((start.clone(), 0));
    visited.insert(start);
    let mut out = Vec::new();

    while let Some((node_id, depth)) = pop(&mut frontier, cfg.bfs) {
        let node = match ctx.storage.get_node(&node_id)? {
            Some(n) => n,
            None => continue,
        };
        if depth >= cfg.min_level && depth <= cfg.max_level && cfg.passes_label_filter(&node.labels) {
            out.push(super::record(&[("node", Value::Node(node_id.clone()))]));
            if let Some(limit) = cfg.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        if depth >= cfg.max_level || cfg.terminates(&node.labels) {
            continue;
        }
        for (_, _, next_id) in hops(ctx.storage, &node_id, &cfg)? {
            if visited.insert(next_id.clone()) {
                frontier.push_back((next_id, depth + 1));
            }
        }
    }
    Ok(out)
}

fn pop<T>(queue: &mut VecDeque<T>, bfs: bool) -> Option<T> {
    if bfs {
        queue.pop_front()
    } else {
        queue.pop_back()
    }
}

pub fn expand(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let start = node_id_arg(arguments)?;
    let cfg = PathConfig::parse(arguments, 1, 3);

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.clone());
    let mut out = Vec::new();
    walk_paths(ctx.storage, &start, 0, vec![PathStep::Node(start.clone())], &cfg, &mut visited, &mut out)?;
    if let Some(limit) = cfg.limit {
        out.truncate(limit);
    }
    Ok(out.into_iter().map(|path| super::record(&[("path", Value::Path(path))])).collect())
}

#[allow(clippy::too_many_arguments)]
fn walk_paths(
    storage: &dyn StorageEngine,
    node_id: &str,
    depth: i64,
    trail: Vec<PathStep>,
    cfg: &PathConfig,
    visited: &mut HashSet<String>,
    out: &mut Vec<Vec<PathStep>>,
) -> Result<()> {
    let Some(node) = storage.get_node(node_id)? else {
        return Ok(());
    };
    if depth >= cfg.min_level && cfg.passes_label_filter(&node.labels) {
        out.push(trail.clone());
    }
    if depth >= cfg.max_level || cfg.terminates(&node.labels) {
        return Ok(());
    }
    for (edge_id, forward, next_id) in hops(storage, node_id, cfg)? {
        if !visited.insert(next_id.clone()) {
            continue;
        }
        let mut next_trail = trail.clone();
        next_trail.push(PathStep::Edge { id: edge_id, forward });
        next_trail.push(PathStep::Node(next_id.clone()));
        walk_paths(storage, &next_id, depth + 1, next_trail, cfg, visited, out)?;
        visited.remove(&next_id);
    }
    Ok(())
}

pub fn spanning_tree(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let start = node_id_arg(arguments)?;
    let mut cfg = PathConfig::parse(arguments, 1, -1);
    if cfg.max_level < 0 {
        cfg.max_level = i64::MAX;
    }

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.clone());
    let mut frontier: VecDeque<(String, i64, Vec<PathStep>)> = VecDeque::new();
    frontier.push_back((start.clone(), 0, vec![PathStep::Node(start.clone())]));
    let mut out = Vec::new();

    while let Some((node_id, depth, trail)) = pop(&mut frontier, cfg.bfs) {
        let node = match ctx.storage.get_node(&node_id)? {
            Some(n) => n,
            None => continue,
        };
        if depth >= cfg.min_level && cfg.passes_label_filter(&node.labels) {
            out.push(trail.clone());
        }
        if depth >= cfg.max_level || cfg.terminates(&node.labels) {
            continue;
        }
        for (edge_id, forward, next_id) in hops(ctx.storage, &node_id, &cfg)? {
            if visited.insert(next_id.clone()) {
                let mut next_trail = trail.clone();
                next_trail.push(PathStep::Edge { id: edge_id, forward });
                next_trail.push(PathStep::Node(next_id.clone()));
                frontier.push_back((next_id, depth + 1, next_trail));
            }
        }
    }
    Ok(out.into_iter().map(|path| super::record(&[("path", Value::Path(path))])).collect())
}
