//! Fixed- and variable-length relationship expansion from a single anchor
//! node, respecting type and direction constraints.

use crate::ast::RelationshipPattern;
use crate::error::Result;
use nornicdb_api::{Direction, Edge, StorageEngine};

/// A relationship hop candidate: the edge crossed and the node landed on.
pub struct Hop {
    pub edge: Edge,
    pub to: String,
    pub forward: bool,
}

/// Cypher caps unbounded variable-length patterns (`*`, `*2..`) at a
/// generous but finite depth so an unbounded pattern on a cyclic graph
/// terminates; 15 matches the depth used elsewhere in path procedures.
pub const DEFAULT_MAX_HOPS: u32 = 15;

fn candidate_edges(
    storage: &dyn StorageEngine,
    anchor: &str,
    rel: &RelationshipPattern,
) -> Result<Vec<Hop>> {
    let mut hops = Vec::new();
    if matches!(rel.direction, Direction::Outgoing | Direction::Both) {
        for edge in storage.outgoing_edges(anchor)? {
            if type_matches(&rel.types, &edge.rel_type) {
                hops.push(Hop {
                    to: edge.end.clone(),
                    edge,
                    forward: true,
                });
            }
        }
    }
    if matches!(rel.direction, Direction::Incoming | Direction::Both) {
        for edge in storage.incoming_edges(anchor)? {
            if type_matches(&rel.types, &edge.rel_type) {
                hops.push(Hop {
                    to: edge.start.clone(),
                    edge,
                    forward: false,
                });
            }
        }
    }
    Ok(hops)
}

fn type_matches(types: &[String], rel_type: &str) -> bool {
    types.is_empty() || types.iter().any(|t| t == rel_type)
}

/// One fixed-length hop: every edge (in the requested direction(s)) out of
/// `anchor` whose type matches.
pub fn expand_fixed(
    storage: &dyn StorageEngine,
    anchor: &str,
    rel: &RelationshipPattern,
) -> Result<Vec<Hop>> {
    candidate_edges(storage, anchor, rel)
}

/// A completed variable-length path: the ordered edges crossed and the
/// node the path ends on.
pub struct VarLengthPath {
    pub edges: Vec<Edge>,
    pub end: String,
}

/// Enumerates every simple path (no repeated edge) of length in
/// `[min, max]` starting at `anchor` along `rel`'s type/direction
/// constraints. `max` defaults to [`DEFAULT_MAX_HOPS`] when the pattern
/// left it unbounded.
pub fn expand_variable_length(
    storage: &dyn StorageEngine,
    anchor: &str,
    rel: &RelationshipPattern,
    min: u32,
    max: Option<u32>,
) -> Result<Vec<VarLengthPath>> {
    let max = max.unwrap_or(DEFAULT_MAX_HOPS);
    let mut results = Vec::new();
    let mut stack_edges: Vec<Edge> = Vec::new();
    let mut visited_edge_ids: Vec<String> = Vec::new();
    walk(
        storage,
        anchor,
        rel,
        min,
        max,
        &mut stack_edges,
        &mut visited_edge_ids,
        &mut results,
    )?;
    Ok(results)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    storage: &dyn StorageEngine,
    current: &str,
    rel: &RelationshipPattern,
    min: u32,
    max: u32,
    edges: &mut Vec<Edge>,
    visited_edge_ids: &mut Vec<String>,
    results: &mut Vec<VarLengthPath>,
) -> Result<()> {
    if edges.len() as u32 >= min {
        results.push(VarLengthPath {
            edges: edges.clone(),
            end: current.to_string(),
        });
    }
    if edges.len() as u32 >= max {
        return Ok(());
    }
    for hop in candidate_edges(storage, current, rel)? {
        if visited_edge_ids.contains(&hop.edge.id) {
            continue;
        }
        visited_edge_ids.push(hop.edge.id.clone());
        edges.push(hop.edge);
        walk(storage, &hop.to, rel, min, max, edges, visited_edge_ids, results)?;
        edges.pop();
        visited_edge_ids.pop();
    }
    Ok(())
}
