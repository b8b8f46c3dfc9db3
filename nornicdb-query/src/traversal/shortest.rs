//! `shortestPath`/`allShortestPaths`: breadth-first search bounded by the
//! pattern's type/direction constraints and (for `shortestPath`) the
//! variable-length pattern's max hop count.

use crate::ast::RelationshipPattern;
use crate::error::Result;
use nornicdb_api::{Edge, StorageEngine};
use std::collections::{HashMap, VecDeque};

use super::expand::expand_fixed;

pub struct FoundPath {
    pub edges: Vec<Edge>,
    pub end: String,
}

/// BFS layer-by-layer from `start`; stops at the first layer that reaches
/// `end`. Returns every edge-distinct path of that minimal length when
/// `all` is set, otherwise returns at most one.
pub fn shortest_paths(
    storage: &dyn StorageEngine,
    start: &str,
    end: &str,
    rel: &RelationshipPattern,
    max_hops: u32,
    all: bool,
) -> Result<Vec<FoundPath>> {
    if start == end {
        return Ok(vec![FoundPath {
            edges: Vec::new(),
            end: start.to_string(),
        }]);
    }

    // predecessors[node] = list of (edge, from_node) that reach `node` at
    // the current BFS depth -- multiple entries only matter when `all` is
    // requested.
    let mut predecessors: HashMap<String, Vec<(Edge, String)>> = HashMap::new();
    let mut depth: HashMap<String, u32> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    depth.insert(start.to_string(), 0);
    queue.push_back(start.to_string());
    let mut found_depth: Option<u32> = None;

    while let Some(current) = queue.pop_front() {
        let current_depth = depth[&current];
        if let Some(fd) = found_depth {
            if current_depth >= fd {
                continue;
            }
        }
        if current_depth >= max_hops {
            continue;
        }
        for hop in expand_fixed(storage, &current, rel)? {
            let next_depth = current_depth + 1;
            match depth.get(&hop.to) {
                None => {
                    depth.insert(hop.to.clone(), next_depth);
                    predecessors
                        .entry(hop.to.clone())
                        .or_default()
                        .push((hop.edge, current.clone()));
                    if hop.to == end {
                        found_depth = Some(next_depth);
                        if !all {
                            queue.clear();
                            break;
                        }
                    } else {
                        queue.push_back(hop.to.clone());
                    }
                }
                Some(&existing_depth) if existing_depth == next_depth && all => {
                    predecessors
                        .entry(hop.to.clone())
                        .or_default()
                        .push((hop.edge, current.clone()));
                }
                _ => {}
            }
        }
    }

    if !depth.contains_key(end) {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    reconstruct(end, end, &predecessors, &mut Vec::new(), &mut paths, all);
    Ok(paths)
}

fn reconstruct(
    node: &str,
    destination: &str,
    predecessors: &HashMap<String, Vec<(Edge, String)>>,
    acc: &mut Vec<Edge>,
    out: &mut Vec<FoundPath>,
    all: bool,
) {
    match predecessors.get(node) {
        None => {
            let mut edges = acc.clone();
            edges.reverse();
            out.push(FoundPath {
                edges,
                end: destination.to_string(),
            });
        }
        Some(preds) => {
            for (edge, from) in preds {
                acc.push(edge.clone());
                reconstruct(from, destination, predecessors, acc, out, all);
                acc.pop();
                if !all && !out.is_empty() {
                    return;
                }
            }
        }
    }
}
