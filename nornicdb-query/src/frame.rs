//! The binding frame (row): a flat map from bound variable name to
//! [`Value`], threaded through every clause executor.
//!
//! A node/edge/path value inside a row only ever holds the opaque id --
//! never a materialized [`nornicdb_api::Node`]/[`nornicdb_api::Edge`] --
//! so a row stays cheap to clone across pattern expansion and ordering,
//! and cyclic graph structure can never make a row self-referential.

use nornicdb_api::Value;
use std::collections::BTreeMap;

pub type Row = BTreeMap<String, Value>;

pub fn single(name: &str, value: Value) -> Row {
    let mut row = Row::new();
    row.insert(name.to_string(), value);
    row
}

/// Combines two rows that are known not to share variable names (the
/// planner only ever joins disjoint binding sets -- e.g. a cartesian
/// product between independent comma-separated patterns).
pub fn merge(mut left: Row, right: &Row) -> Row {
    for (k, v) in right {
        left.insert(k.clone(), v.clone());
    }
    left
}
