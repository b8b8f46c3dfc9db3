//! The wire-agnostic result encoding from the spec's external-interface
//! section: a query result only ever carries opaque `Value::Node`/`Edge`/
//! `Path` references internally (see `nornicdb_query::frame`), so callers
//! that need a self-contained representation -- the CLI's JSON output, a
//! future network front-end -- materialize those references into maps
//! through [`materialize`] before handing the result to the caller.

use nornicdb_api::{PathStep, StorageEngine, Value};
use std::collections::BTreeMap;

/// Recursively resolves every `Node`/`Edge`/`Path` value reachable from
/// `value` against `storage`, turning each into a self-contained map:
/// a node becomes `{identifier, labels, properties}`, an edge becomes
/// `{identifier, type, start, end, properties}`, and a path becomes
/// `{nodes, relationships, length}`. A dangling reference (the entity was
/// deleted earlier in the same query) materializes to `Null` rather than
/// erroring -- the row already proved the reference existed at bind time.
pub fn materialize(value: &Value, storage: &dyn StorageEngine) -> Value {
    match value {
        Value::Node(id) => match storage.get_node(id) {
            Ok(Some(node)) => {
                let mut map = BTreeMap::new();
                map.insert("identifier".to_string(), Value::String(node.id.clone()));
                map.insert(
                    "labels".to_string(),
                    Value::List(node.labels.iter().cloned().map(Value::String).collect()),
                );
                map.insert("properties".to_string(), Value::Map(node.properties.clone()));
                Value::Map(map)
            }
            _ => Value::Null,
        },
        Value::Edge(id) => match storage.get_edge(id) {
            Ok(Some(edge)) => {
                let mut map = BTreeMap::new();
                map.insert("identifier".to_string(), Value::String(edge.id.clone()));
                map.insert("type".to_string(), Value::String(edge.rel_type.clone()));
                map.insert("start".to_string(), Value::String(edge.start.clone()));
                map.insert("end".to_string(), Value::String(edge.end.clone()));
                map.insert("properties".to_string(), Value::Map(edge.properties.clone()));
                Value::Map(map)
            }
            _ => Value::Null,
        },
        Value::Path(steps) => {
            let mut nodes = Vec::new();
            let mut relationships = Vec::new();
            for step in steps {
                match step {
                    PathStep::Node(id) => nodes.push(materialize(&Value::Node(id.clone()), storage)),
                    PathStep::Edge { id, .. } => {
                        relationships.push(materialize(&Value::Edge(id.clone()), storage))
                    }
                }
            }
            let length = relationships.len() as i64;
            let mut map = BTreeMap::new();
            map.insert("nodes".to_string(), Value::List(nodes));
            map.insert("relationships".to_string(), Value::List(relationships));
            map.insert("length".to_string(), Value::Int(length));
            Value::Map(map)
        }
        Value::List(items) => Value::List(items.iter().map(|v| materialize(v, storage)).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), materialize(v, storage)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// [`serde_json::Value`] rendering of an already-[`materialize`]d
/// [`Value`] -- used by the CLI's JSON output mode.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::json!(f),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Duration(d) => serde_json::Value::String(d.to_string()),
        Value::Timestamp(t) => serde_json::Value::String(t.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(k.clone(), to_json(v));
            }
            serde_json::Value::Object(map)
        }
        // Unmaterialized references only reach here if the caller skipped
        // `materialize` -- fall back to the opaque id so output stays valid JSON.
        Value::Node(id) | Value::Edge(id) => serde_json::json!({ "identifier": id }),
        Value::Path(steps) => serde_json::json!({ "length": steps.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nornicdb_storage::MemoryEngine;
    use std::sync::Arc;

    #[test]
    fn materializes_a_node_reference_into_an_identifier_labels_properties_map() {
        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        let id = storage.new_node_id().unwrap();
        let mut node = nornicdb_api::Node::new(id.clone());
        node.labels.push("User".to_string());
        node.properties.insert("name".to_string(), Value::String("Ada".to_string()));
        storage.create_node(node).unwrap();

        let materialized = materialize(&Value::Node(id.clone()), storage.as_ref());
        let Value::Map(map) = materialized else {
            panic!("expected a map");
        };
        assert_eq!(map.get("identifier"), Some(&Value::String(id)));
        assert_eq!(map.get("labels"), Some(&Value::List(vec![Value::String("User".to_string())])));
    }

    #[test]
    fn materializes_a_dangling_reference_to_null() {
        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        assert_eq!(materialize(&Value::Node("missing".to_string()), storage.as_ref()), Value::Null);
    }

    #[test]
    fn materializes_a_path_into_nodes_relationships_length() {
        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        let a = storage.new_node_id().unwrap();
        let b = storage.new_node_id().unwrap();
        storage.create_node(nornicdb_api::Node::new(a.clone())).unwrap();
        storage.create_node(nornicdb_api::Node::new(b.clone())).unwrap();
        let edge_id = storage.new_edge_id().unwrap();
        storage
            .create_edge(nornicdb_api::Edge {
                id: edge_id.clone(),
                rel_type: "LINK".to_string(),
                start: a.clone(),
                end: b.clone(),
                properties: Default::default(),
            })
            .unwrap();

        let path = Value::Path(vec![
            PathStep::Node(a),
            PathStep::Edge { id: edge_id, forward: true },
            PathStep::Node(b),
        ]);
        let Value::Map(map) = materialize(&path, storage.as_ref()) else {
            panic!("expected a map");
        };
        assert_eq!(map.get("length"), Some(&Value::Int(1)));
        assert!(matches!(map.get("nodes"), Some(Value::List(nodes)) if nodes.len() == 2));
    }
}
