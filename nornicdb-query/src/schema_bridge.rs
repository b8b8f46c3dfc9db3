//! C10 -- uniqueness constraint enforcement.
//!
//! `CREATE`/`MERGE`/`SET` all funnel node writes through
//! [`check_node_constraints`] before committing them to storage. The
//! catalog itself (index/constraint bookkeeping) lives on
//! [`nornicdb_api::SchemaCatalog`]; this module only interprets it at
//! write time.

use crate::error::{Error, Result};
use nornicdb_api::{Node, StorageEngine};

/// Checks every declared uniqueness constraint on `node`'s labels against
/// the rest of storage, erroring on the first violation found.
///
/// A constraint only applies when the node actually carries the
/// constrained label and the constrained property is present -- Cypher's
/// uniqueness constraints do not require the property to exist.
pub fn check_node_constraints(storage: &dyn StorageEngine, node: &Node) -> Result<()> {
    let catalog = storage.schema();
    for constraint in catalog.constraints() {
        if !constraint.unique || !node.has_label(&constraint.label) {
            continue;
        }
        let Some(value) = node.properties.get(&constraint.property) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        for other in storage.nodes_by_label(&constraint.label)? {
            if other.id == node.id {
                continue;
            }
            if other.properties.get(&constraint.property) == Some(value) {
                return Err(Error::ConstraintViolation {
                    label: constraint.label.clone(),
                    property: constraint.property.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nornicdb_storage::MemoryEngine;

    #[test]
    fn rejects_duplicate_unique_property() {
        let storage = MemoryEngine::new();
        storage.schema().create_constraint("Person", "email", true).unwrap();

        let mut first = Node::new(storage.new_node_id().unwrap());
        first.labels.push("Person".to_string());
        first
            .properties
            .insert("email".to_string(), nornicdb_api::Value::String("a@example.com".to_string()));
        storage.create_node(first).unwrap();

        let mut second = Node::new(storage.new_node_id().unwrap());
        second.labels.push("Person".to_string());
        second
            .properties
            .insert("email".to_string(), nornicdb_api::Value::String("a@example.com".to_string()));

        let err = check_node_constraints(&storage, &second).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation { .. }));
    }

    #[test]
    fn allows_distinct_values() {
        let storage = MemoryEngine::new();
        storage.schema().create_constraint("Person", "email", true).unwrap();

        let mut first = Node::new(storage.new_node_id().unwrap());
        first.labels.push("Person".to_string());
        first
            .properties
            .insert("email".to_string(), nornicdb_api::Value::String("a@example.com".to_string()));
        storage.create_node(first).unwrap();

        let mut second = Node::new(storage.new_node_id().unwrap());
        second.labels.push("Person".to_string());
        second
            .properties
            .insert("email".to_string(), nornicdb_api::Value::String("b@example.com".to_string()));

        assert!(check_node_constraints(&storage, &second).is_ok());
    }
}
