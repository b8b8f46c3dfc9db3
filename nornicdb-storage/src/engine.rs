use nornicdb_api::{Edge, Error, Node, Result, SchemaCatalog, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::schema::MemorySchemaCatalog;
use crate::txn::MemoryTransaction;

#[derive(Debug, Clone, Default)]
pub(crate) struct GraphData {
    pub(crate) nodes: HashMap<String, Node>,
    pub(crate) edges: HashMap<String, Edge>,
}

/// A non-durable, thread-safe [`StorageEngine`](nornicdb_api::StorageEngine)
/// backed entirely by in-process maps.
///
/// Transactions are implemented as snapshot/rollback: `begin_transaction`
/// clones the current node/edge maps, writes apply directly to the shared
/// store as they happen (so later clauses of the same query see them right
/// away), and `rollback` restores the clone. There is no crash safety and
/// no real MVCC -- the engine relies on the query dispatcher (C9) to drive
/// one statement's begin/commit or begin/rollback to completion before
/// starting the next.
pub struct MemoryEngine {
    pub(crate) data: Arc<RwLock<GraphData>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    schema: MemorySchemaCatalog,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine {
            data: Arc::new(RwLock::new(GraphData::default())),
            next_node_id: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
            schema: MemorySchemaCatalog::new(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GraphData> {
        self.data.read().expect("storage lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GraphData> {
        self.data.write().expect("storage lock poisoned")
    }
}

impl SchemaCatalog for MemoryEngine {
    fn labels(&self) -> Vec<String> {
        self.schema.labels()
    }
    fn relationship_types(&self) -> Vec<String> {
        self.schema.relationship_types()
    }
    fn property_keys(&self) -> Vec<String> {
        self.schema.property_keys()
    }
    fn indexes(&self) -> Vec<nornicdb_api::IndexMeta> {
        self.schema.indexes()
    }
    fn constraints(&self) -> Vec<nornicdb_api::ConstraintMeta> {
        self.schema.constraints()
    }
    fn create_index(&self, label: &str, property: &str) -> Result<()> {
        self.schema.create_index(label, property)
    }
    fn drop_index(&self, label: &str, property: &str) -> Result<()> {
        self.schema.drop_index(label, property)
    }
    fn create_constraint(&self, label: &str, property: &str, unique: bool) -> Result<()> {
        self.schema.create_constraint(label, property, unique)
    }
    fn drop_constraint(&self, label: &str, property: &str) -> Result<()> {
        self.schema.drop_constraint(label, property)
    }
    fn vector_indexes(&self) -> Vec<nornicdb_api::VectorIndexMeta> {
        self.schema.vector_indexes()
    }
    fn vector_index(&self, name: &str) -> Option<nornicdb_api::VectorIndexMeta> {
        self.schema.vector_index(name)
    }
    fn create_vector_index(
        &self,
        name: &str,
        label: &str,
        property: &str,
        dimensions: usize,
        similarity: nornicdb_api::VectorSimilarity,
    ) -> Result<()> {
        self.schema
            .create_vector_index(name, label, property, dimensions, similarity)
    }
    fn fulltext_indexes(&self) -> Vec<nornicdb_api::FulltextIndexMeta> {
        self.schema.fulltext_indexes()
    }
    fn fulltext_index(&self, name: &str) -> Option<nornicdb_api::FulltextIndexMeta> {
        self.schema.fulltext_index(name)
    }
    fn create_fulltext_index(
        &self,
        name: &str,
        labels: Vec<String>,
        properties: Vec<String>,
    ) -> Result<()> {
        self.schema.create_fulltext_index(name, labels, properties)
    }
}

impl nornicdb_api::StorageEngine for MemoryEngine {
    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.read().nodes.get(id).cloned())
    }

    fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        Ok(self.read().edges.get(id).cloned())
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.read().nodes.values().cloned().collect())
    }

    fn all_edges(&self) -> Result<Vec<Edge>> {
        Ok(self.read().edges.values().cloned().collect())
    }

    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        Ok(self
            .read()
            .nodes
            .values()
            .filter(|n| n.has_label(label))
            .cloned()
            .collect())
    }

    fn outgoing_edges(&self, node_id: &str) -> Result<Vec<Edge>> {
        Ok(self
            .read()
            .edges
            .values()
            .filter(|e| e.start == node_id)
            .cloned()
            .collect())
    }

    fn incoming_edges(&self, node_id: &str) -> Result<Vec<Edge>> {
        Ok(self
            .read()
            .edges
            .values()
            .filter(|e| e.end == node_id)
            .cloned()
            .collect())
    }

    fn edge_between(&self, start: &str, end: &str, rel_type: &str) -> Result<Option<Edge>> {
        Ok(self
            .read()
            .edges
            .values()
            .find(|e| e.start == start && e.end == end && e.rel_type == rel_type)
            .cloned())
    }

    fn create_node(&self, node: Node) -> Result<()> {
        let mut data = self.write();
        if data.nodes.contains_key(&node.id) {
            return Err(Error::AlreadyExists(node.id));
        }
        for label in &node.labels {
            self.schema.observe_label(label);
        }
        for key in node.properties.keys() {
            self.schema.observe_property_key(key);
        }
        data.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn update_node(&self, node: Node) -> Result<()> {
        let mut data = self.write();
        if !data.nodes.contains_key(&node.id) {
            return Err(Error::NotFound(node.id));
        }
        for label in &node.labels {
            self.schema.observe_label(label);
        }
        for key in node.properties.keys() {
            self.schema.observe_property_key(key);
        }
        data.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn delete_node(&self, id: &str) -> Result<()> {
        let mut data = self.write();
        if data.edges.values().any(|e| e.start == id || e.end == id) {
            return Err(Error::Other(format!(
                "cannot delete node {id}: still has relationships (use DETACH DELETE)"
            )));
        }
        data.nodes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn create_edge(&self, edge: Edge) -> Result<()> {
        let mut data = self.write();
        if data.edges.contains_key(&edge.id) {
            return Err(Error::AlreadyExists(edge.id));
        }
        if !data.nodes.contains_key(&edge.start) {
            return Err(Error::NotFound(edge.start));
        }
        if !data.nodes.contains_key(&edge.end) {
            return Err(Error::NotFound(edge.end));
        }
        self.schema.observe_rel_type(&edge.rel_type);
        for key in edge.properties.keys() {
            self.schema.observe_property_key(key);
        }
        data.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    fn update_edge(&self, edge: Edge) -> Result<()> {
        let mut data = self.write();
        if !data.edges.contains_key(&edge.id) {
            return Err(Error::NotFound(edge.id));
        }
        for key in edge.properties.keys() {
            self.schema.observe_property_key(key);
        }
        data.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    fn delete_edge(&self, id: &str) -> Result<()> {
        let mut data = self.write();
        data.edges
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn node_count(&self) -> Result<u64> {
        Ok(self.read().nodes.len() as u64)
    }

    fn edge_count(&self) -> Result<u64> {
        Ok(self.read().edges.len() as u64)
    }

    fn new_node_id(&self) -> Result<String> {
        Ok(self.next_node_id.fetch_add(1, Ordering::Relaxed).to_string())
    }

    fn new_edge_id(&self) -> Result<String> {
        Ok(self.next_edge_id.fetch_add(1, Ordering::Relaxed).to_string())
    }

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        let snapshot = self.read().clone();
        Ok(Box::new(MemoryTransaction::new(self.data.clone(), snapshot)))
    }

    fn schema(&self) -> &dyn SchemaCatalog {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nornicdb_api::StorageEngine;

    #[test]
    fn create_and_fetch_node() {
        let engine = MemoryEngine::new();
        let id = engine.new_node_id().unwrap();
        let mut node = Node::new(id.clone());
        node.labels.push("Person".to_string());
        engine.create_node(node).unwrap();

        let fetched = engine.get_node(&id).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert!(fetched.has_label("Person"));
        assert_eq!(engine.node_count().unwrap(), 1);
    }

    #[test]
    fn create_node_rejects_duplicate_id() {
        let engine = MemoryEngine::new();
        engine.create_node(Node::new("1")).unwrap();
        match engine.create_node(Node::new("1")) {
            Err(Error::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn delete_node_with_edges_fails_without_detach() {
        let engine = MemoryEngine::new();
        engine.create_node(Node::new("a")).unwrap();
        engine.create_node(Node::new("b")).unwrap();
        engine
            .create_edge(Edge {
                id: "e1".to_string(),
                rel_type: "KNOWS".to_string(),
                start: "a".to_string(),
                end: "b".to_string(),
                properties: Default::default(),
            })
            .unwrap();

        assert!(engine.delete_node("a").is_err());
        engine.delete_edge("e1").unwrap();
        engine.delete_node("a").unwrap();
    }

    #[test]
    fn rollback_restores_pre_transaction_state() {
        let engine = MemoryEngine::new();
        engine.create_node(Node::new("1")).unwrap();

        let txn = engine.begin_transaction().unwrap();
        engine.create_node(Node::new("2")).unwrap();
        assert_eq!(engine.node_count().unwrap(), 2);
        txn.rollback().unwrap();

        assert_eq!(engine.node_count().unwrap(), 1);
        assert!(engine.get_node("2").unwrap().is_none());
    }

    #[test]
    fn commit_keeps_writes() {
        let engine = MemoryEngine::new();
        let txn = engine.begin_transaction().unwrap();
        engine.create_node(Node::new("1")).unwrap();
        txn.commit().unwrap();
        assert_eq!(engine.node_count().unwrap(), 1);
    }

    #[test]
    fn outgoing_and_incoming_edges() {
        let engine = MemoryEngine::new();
        engine.create_node(Node::new("a")).unwrap();
        engine.create_node(Node::new("b")).unwrap();
        engine
            .create_edge(Edge {
                id: "e1".to_string(),
                rel_type: "KNOWS".to_string(),
                start: "a".to_string(),
                end: "b".to_string(),
                properties: Default::default(),
            })
            .unwrap();

        assert_eq!(engine.outgoing_edges("a").unwrap().len(), 1);
        assert_eq!(engine.incoming_edges("b").unwrap().len(), 1);
        assert!(engine.outgoing_edges("b").unwrap().is_empty());
    }
}
