//! Public API for the NornicDB Cypher execution core.
//!
//! This crate defines the universal [`Value`] type, the [`Node`]/[`Edge`]
//! domain records, and the two traits the query engine depends on as
//! external collaborators: [`StorageEngine`] (graph storage, CRUD, schema)
//! and [`Embedder`] (text-to-vector embedding for `db.index.vector.*`).
//!
//! Nothing in this crate knows how to parse or execute Cypher; it is the
//! seam between the query engine and whatever graph store backs it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

mod error;
pub mod value;

pub use error::{Error, Result};
pub use value::{Duration, PathStep, Value};

/// Opaque node identifier, minted by the storage engine.
pub type NodeId = String;
/// Opaque edge identifier, minted by the storage engine.
pub type EdgeId = String;

/// A graph node: an id, a label set, a property map, and an optional
/// embedding vector used by vector-index procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub embedding: Option<Vec<f32>>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            labels: Vec::new(),
            properties: BTreeMap::new(),
            embedding: None,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn property(&self, key: &str) -> Value {
        self.properties.get(key).cloned().unwrap_or(Value::Null)
    }
}

/// A directed, typed graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub rel_type: String,
    pub start: NodeId,
    pub end: NodeId,
    pub properties: BTreeMap<String, Value>,
}

impl Edge {
    pub fn property(&self, key: &str) -> Value {
        self.properties.get(key).cloned().unwrap_or(Value::Null)
    }

    /// The node at the far end of this edge as seen from `from`.
    pub fn other_end(&self, from: &str) -> &str {
        if self.start == from {
            &self.end
        } else {
            &self.start
        }
    }
}

/// Which direction a relationship pattern traverses, relative to the
/// anchor node it is written next to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Cosine / Euclidean / dot-product similarity, as accepted by
/// `db.index.vector.createNodeIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorSimilarity {
    Cosine,
    Euclidean,
    Dot,
}

impl VectorSimilarity {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cosine" => Some(Self::Cosine),
            "euclidean" => Some(Self::Euclidean),
            "dot" | "dotproduct" | "dot_product" => Some(Self::Dot),
            _ => None,
        }
    }
}

impl fmt::Display for VectorSimilarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
            Self::Dot => write!(f, "dot"),
        }
    }
}

/// Declared vector index metadata (C10 schema bridge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexMeta {
    pub name: String,
    pub label: String,
    pub property: String,
    pub dimensions: usize,
    pub similarity: VectorSimilarity,
}

/// Declared full-text index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulltextIndexMeta {
    pub name: String,
    pub labels: Vec<String>,
    pub properties: Vec<String>,
}

/// A plain (non-vector, non-fulltext) property index declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub label: String,
    pub property: String,
}

/// A `NODE KEY`/uniqueness constraint declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMeta {
    pub label: String,
    pub property: String,
    pub unique: bool,
}

/// Running totals produced by a write query, mirroring Cypher's
/// `QueryStatistics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
}

impl QueryStats {
    pub fn merge(&mut self, other: &QueryStats) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
        self.properties_set += other.properties_set;
        self.labels_added += other.labels_added;
        self.labels_removed += other.labels_removed;
    }

    pub fn is_empty(&self) -> bool {
        *self == QueryStats::default()
    }
}

/// Metadata bridge the query engine consults for labels, relationship
/// types, property keys, indexes, and constraints (C10).
///
/// Implementations are expected to be cheap to call repeatedly; the
/// query engine does not cache catalog reads beyond a single query.
pub trait SchemaCatalog: Send + Sync {
    fn labels(&self) -> Vec<String>;
    fn relationship_types(&self) -> Vec<String>;
    fn property_keys(&self) -> Vec<String>;

    fn indexes(&self) -> Vec<IndexMeta>;
    fn constraints(&self) -> Vec<ConstraintMeta>;

    fn create_index(&self, label: &str, property: &str) -> Result<()>;
    fn drop_index(&self, label: &str, property: &str) -> Result<()>;

    fn create_constraint(&self, label: &str, property: &str, unique: bool) -> Result<()>;
    fn drop_constraint(&self, label: &str, property: &str) -> Result<()>;

    fn vector_indexes(&self) -> Vec<VectorIndexMeta>;
    fn vector_index(&self, name: &str) -> Option<VectorIndexMeta>;
    fn create_vector_index(
        &self,
        name: &str,
        label: &str,
        property: &str,
        dimensions: usize,
        similarity: VectorSimilarity,
    ) -> Result<()>;

    fn fulltext_indexes(&self) -> Vec<FulltextIndexMeta>;
    fn fulltext_index(&self, name: &str) -> Option<FulltextIndexMeta>;
    fn create_fulltext_index(
        &self,
        name: &str,
        labels: Vec<String>,
        properties: Vec<String>,
    ) -> Result<()>;
}

/// A live write transaction against a [`StorageEngine`].
///
/// Writes issued through the engine while a transaction handle exists are
/// staged against that handle; they become visible to other callers of the
/// engine only once [`Transaction::commit`] runs.
pub trait Transaction: Send {
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// The storage collaborator the query engine drives: CRUD on nodes and
/// edges, label/adjacency lookups, and transaction demarcation.
///
/// This is deliberately a plain, object-safe, request/response surface
/// (not a zero-cost generic abstraction) -- the query engine only ever
/// holds it as `&dyn StorageEngine` or `Arc<dyn StorageEngine>`.
pub trait StorageEngine: Send + Sync {
    fn get_node(&self, id: &str) -> Result<Option<Node>>;
    fn get_edge(&self, id: &str) -> Result<Option<Edge>>;

    fn all_nodes(&self) -> Result<Vec<Node>>;
    fn all_edges(&self) -> Result<Vec<Edge>>;
    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>>;

    fn outgoing_edges(&self, node_id: &str) -> Result<Vec<Edge>>;
    fn incoming_edges(&self, node_id: &str) -> Result<Vec<Edge>>;
    fn edge_between(&self, start: &str, end: &str, rel_type: &str) -> Result<Option<Edge>>;

    /// Creates a node, returning [`Error::AlreadyExists`] if `node.id` is
    /// already taken (only relevant when the caller supplies its own id;
    /// the common path lets the engine mint one via [`StorageEngine::new_node_id`]).
    fn create_node(&self, node: Node) -> Result<()>;
    fn update_node(&self, node: Node) -> Result<()>;
    fn delete_node(&self, id: &str) -> Result<()>;

    fn create_edge(&self, edge: Edge) -> Result<()>;
    fn update_edge(&self, edge: Edge) -> Result<()>;
    fn delete_edge(&self, id: &str) -> Result<()>;

    fn node_count(&self) -> Result<u64>;
    fn edge_count(&self) -> Result<u64>;

    /// Mints a fresh, never-before-used node id.
    fn new_node_id(&self) -> Result<NodeId>;
    /// Mints a fresh, never-before-used edge id.
    fn new_edge_id(&self) -> Result<EdgeId>;

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    fn schema(&self) -> &dyn SchemaCatalog;
}

/// The embedding collaborator used by `db.create.setNodeVectorProperty`
/// and any procedure that must turn query-time text into a vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimensions(&self) -> usize;
}
