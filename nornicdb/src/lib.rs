//! NornicDB: an embedded property-graph database with a Cypher subset.
//!
//! [`Db`] wires a [`nornicdb_api::StorageEngine`] to the
//! [`nornicdb_query::Session`] dispatcher and is the crate's one public
//! entry point; `nornic`, the CLI binary, is a thin wrapper over it.
//!
//! ## Quickstart
//!
//! ```
//! use nornicdb::Db;
//!
//! let db = Db::open_in_memory();
//! db.execute("CREATE (n:User {name: 'Alice', age: 30})", Default::default()).unwrap();
//! let result = db.execute("MATCH (n:User) RETURN n.name AS name", Default::default()).unwrap();
//! assert_eq!(result.rows.len(), 1);
//! ```

mod error;
pub mod materialize;

use nornicdb_api::{Embedder, StorageEngine, Value};
use nornicdb_storage::MemoryEngine;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use error::{Error, Result};
pub use nornicdb_api as api;
pub use nornicdb_query as query;
pub use nornicdb_query::QueryResult;

/// The embedded database handle: one [`nornicdb_query::Session`] bound to
/// one storage engine.
///
/// Durability is out of scope (see the workspace's design notes) -- the
/// only constructor opens an in-memory, non-persistent store. A durable
/// engine that implements [`StorageEngine`] is a drop-in replacement via
/// [`Db::with_storage`].
pub struct Db {
    session: query::Session,
}

impl Default for Db {
    fn default() -> Self {
        Self::open_in_memory()
    }
}

impl Db {
    /// Opens a fresh, empty in-memory database.
    pub fn open_in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryEngine::new()))
    }

    /// Wires a session to an arbitrary storage engine -- the extension
    /// point a durable implementation of [`StorageEngine`] plugs into.
    pub fn with_storage(storage: Arc<dyn StorageEngine>) -> Self {
        Db {
            session: query::Session::new(storage),
        }
    }

    /// Binds a text-to-vector embedder, enabling the string-literal query
    /// form of `db.index.vector.queryNodes`.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.session = self.session.with_embedder(embedder);
        self
    }

    /// Runs one Cypher statement against this database.
    pub fn execute(&self, query_text: &str, params: BTreeMap<String, Value>) -> Result<QueryResult> {
        Ok(self.session.execute(query_text, params)?)
    }

    /// Runs one Cypher statement and resolves every `Node`/`Edge`/`Path`
    /// value in the result into a self-contained map (§6's wire-agnostic
    /// row encoding), for callers -- the CLI, a future network front-end --
    /// that hand the result to something outside the process.
    pub fn execute_materialized(&self, query_text: &str, params: BTreeMap<String, Value>) -> Result<QueryResult> {
        let mut result = self.execute(query_text, params)?;
        for row in &mut result.rows {
            for value in row.values_mut() {
                *value = materialize::materialize(value, self.storage().as_ref());
            }
        }
        Ok(result)
    }

    /// The storage engine this database's session is bound to, for callers
    /// that need direct access (e.g. the CLI's bulk importer).
    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        self.session.storage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_starts_empty() {
        let db = Db::open_in_memory();
        let result = db.execute("MATCH (n) RETURN n", BTreeMap::new()).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn create_then_match_observes_the_new_node() {
        let db = Db::open_in_memory();
        db.execute("CREATE (n:User {name: 'Alice', age: 30})", BTreeMap::new())
            .unwrap();
        let result = db
            .execute("MATCH (n:User) RETURN n.name AS name, n.age AS age", BTreeMap::new())
            .unwrap();
        assert_eq!(result.columns, vec!["name".to_string(), "age".to_string()]);
        assert_eq!(result.rows.len(), 1);
    }
}
