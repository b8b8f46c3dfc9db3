//! C9 -- the dispatcher/session: the single `Execute(query, params)` entry
//! point the facade crate drives, implementing §4.9's nine-step flow
//! (classify, plan cache, build AST, result cache, transaction, drive the
//! executor, commit/rollback, invalidate/insert, return).

use crate::ast::Query;
use crate::cache::{extract_label_dependencies, PlanCache, ResultCache};
use crate::error::Result;
use crate::executor::{self, QueryResult};
use nornicdb_api::{Embedder, StorageEngine, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_PLAN_CACHE_ENTRIES: usize = 10_000;

/// A long-lived query session bound to one storage engine, carrying the
/// plan and result caches across calls.
pub struct Session {
    storage: Arc<dyn StorageEngine>,
    embedder: Option<Arc<dyn Embedder>>,
    plan_cache: PlanCache,
    result_cache: ResultCache,
}

impl Session {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Session {
            storage,
            embedder: None,
            plan_cache: PlanCache::new(DEFAULT_PLAN_CACHE_ENTRIES),
            result_cache: ResultCache::new(DEFAULT_RESULT_TTL),
        }
    }

    /// Binds a text-to-vector embedder, enabling `db.index.vector.queryNodes`'s
    /// string-literal query form (spec's `NornicDB extension` to the
    /// Neo4j-shaped vector procedure set).
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.storage
    }

    /// Runs `query_text` with `params`, going through plan/result caching,
    /// transaction demarcation, and cache invalidation on write.
    pub fn execute(&self, query_text: &str, params: BTreeMap<String, Value>) -> Result<QueryResult> {
        let query = match self.plan_cache.get(query_text) {
            Some(cached) => cached,
            None => {
                let parsed = crate::parser::parse_query(query_text)?;
                self.plan_cache.put(query_text, parsed.clone());
                parsed
            }
        };

        let read_only = is_read_only(&query);
        if read_only {
            if let Some((columns, rows)) = self.result_cache.get(query_text, &params) {
                return Ok(QueryResult {
                    columns,
                    rows,
                    stats: nornicdb_api::QueryStats::default(),
                });
            }
        }

        let txn = self.storage.begin_transaction()?;
        let embedder = self.embedder.as_deref();
        match executor::execute_with_embedder(&query, self.storage.as_ref(), &params, embedder) {
            Ok(result) => {
                txn.commit()?;
                if result.stats.is_empty() {
                    if read_only {
                        self.result_cache.put(
                            query_text,
                            &params,
                            &query,
                            result.columns.clone(),
                            result.rows.clone(),
                        );
                    }
                } else {
                    let labels = extract_label_dependencies(&query);
                    if labels.is_empty() {
                        self.result_cache.invalidate_all();
                    } else {
                        self.result_cache.invalidate_labels(&labels);
                    }
                }
                Ok(result)
            }
            Err(e) => {
                txn.rollback()?;
                Err(e)
            }
        }
    }
}

/// A query is read-only (and thus result-cache eligible) when none of its
/// top-level clauses (or any `CALL {}`/`UNION` branch) can write.
fn is_read_only(query: &Query) -> bool {
    query.clauses.iter().all(clause_is_read_only)
}

fn clause_is_read_only(clause: &crate::ast::Clause) -> bool {
    use crate::ast::Clause;
    match clause {
        Clause::Create(_) | Clause::Merge(_) | Clause::Set(_) | Clause::Remove(_) | Clause::Delete(_) => false,
        Clause::Call(c) => {
            let subquery_read_only = match &c.subquery {
                Some(q) => is_read_only(q),
                None => true,
            };
            subquery_read_only && !c.name.to_ascii_lowercase().starts_with("apoc.periodic")
        }
        Clause::Foreach(f) => f.clauses.iter().all(clause_is_read_only),
        Clause::Union { query: q, .. } => is_read_only(q),
        Clause::Match(_) | Clause::Unwind(_) | Clause::With(_) | Clause::Return(_) | Clause::Raw { .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nornicdb_storage::MemoryEngine;

    #[test]
    fn read_after_write_sees_uncommitted_changes_in_same_session() {
        let session = Session::new(Arc::new(MemoryEngine::new()));
        session
            .execute("CREATE (n:Person {name: 'Ada'})", BTreeMap::new())
            .unwrap();
        let result = session
            .execute("MATCH (n:Person) RETURN n.name AS name", BTreeMap::new())
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("name"), Some(&Value::String("Ada".to_string())));
    }

    #[test]
    fn result_cache_is_invalidated_by_a_matching_write() {
        let session = Session::new(Arc::new(MemoryEngine::new()));
        session
            .execute("CREATE (n:Person {name: 'Ada'})", BTreeMap::new())
            .unwrap();
        session
            .execute("MATCH (n:Person) RETURN n.name AS name", BTreeMap::new())
            .unwrap();
        session
            .execute("CREATE (n:Person {name: 'Grace'})", BTreeMap::new())
            .unwrap();
        let result = session
            .execute("MATCH (n:Person) RETURN n.name AS name", BTreeMap::new())
            .unwrap();
        assert_eq!(result.rows.len(), 2);
    }
}
