//! C8 -- the two-tier query cache.
//!
//! [`PlanCache`] maps normalized query text to its parsed [`Query`],
//! sparing the dispatcher a re-parse of a repeated statement.
//! [`ResultCache`] maps `(query text, params)` to a previously computed
//! result set for read-only queries, label-scoped so a write only
//! invalidates the entries it could actually affect.
//!
//! Grounded on the `other_examples` corpus's intelligent query-cache
//! module (dependency-set invalidation, TTL, hit/miss counters), adapted
//! to this engine's plain `std::sync::RwLock` rather than `parking_lot`
//! (the teacher crates never pull in `parking_lot`).

use crate::ast::{Clause, Query};
use crate::frame::Row;
use nornicdb_api::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A normalized cache key: whitespace-collapsed query text. Two queries
/// differing only in incidental whitespace share a plan cache entry.
fn normalize(query_text: &str) -> String {
    query_text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Caches parsed query ASTs keyed on normalized text. Bounded by
/// `max_entries`; evicts the least-recently-inserted entry once full (a
/// plain FIFO bound, not a full LRU -- plan caching only needs to avoid
/// repeated parse cost for hot statements, not perfect recency tracking).
pub struct PlanCache {
    entries: RwLock<HashMap<String, Query>>,
    insertion_order: RwLock<Vec<String>>,
    stats: RwLock<PlanCacheStats>,
    max_entries: usize,
}

impl PlanCache {
    pub fn new(max_entries: usize) -> Self {
        PlanCache {
            entries: RwLock::new(HashMap::new()),
            insertion_order: RwLock::new(Vec::new()),
            stats: RwLock::new(PlanCacheStats::default()),
            max_entries,
        }
    }

    pub fn get(&self, query_text: &str) -> Option<Query> {
        let key = normalize(query_text);
        let found = self.entries.read().unwrap().get(&key).cloned();
        let mut stats = self.stats.write().unwrap();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    pub fn put(&self, query_text: &str, query: Query) {
        let key = normalize(query_text);
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let mut order = self.insertion_order.write().unwrap();
            if let Some(oldest) = order.first().cloned() {
                entries.remove(&oldest);
                order.remove(0);
            }
        }
        if !entries.contains_key(&key) {
            self.insertion_order.write().unwrap().push(key.clone());
        }
        entries.insert(key, query);
    }

    /// A schema change (index/constraint DDL) invalidates every cached
    /// plan: a plan's shape never changes with schema, but the facade
    /// clears the whole cache conservatively rather than track which
    /// plans read schema state.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
        self.insertion_order.write().unwrap().clear();
    }

    pub fn stats(&self) -> PlanCacheStats {
        *self.stats.read().unwrap()
    }
}

/// Every label a query's `MATCH`/`MERGE`/`CREATE` clauses reference --
/// the scope a write to that label must invalidate.
pub(crate) fn extract_label_dependencies(query: &Query) -> HashSet<String> {
    let mut labels = HashSet::new();
    for clause in &query.clauses {
        match clause {
            Clause::Match(m) => collect_pattern_labels(&m.patterns, &mut labels),
            Clause::Merge(m) => collect_pattern_labels(std::slice::from_ref(&m.pattern), &mut labels),
            Clause::Create(c) => collect_pattern_labels(&c.patterns, &mut labels),
            _ => {}
        }
    }
    labels
}

fn collect_pattern_labels(patterns: &[crate::ast::Pattern], labels: &mut HashSet<String>) {
    for pattern in patterns {
        for element in &pattern.elements {
            if let crate::ast::PathElement::Node(node) = element {
                labels.extend(node.labels.iter().cloned());
            }
        }
    }
}

fn hash_key(query_text: &str, params: &BTreeMap<String, Value>) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    query_text.hash(&mut hasher);
    for (k, v) in params {
        k.hash(&mut hasher);
        format!("{v:?}").hash(&mut hasher);
    }
    hasher.finish()
}

struct CachedResult {
    columns: Vec<String>,
    rows: Vec<Row>,
    cached_at: Instant,
    ttl: Duration,
    labels: HashSet<String>,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct ResultCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub label_invalidations: u64,
    pub full_invalidations: u64,
}

/// Caches read-only query results, scoped by the labels the query
/// depended on so a write only drops entries it could have affected.
pub struct ResultCache {
    entries: RwLock<HashMap<u64, CachedResult>>,
    stats: RwLock<ResultCacheStats>,
    default_ttl: Duration,
}

impl ResultCache {
    pub fn new(default_ttl: Duration) -> Self {
        ResultCache {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(ResultCacheStats::default()),
            default_ttl,
        }
    }

    pub fn get(&self, query_text: &str, params: &BTreeMap<String, Value>) -> Option<(Vec<String>, Vec<Row>)> {
        let key = hash_key(query_text, params);
        let mut entries = self.entries.write().unwrap();
        let mut stats = self.stats.write().unwrap();
        match entries.get(&key) {
            Some(entry) if entry.cached_at.elapsed() < entry.ttl => {
                stats.hits += 1;
                Some((entry.columns.clone(), entry.rows.clone()))
            }
            Some(_) => {
                entries.remove(&key);
                stats.misses += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, query_text: &str, params: &BTreeMap<String, Value>, query: &Query, columns: Vec<String>, rows: Vec<Row>) {
        let key = hash_key(query_text, params);
        let labels = extract_label_dependencies(query);
        self.entries.write().unwrap().insert(
            key,
            CachedResult {
                columns,
                rows,
                cached_at: Instant::now(),
                ttl: self.default_ttl,
                labels,
            },
        );
    }

    /// Drops every cached entry that depended on any of `labels` -- the
    /// scoped invalidation a successful write triggers.
    pub fn invalidate_labels(&self, labels: &HashSet<String>) {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.labels.is_disjoint(labels));
        let dropped = before - entries.len();
        if dropped > 0 {
            self.stats.write().unwrap().label_invalidations += dropped as u64;
        }
    }

    /// Full clear, used when a write's label scope cannot be determined
    /// statically (e.g. a dynamic `apoc.cypher.run` body).
    pub fn invalidate_all(&self) {
        self.entries.write().unwrap().clear();
        self.stats.write().unwrap().full_invalidations += 1;
    }

    pub fn stats(&self) -> ResultCacheStats {
        *self.stats.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;

    #[test]
    fn plan_cache_hits_on_repeated_normalized_text() {
        let cache = PlanCache::new(10);
        let query = parse_query("MATCH (n) RETURN n").unwrap();
        cache.put("MATCH (n) RETURN n", query);
        assert!(cache.get("MATCH   (n)   RETURN n").is_some());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn result_cache_invalidates_by_label() {
        let cache = ResultCache::new(Duration::from_secs(300));
        let query = parse_query("MATCH (n:Person) RETURN n").unwrap();
        let params = BTreeMap::new();
        cache.put("MATCH (n:Person) RETURN n", &params, &query, vec!["n".to_string()], Vec::new());
        assert!(cache.get("MATCH (n:Person) RETURN n", &params).is_some());

        let mut labels = HashSet::new();
        labels.insert("Person".to_string());
        cache.invalidate_labels(&labels);
        assert!(cache.get("MATCH (n:Person) RETURN n", &params).is_none());
    }
}
