//! End-to-end scenarios and universal invariants against a fresh
//! in-memory [`nornicdb::Db`]: one literal-input/expected-output case per
//! scenario, driven purely through `Db::execute`/`execute_materialized`.

use nornicdb::api::{Embedder, Value};
use nornicdb::Db;
use std::collections::BTreeMap;
use std::sync::Arc;

fn params() -> BTreeMap<String, Value> {
    BTreeMap::new()
}

struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> nornicdb::api::Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn dimensions(&self) -> usize {
        self.0.len()
    }
}

#[test]
fn basic_create_then_match() {
    let db = Db::open_in_memory();
    db.execute(
        "CREATE (n:User {name: 'Alice', age: 30}) RETURN n.name, n.age",
        params(),
    )
    .unwrap();

    let result = db
        .execute(
            "MATCH (n:User) RETURN n.name AS name, n.age AS age ORDER BY name",
            params(),
        )
        .unwrap();

    assert_eq!(result.columns, vec!["name".to_string(), "age".to_string()]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("name"), Some(&Value::String("Alice".to_string())));
    assert_eq!(result.rows[0].get("age"), Some(&Value::Int(30)));
}

#[test]
fn optional_match_left_outer_join() {
    let db = Db::open_in_memory();
    db.execute(
        "CREATE (:File {path: '/a'}), (:File {path: '/b'}), (:W)-[:WATCHES]->(:File {path: '/c'})",
        params(),
    )
    .unwrap();

    let result = db
        .execute(
            "MATCH (f:File) OPTIONAL MATCH (f)<-[:WATCHES]-(w) RETURN f.path AS path, w IS NULL AS orphan ORDER BY path",
            params(),
        )
        .unwrap();

    let rows: Vec<(String, bool)> = result
        .rows
        .iter()
        .map(|row| {
            let path = match row.get("path") {
                Some(Value::String(s)) => s.clone(),
                other => panic!("unexpected path value: {other:?}"),
            };
            let orphan = matches!(row.get("orphan"), Some(Value::Bool(true)));
            (path, orphan)
        })
        .collect();

    assert_eq!(
        rows,
        vec![
            ("/a".to_string(), true),
            ("/b".to_string(), true),
            ("/c".to_string(), false),
        ]
    );
}

#[test]
fn merge_is_idempotent_across_two_runs() {
    let db = Db::open_in_memory();
    let query = "MERGE (n:Key {k: 'x'}) ON CREATE SET n.created = true ON MATCH SET n.seen = true RETURN n.k, n.created, n.seen";

    let first = db.execute(query, params()).unwrap();
    assert_eq!(first.rows.len(), 1);
    assert_eq!(first.rows[0].get("n.k"), Some(&Value::String("x".to_string())));
    assert_eq!(first.rows[0].get("n.created"), Some(&Value::Bool(true)));
    assert_eq!(first.rows[0].get("n.seen"), Some(&Value::Null));
    assert_eq!(first.stats.nodes_created, 1);

    let second = db.execute(query, params()).unwrap();
    assert_eq!(second.rows.len(), 1);
    assert_eq!(second.rows[0].get("n.created"), Some(&Value::Bool(true)));
    assert_eq!(second.rows[0].get("n.seen"), Some(&Value::Bool(true)));
    assert_eq!(second.stats.nodes_created, 0);
}

#[test]
fn shortest_path_between_two_endpoints() {
    let db = Db::open_in_memory();
    db.execute(
        "CREATE (a:N {id: 'A'}), (b:N {id: 'B'}), (c:N {id: 'C'}), (d:N {id: 'D'}), (x:N {id: 'X'})",
        params(),
    )
    .unwrap();
    db.execute(
        "MATCH (a:N {id:'A'}), (b:N {id:'B'}), (c:N {id:'C'}), (d:N {id:'D'}), (x:N {id:'X'}) \
         CREATE (a)-[:NEXT]->(b), (b)-[:NEXT]->(c), (c)-[:NEXT]->(d), (a)-[:NEXT]->(x), (x)-[:NEXT]->(d)",
        params(),
    )
    .unwrap();

    let result = db
        .execute(
            "MATCH (s:N{id:'A'}), (e:N{id:'D'}) MATCH p = shortestPath((s)-[*]->(e)) RETURN length(p)",
            params(),
        )
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("length(p)"), Some(&Value::Int(2)));
}

#[test]
fn vector_similarity_search_returns_the_closer_node_first() {
    let db = Db::open_in_memory();
    db.execute(
        "CREATE (:Doc {embedding: [1.0, 0.0, 0.0, 0.0]}), (:Doc {embedding: [0.0, 1.0, 0.0, 0.0]})",
        params(),
    )
    .unwrap();
    db.execute(
        "CALL db.index.vector.createNodeIndex('vec_idx', 'Doc', 'embedding', 4, 'cosine')",
        params(),
    )
    .unwrap();

    let result = db
        .execute_materialized(
            "CALL db.index.vector.queryNodes('vec_idx', 1, [0.9, 0.1, 0.0, 0.0]) YIELD node, score RETURN node, score",
            params(),
        )
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    let score = match result.rows[0].get("score") {
        Some(Value::Float(f)) => *f,
        other => panic!("unexpected score: {other:?}"),
    };
    assert!(score > 0.98, "expected score > 0.98, got {score}");
    let Some(Value::Map(node)) = result.rows[0].get("node") else {
        panic!("expected node to materialize into a map");
    };
    assert!(node.contains_key("identifier"));
}

#[test]
fn vector_similarity_search_with_a_text_query_routes_through_the_bound_embedder() {
    let db = Db::open_in_memory().with_embedder(Arc::new(FixedEmbedder(vec![0.9, 0.1, 0.0, 0.0])));
    db.execute(
        "CREATE (:Doc {embedding: [1.0, 0.0, 0.0, 0.0]}), (:Doc {embedding: [0.0, 1.0, 0.0, 0.0]})",
        params(),
    )
    .unwrap();
    db.execute(
        "CALL db.index.vector.createNodeIndex('vec_idx', 'Doc', 'embedding', 4, 'cosine')",
        params(),
    )
    .unwrap();

    let result = db
        .execute(
            "CALL db.index.vector.queryNodes('vec_idx', 1, 'irrelevant text') YIELD node, score RETURN score",
            params(),
        )
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    let score = match result.rows[0].get("score") {
        Some(Value::Float(f)) => *f,
        other => panic!("unexpected score: {other:?}"),
    };
    assert!(score > 0.98, "expected score > 0.98, got {score}");
}

#[test]
fn vector_similarity_search_with_a_text_query_and_no_embedder_bound_errors() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:Doc {embedding: [1.0, 0.0, 0.0, 0.0]})", params()).unwrap();
    db.execute(
        "CALL db.index.vector.createNodeIndex('vec_idx', 'Doc', 'embedding', 4, 'cosine')",
        params(),
    )
    .unwrap();

    let err = db
        .execute(
            "CALL db.index.vector.queryNodes('vec_idx', 1, 'irrelevant text') YIELD node, score RETURN score",
            params(),
        )
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("embedder"));
}

#[test]
fn fulltext_search_ranks_the_matching_document_first() {
    let db = Db::open_in_memory();
    db.execute(
        "CREATE (:Doc {content: 'machine learning basics'}), \
                (:Doc {content: 'database fundamentals'}), \
                (:Doc {content: 'web development intro'})",
        params(),
    )
    .unwrap();
    db.execute("CALL db.index.fulltext.createNodeIndex('doc_ft', ['Doc'], ['content'])", params())
        .unwrap();

    let result = db
        .execute(
            "CALL db.index.fulltext.queryNodes('doc_ft', 'machine') YIELD node, score \
             RETURN node.content ORDER BY score DESC LIMIT 1",
            params(),
        )
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(
        result.rows[0].get("node.content"),
        Some(&Value::String("machine learning basics".to_string()))
    );
}

#[test]
fn detach_delete_removes_every_incident_edge() {
    let db = Db::open_in_memory();
    db.execute("CREATE (a:N {name: 'a'})-[:R]->(b:N {name: 'b'}), (b)-[:R]->(c:N {name: 'c'})", params())
        .unwrap();

    let before = db.execute("MATCH ()-[r:R]->() RETURN count(r) AS c", params()).unwrap();
    assert_eq!(before.rows[0].get("c"), Some(&Value::Int(2)));

    db.execute("MATCH (b:N {name: 'b'}) DETACH DELETE b", params()).unwrap();

    let after = db.execute("MATCH ()-[r:R]->() RETURN count(r) AS c", params()).unwrap();
    assert_eq!(after.rows[0].get("c"), Some(&Value::Int(0)));

    let remaining = db.execute("MATCH (n:N) RETURN n.name AS name ORDER BY name", params()).unwrap();
    let names: Vec<String> = remaining
        .rows
        .iter()
        .map(|r| match r.get("name") {
            Some(Value::String(s)) => s.clone(),
            other => panic!("unexpected name: {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
}

#[test]
fn non_detach_delete_of_a_node_with_edges_is_a_constraint_violation() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:N {name: 'a'})-[:R]->(:N {name: 'b'})", params()).unwrap();
    let err = db.execute("MATCH (n:N {name: 'a'}) DELETE n", params()).unwrap_err();
    assert!(err.to_string().to_lowercase().contains("constraint") || err.to_string().to_lowercase().contains("detach"));
}

#[test]
fn every_row_has_exactly_as_many_cells_as_columns() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:P {a: 1, b: 2}), (:P {a: 3})", params()).unwrap();
    let result = db
        .execute("MATCH (p:P) RETURN p.a AS a, p.b AS b", params())
        .unwrap();
    for row in &result.rows {
        assert_eq!(result.columns.iter().filter(|c| row.contains_key(*c)).count(), result.columns.len());
    }
}

#[test]
fn union_distinct_deduplicates_the_combined_row_set() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:A {v: 1}), (:B {v: 1}), (:B {v: 2})", params()).unwrap();

    let result = db
        .execute(
            "MATCH (a:A) RETURN a.v AS v UNION MATCH (b:B) RETURN b.v AS v",
            params(),
        )
        .unwrap();

    let mut values: Vec<i64> = result
        .rows
        .iter()
        .map(|r| match r.get("v") {
            Some(Value::Int(i)) => *i,
            other => panic!("unexpected value: {other:?}"),
        })
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![1, 1, 2]);
}

#[test]
fn division_by_zero_is_null_not_an_error() {
    let db = Db::open_in_memory();
    let result = db.execute("RETURN 1 / 0 AS r", params()).unwrap();
    assert_eq!(result.rows[0].get("r"), Some(&Value::Null));
}

#[test]
fn float_division_and_modulo_by_zero_are_also_null() {
    let db = Db::open_in_memory();
    let result = db.execute("RETURN 1.0 / 0.0 AS r, 1.0 % 0.0 AS m", params()).unwrap();
    assert_eq!(result.rows[0].get("r"), Some(&Value::Null));
    assert_eq!(result.rows[0].get("m"), Some(&Value::Null));
}

#[test]
fn call_yield_where_filters_out_non_matching_records() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:A), (:B), (:C)", params()).unwrap();

    let result = db
        .execute(
            "CALL db.labels() YIELD label WHERE label <> 'B' RETURN label ORDER BY label",
            params(),
        )
        .unwrap();

    let labels: Vec<String> = result
        .rows
        .iter()
        .map(|r| match r.get("label") {
            Some(Value::String(s)) => s.clone(),
            other => panic!("unexpected label: {other:?}"),
        })
        .collect();
    assert_eq!(labels, vec!["A".to_string(), "C".to_string()]);
}

#[test]
fn empty_unwind_produces_zero_rows() {
    let db = Db::open_in_memory();
    let result = db.execute("UNWIND [] AS x RETURN x", params()).unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn limit_zero_returns_zero_rows_with_correct_columns() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:P {a: 1})", params()).unwrap();
    let result = db.execute("MATCH (p:P) RETURN p.a AS a LIMIT 0", params()).unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(result.columns, vec!["a".to_string()]);
}

#[test]
fn variable_length_zero_to_zero_returns_the_start_node_at_length_zero() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:P {name: 'only'})", params()).unwrap();
    let result = db
        .execute(
            "MATCH (p:P {name: 'only'})-[*0..0]-(q) RETURN p.name AS name, q.name AS other",
            params(),
        )
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("name"), result.rows[0].get("other"));
}

#[test]
fn fulltext_query_with_only_excluded_terms_returns_nothing() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:Doc {content: 'machine learning basics'})", params()).unwrap();
    db.execute("CALL db.index.fulltext.createNodeIndex('doc_ft', ['Doc'], ['content'])", params())
        .unwrap();

    let result = db
        .execute(
            "CALL db.index.fulltext.queryNodes('doc_ft', '-machine') YIELD node, score RETURN node",
            params(),
        )
        .unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn write_query_invalidates_the_cached_read_for_the_same_label() {
    let db = Db::open_in_memory();
    db.execute("CREATE (:Person {name: 'Ada'})", params()).unwrap();
    let first = db.execute("MATCH (p:Person) RETURN p.name AS name", params()).unwrap();
    assert_eq!(first.rows.len(), 1);

    db.execute("CREATE (:Person {name: 'Grace'})", params()).unwrap();
    let second = db.execute("MATCH (p:Person) RETURN p.name AS name", params()).unwrap();
    assert_eq!(second.rows.len(), 2);
}

#[test]
fn parameter_round_trips_through_return() {
    let db = Db::open_in_memory();
    let mut p = BTreeMap::new();
    p.insert("x".to_string(), Value::Int(42));
    let result = db.execute("RETURN $x AS x", p).unwrap();
    assert_eq!(result.rows[0].get("x"), Some(&Value::Int(42)));
}
