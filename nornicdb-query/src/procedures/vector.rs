//! `db.index.vector.*` -- cosine/euclidean/dot similarity search against
//! each node's `embedding` slot, scored directly rather than delegated to
//! an external index engine (the schema catalog only stores index
//! metadata: label, property, dimension, similarity).

use super::Record;
use crate::error::{Error, Result};
use crate::evaluator::EvalContext;
use nornicdb_api::{Value, VectorSimilarity};

pub fn create_node_index(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let name = string_arg(arguments, 0, "name")?;
    let label = string_arg(arguments, 1, "label")?;
    let property = string_arg(arguments, 2, "property")?;
    let dimensions = arguments
        .get(3)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::type_error("Integer", "missing dimension"))? as usize;
    let similarity = match arguments.get(4) {
        Some(Value::String(s)) => {
            VectorSimilarity::parse(s).ok_or_else(|| Error::type_error("similarity name", s.clone()))?
        }
        _ => VectorSimilarity::Cosine,
    };

    ctx.storage
        .schema()
        .create_vector_index(&name, &label, &property, dimensions, similarity)?;

    Ok(vec![super::record(&[
        ("name", Value::String(name)),
        ("label", Value::String(label)),
        ("property", Value::String(property)),
        ("dim", Value::Int(dimensions as i64)),
        ("sim", Value::String(similarity.to_string())),
    ])])
}

pub fn query_nodes(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let index_name = string_arg(arguments, 0, "indexName")?;
    let k = arguments
        .get(1)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::type_error("Integer", "missing k"))? as usize;
    let query_input = arguments.get(2).cloned().unwrap_or(Value::Null);

    let meta = ctx
        .storage
        .schema()
        .vector_index(&index_name)
        .ok_or_else(|| Error::NotFound { kind: "vector index", id: index_name })?;

    let query_vector: Vec<f32> = match query_input {
        Value::List(items) => items
            .iter()
            .filter_map(Value::as_f64)
            .map(|f| f as f32)
            .collect(),
        // The NornicDB extension: a string-literal query routes through
        // the bound embedding collaborator rather than a raw vector.
        Value::String(text) => {
            let embedder = ctx.embedder.ok_or_else(|| {
                Error::Internal("this session has no embedder bound for text queries".to_string())
            })?;
            embedder.embed(&text).map_err(Error::Storage)?
        }
        _ => return Ok(Vec::new()),
    };
    if query_vector.len() != meta.dimensions {
        return Ok(Vec::new());
    }

    let candidates = ctx.storage.nodes_by_label(&meta.label)?;
    let mut scored: Vec<(String, f64)> = Vec::new();
    for node in candidates {
        let Some(embedding) = &node.embedding else {
            continue;
        };
        if embedding.len() != query_vector.len() {
            continue;
        }
        let score = match meta.similarity {
            VectorSimilarity::Cosine => cosine(embedding, &query_vector),
            VectorSimilarity::Euclidean => -euclidean(embedding, &query_vector),
            VectorSimilarity::Dot => dot(embedding, &query_vector),
        };
        scored.push((node.id, score));
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(id, score)| {
            super::record(&[
                ("node", Value::Node(id)),
                ("score", Value::Float(score)),
            ])
        })
        .collect())
}

pub fn set_node_vector_property(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let node_id = match arguments.first() {
        Some(Value::Node(id)) => id.clone(),
        Some(Value::String(id)) => id.clone(),
        _ => return Err(Error::type_error("Node", "missing nodeId")),
    };
    let _key = string_arg(arguments, 1, "key")?;
    let vector: Vec<f32> = match arguments.get(2) {
        Some(Value::List(items)) => items.iter().filter_map(Value::as_f64).map(|f| f as f32).collect(),
        _ => return Err(Error::type_error("List", "missing vector")),
    };

    let mut node = ctx
        .storage
        .get_node(&node_id)?
        .ok_or_else(|| Error::NotFound { kind: "node", id: node_id.clone() })?;
    node.embedding = Some(vector);
    ctx.storage.update_node(node)?;

    Ok(vec![super::record(&[("node", Value::Node(node_id))])])
}

fn string_arg(arguments: &[Value], idx: usize, name: &'static str) -> Result<String> {
    match arguments.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::type_error("String", format!("missing {name}"))),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum()
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot(a, b) / denom
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (*x as f64 - *y as f64).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvalContext;
    use nornicdb_api::{Embedder, Node, StorageEngine};
    use nornicdb_storage::MemoryEngine;
    use std::collections::BTreeMap;

    struct FixedEmbedder(Vec<f32>);

    impl Embedder for FixedEmbedder {
        fn embed(&self, _text: &str) -> nornicdb_api::Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn string_query_routes_through_the_bound_embedder() {
        let storage = MemoryEngine::new();
        let mut close = Node::new("close");
        close.labels.push("Doc".to_string());
        close.embedding = Some(vec![1.0, 0.0, 0.0, 0.0]);
        storage.create_node(close).unwrap();
        let mut far = Node::new("far");
        far.labels.push("Doc".to_string());
        far.embedding = Some(vec![0.0, 1.0, 0.0, 0.0]);
        storage.create_node(far).unwrap();
        storage
            .schema()
            .create_vector_index("vec_idx", "Doc", "embedding", 4, nornicdb_api::VectorSimilarity::Cosine)
            .unwrap();

        let params = BTreeMap::new();
        let embedder = FixedEmbedder(vec![0.9, 0.1, 0.0, 0.0]);
        let ctx = EvalContext::with_embedder(&storage, &params, Some(&embedder));

        let records = query_nodes(
            &[Value::String("vec_idx".to_string()), Value::Int(1), Value::String("anything".to_string())],
            &ctx,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("node"), Some(&Value::Node("close".to_string())));
    }

    #[test]
    fn string_query_without_a_bound_embedder_errors() {
        let storage = MemoryEngine::new();
        storage
            .schema()
            .create_vector_index("vec_idx", "Doc", "embedding", 4, nornicdb_api::VectorSimilarity::Cosine)
            .unwrap();
        let params = BTreeMap::new();
        let ctx = EvalContext::new(&storage, &params);

        let err = query_nodes(
            &[Value::String("vec_idx".to_string()), Value::Int(1), Value::String("anything".to_string())],
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
