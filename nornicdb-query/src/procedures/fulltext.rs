//! `db.index.fulltext.*` -- BM25-ish scored search over a concatenation
//! of each candidate node's configured (or default) text properties.

use super::Record;
use crate::error::{Error, Result};
use crate::evaluator::EvalContext;
use nornicdb_api::{Node, Value};

const K1: f64 = 1.2;
const B: f64 = 0.75;
const AVG_DOC_LEN: f64 = 100.0;
const REQUIRED_BOOST: f64 = 2.0;

const DEFAULT_PROPERTIES: &[&str] = &["content", "text", "title", "name", "description", "body", "summary"];

pub fn create_node_index(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let name = string_arg(arguments, 0)?;
    let labels = string_list_arg(arguments, 1)?;
    let properties = string_list_arg(arguments, 2)?;

    ctx.storage
        .schema()
        .create_fulltext_index(&name, labels.clone(), properties.clone())?;

    Ok(vec![super::record(&[
        ("name", Value::String(name)),
        ("labels", Value::List(labels.into_iter().map(Value::String).collect())),
        ("properties", Value::List(properties.into_iter().map(Value::String).collect())),
    ])])
}

pub fn query_nodes(arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    let index_name = string_arg(arguments, 0)?;
    let query_text = string_arg(arguments, 1)?;

    let meta = ctx
        .storage
        .schema()
        .fulltext_index(&index_name)
        .ok_or_else(|| Error::NotFound { kind: "fulltext index", id: index_name })?;

    let properties: Vec<&str> = if meta.properties.is_empty() {
        DEFAULT_PROPERTIES.to_vec()
    } else {
        meta.properties.iter().map(String::as_str).collect()
    };

    let (required, excluded, regular) = parse_query_terms(&query_text);

    let mut candidates: Vec<Node> = Vec::new();
    if meta.labels.is_empty() {
        candidates.extend(ctx.storage.all_nodes()?);
    } else {
        for label in &meta.labels {
            candidates.extend(ctx.storage.nodes_by_label(label)?);
        }
    }

    let docs: Vec<(Node, Vec<String>)> = candidates
        .into_iter()
        .map(|node| {
            let tokens = tokenize(&searchable_text(&node, &properties));
            (node, tokens)
        })
        .collect();

    let included: Vec<&(Node, Vec<String>)> = docs
        .iter()
        .filter(|(_, tokens)| {
            if excluded.iter().any(|term| tokens.contains(term)) {
                return false;
            }
            required.iter().all(|term| tokens.contains(term))
        })
        .collect();

    let n = included.len() as f64;
    let idf = |term: &str| -> f64 {
        let df = included
            .iter()
            .filter(|(_, tokens)| tokens.contains(&term.to_string()))
            .count() as f64;
        let df = df.max(0.5);
        ((n + 1.0) / df).ln().max(0.1)
    };

    let mut scored: Vec<(String, f64)> = Vec::new();
    for (node, tokens) in &included {
        let doc_len = tokens.len() as f64;
        let mut score = 0.0;
        for term in &regular {
            let tf = tokens.iter().filter(|t| *t == term).count() as f64;
            if tf == 0.0 {
                continue;
            }
            let tf_norm = tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * doc_len / AVG_DOC_LEN));
            score += idf(term) * tf_norm;
        }
        score += REQUIRED_BOOST * required.len() as f64;
        if score > 0.0 {
            scored.push((node.id.clone(), score));
        }
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(scored
        .into_iter()
        .map(|(id, score)| super::record(&[("node", Value::Node(id)), ("score", Value::Float(score))]))
        .collect())
}

fn searchable_text(node: &Node, properties: &[&str]) -> String {
    properties
        .iter()
        .filter_map(|p| node.properties.get(*p))
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|s| s.to_lowercase()).collect()
}

/// Splits a fulltext query string into (required, excluded, regular) term
/// sets: `+term`/`"phrase"` is required, `-term`/`NOT term` is excluded.
fn parse_query_terms(query: &str) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut required = Vec::new();
    let mut excluded = Vec::new();
    let mut regular = Vec::new();

    let mut words = query.split_whitespace().peekable();
    while let Some(word) = words.next() {
        if word.eq_ignore_ascii_case("not") {
            if let Some(next) = words.next() {
                excluded.push(next.trim_matches('"').to_lowercase());
            }
            continue;
        }
        if let Some(rest) = word.strip_prefix('+') {
            required.push(rest.trim_matches('"').to_lowercase());
        } else if let Some(rest) = word.strip_prefix('-') {
            excluded.push(rest.trim_matches('"').to_lowercase());
        } else if word.starts_with('"') && word.ends_with('"') && word.len() > 1 {
            required.push(word.trim_matches('"').to_lowercase());
        } else {
            regular.push(word.to_lowercase());
        }
    }
    (required, excluded, regular)
}

fn string_arg(arguments: &[Value], idx: usize) -> Result<String> {
    match arguments.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(Error::type_error("String", format!("{other:?}"))),
    }
}

fn string_list_arg(arguments: &[Value], idx: usize) -> Result<Vec<String>> {
    match arguments.get(idx) {
        Some(Value::List(items)) => Ok(items.iter().filter_map(Value::as_str).map(String::from).collect()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        other => Err(Error::type_error("List", format!("{other:?}"))),
    }
}
