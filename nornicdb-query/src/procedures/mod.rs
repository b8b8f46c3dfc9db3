//! C7 -- the procedure registry.
//!
//! `CALL` dispatches on a case-insensitive name against a closed catalog;
//! an unrecognized name is [`Error::UnknownProcedure`]. Each procedure
//! returns its output as a list of records (one per `YIELD`-bound row),
//! each record a field-name-to-value map, grounded on the teacher's
//! `executor/procedure_registry.rs` `HashMap<String, Arc<dyn Procedure>>`
//! dispatch shape, adapted from its `GraphSnapshot`-erased trait to this
//! engine's object-safe `StorageEngine`.

mod apoc_coll;
mod apoc_cypher;
mod apoc_path;
mod fulltext;
mod vector;

use crate::error::{Error, Result};
use crate::evaluator::EvalContext;
use nornicdb_api::Value;
use std::collections::BTreeMap;

type Record = BTreeMap<String, Value>;

pub fn call(name: &str, arguments: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Record>> {
    match name.to_ascii_lowercase().as_str() {
        "db.labels" => Ok(ctx
            .storage
            .schema()
            .labels()
            .into_iter()
            .map(|label| record(&[("label", Value::String(label))]))
            .collect()),
        "db.relationshiptypes" => Ok(ctx
            .storage
            .schema()
            .relationship_types()
            .into_iter()
            .map(|rel_type| record(&[("relationshipType", Value::String(rel_type))]))
            .collect()),
        "db.propertykeys" => Ok(ctx
            .storage
            .schema()
            .property_keys()
            .into_iter()
            .map(|key| record(&[("propertyKey", Value::String(key))]))
            .collect()),
        "db.indexes" | "db.index.stats" => Ok(index_records(ctx)),
        "db.constraints" => Ok(ctx
            .storage
            .schema()
            .constraints()
            .into_iter()
            .map(|c| {
                record(&[
                    (
                        "name",
                        Value::String(format!("constraint_{}_{}", c.label, c.property)),
                    ),
                    ("type", Value::String("UNIQUENESS".to_string())),
                    ("labels", Value::List(vec![Value::String(c.label)])),
                    ("properties", Value::List(vec![Value::String(c.property)])),
                ])
            })
            .collect()),
        "db.schema.visualization" => Ok(schema_visualization(ctx)),
        "db.schema.nodeproperties" => Ok(node_property_schema(ctx)),
        "db.schema.relproperties" => Ok(rel_property_schema(ctx)),
        "db.index.vector.createnodeindex" => vector::create_node_index(arguments, ctx),
        "db.index.vector.querynodes" => vector::query_nodes(arguments, ctx),
        "db.create.setnodevectorproperty" => vector::set_node_vector_property(arguments, ctx),
        "db.index.fulltext.createnodeindex" => fulltext::create_node_index(arguments, ctx),
        "db.index.fulltext.querynodes" => fulltext::query_nodes(arguments, ctx),
        "apoc.path.subgraphnodes" => apoc_path::subgraph_nodes(arguments, ctx),
        "apoc.path.expand" => apoc_path::expand(arguments, ctx),
        "apoc.path.spanningtree" => apoc_path::spanning_tree(arguments, ctx),
        "apoc.cypher.run" => apoc_cypher::run(arguments, ctx),
        "apoc.cypher.runmany" => apoc_cypher::run_many(arguments, ctx),
        "apoc.periodic.iterate" => apoc_cypher::periodic_iterate(arguments, ctx),
        "apoc.periodic.commit" => apoc_cypher::periodic_commit(arguments, ctx),
        name if name.starts_with("apoc.coll.") => apoc_coll::call(name, arguments),
        "tx.setmetadata" => Ok(vec![record(&[("status", Value::String("ok".to_string()))])]),
        "db.ping" => Ok(vec![record(&[("success", Value::Bool(true))])]),
        "db.info" => Ok(vec![record(&[
            ("name", Value::String("nornicdb".to_string())),
            ("nodeCount", Value::Int(ctx.storage.node_count()? as i64)),
            ("relationshipCount", Value::Int(ctx.storage.edge_count()? as i64)),
        ])]),
        "dbms.info" => Ok(vec![record(&[
            ("name", Value::String("nornicdb".to_string())),
            ("edition", Value::String("embedded".to_string())),
        ])]),
        "dbms.components" => Ok(vec![record(&[
            ("name", Value::String("nornicdb-query".to_string())),
            ("versions", Value::List(vec![Value::String(env!("CARGO_PKG_VERSION").to_string())])),
            ("edition", Value::String("embedded".to_string())),
        ])]),
        "dbms.procedures" => Ok(PROCEDURE_NAMES
            .iter()
            .map(|n| record(&[("name", Value::String((*n).to_string()))]))
            .collect()),
        "dbms.functions" => Ok(crate::evaluator::functions::FUNCTION_NAMES
            .iter()
            .map(|n| record(&[("name", Value::String((*n).to_string()))]))
            .collect()),
        _ => Err(Error::UnknownProcedure(name.to_string())),
    }
}

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn index_records(ctx: &EvalContext<'_>) -> Vec<Record> {
    let schema = ctx.storage.schema();
    let mut out = Vec::new();
    for idx in schema.indexes() {
        out.push(record(&[
            ("name", Value::String(format!("index_{}_{}", idx.label, idx.property))),
            ("type", Value::String("BTREE".to_string())),
            ("label", Value::String(idx.label)),
            ("property", Value::String(idx.property)),
            ("entries", Value::Int(0)),
            ("uniqueVals", Value::Int(0)),
            ("selectivity", Value::Float(1.0)),
        ]));
    }
    for idx in schema.vector_indexes() {
        out.push(record(&[
            ("name", Value::String(idx.name)),
            ("type", Value::String("VECTOR".to_string())),
            ("label", Value::String(idx.label)),
            ("property", Value::String(idx.property)),
            ("entries", Value::Int(0)),
            ("uniqueVals", Value::Int(0)),
            ("selectivity", Value::Float(1.0)),
        ]));
    }
    for idx in schema.fulltext_indexes() {
        out.push(record(&[
            ("name", Value::String(idx.name)),
            ("type", Value::String("FULLTEXT".to_string())),
            ("label", Value::String(idx.labels.join("|"))),
            ("property", Value::String(idx.properties.join("|"))),
            ("entries", Value::Int(0)),
            ("uniqueVals", Value::Int(0)),
            ("selectivity", Value::Float(1.0)),
        ]));
    }
    out
}

fn schema_visualization(ctx: &EvalContext<'_>) -> Vec<Record> {
    ctx.storage
        .schema()
        .labels()
        .into_iter()
        .map(|label| record(&[("nodes", Value::String(label)), ("relationships", Value::List(Vec::new()))]))
        .collect()
}

fn node_property_schema(ctx: &EvalContext<'_>) -> Vec<Record> {
    let mut seen: BTreeMap<(String, String), String> = BTreeMap::new();
    if let Ok(nodes) = ctx.storage.all_nodes() {
        for node in nodes {
            for label in &node.labels {
                for (key, value) in &node.properties {
                    seen.entry((label.clone(), key.clone()))
                        .or_insert_with(|| value.type_name().to_string());
                }
            }
        }
    }
    seen.into_iter()
        .map(|((label, key), ty)| {
            record(&[
                ("nodeLabel", Value::String(label)),
                ("propertyName", Value::String(key)),
                ("propertyTypes", Value::List(vec![Value::String(ty)])),
            ])
        })
        .collect()
}

fn rel_property_schema(ctx: &EvalContext<'_>) -> Vec<Record> {
    let mut seen: BTreeMap<(String, String), String> = BTreeMap::new();
    if let Ok(edges) = ctx.storage.all_edges() {
        for edge in edges {
            for (key, value) in &edge.properties {
                seen.entry((edge.rel_type.clone(), key.clone()))
                    .or_insert_with(|| value.type_name().to_string());
            }
        }
    }
    seen.into_iter()
        .map(|((rel_type, key), ty)| {
            record(&[
                ("relType", Value::String(rel_type)),
                ("propertyName", Value::String(key)),
                ("propertyTypes", Value::List(vec![Value::String(ty)])),
            ])
        })
        .collect()
}

const PROCEDURE_NAMES: &[&str] = &[
    "db.labels",
    "db.relationshipTypes",
    "db.propertyKeys",
    "db.indexes",
    "db.index.stats",
    "db.constraints",
    "db.schema.visualization",
    "db.schema.nodeProperties",
    "db.schema.relProperties",
    "db.index.vector.createNodeIndex",
    "db.index.vector.queryNodes",
    "db.index.fulltext.createNodeIndex",
    "db.index.fulltext.queryNodes",
    "db.create.setNodeVectorProperty",
    "apoc.path.subgraphNodes",
    "apoc.path.expand",
    "apoc.path.spanningTree",
    "apoc.cypher.run",
    "apoc.cypher.runMany",
    "apoc.periodic.iterate",
    "apoc.periodic.commit",
    "apoc.coll.toSet",
    "apoc.coll.sum",
    "apoc.coll.avg",
    "apoc.coll.sort",
    "apoc.coll.min",
    "apoc.coll.max",
    "apoc.coll.contains",
    "tx.setMetaData",
    "db.ping",
    "db.info",
    "dbms.info",
    "dbms.components",
    "dbms.procedures",
    "dbms.functions",
];
