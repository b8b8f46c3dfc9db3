//! `nornic` -- a thin CLI wrapper over [`nornicdb::Db`]: run a Cypher
//! statement against a fresh in-memory database, optionally seeded from
//! CSV node/edge files first.
//!
//! There is no durable storage engine (see the workspace's design notes),
//! so unlike a disk-backed database's CLI there is no `--db <path>` to
//! reopen across invocations -- `query` loads, queries, and prints in one
//! process.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nornicdb::api::{Edge, Node, StorageEngine, Value};
use nornicdb::Db;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nornic", version, arg_required_else_help = true)]
struct Cli {
    /// Cypher query string.
    #[arg(long, conflicts_with = "file")]
    cypher: Option<String>,

    /// Read the Cypher query from a file instead of `--cypher`.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Parameters as a JSON object, e.g. '{"name": "Alice"}'.
    #[arg(long)]
    params_json: Option<String>,

    /// CSV node files to load before running the query. Expects an
    /// `:ID` column, a `:LABEL` column (`|`-separated for multiple
    /// labels), and arbitrary property columns (`name`, `age:int`, ...).
    #[arg(long = "nodes")]
    node_files: Vec<PathBuf>,

    /// CSV edge files to load before running the query. Expects
    /// `:START_ID`, `:END_ID`, and `:TYPE` columns, plus property columns.
    #[arg(long = "edges")]
    edge_files: Vec<PathBuf>,

    #[arg(long, value_enum, default_value = "ndjson")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Ndjson,
    Table,
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let db = Db::open_in_memory();

    for path in &cli.node_files {
        load_nodes(&db, path).with_context(|| format!("loading nodes from {}", path.display()))?;
    }
    for path in &cli.edge_files {
        load_edges(&db, path).with_context(|| format!("loading edges from {}", path.display()))?;
    }

    let Some(query_text) = read_query(&cli)? else {
        return Ok(());
    };
    let params = parse_params_json(cli.params_json.as_deref())?;
    let result = db
        .execute_materialized(&query_text, params)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    print_result(&result, cli.format)
}

fn read_query(cli: &Cli) -> Result<Option<String>> {
    if let Some(query) = &cli.cypher {
        return Ok(Some(query.clone()));
    }
    if let Some(path) = &cli.file {
        return Ok(Some(
            std::fs::read_to_string(path).with_context(|| format!("reading query file {}", path.display()))?,
        ));
    }
    if cli.node_files.is_empty() && cli.edge_files.is_empty() {
        anyhow::bail!("either --cypher or --file is required");
    }
    Ok(None)
}

fn parse_params_json(raw: Option<&str>) -> Result<BTreeMap<String, Value>> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(BTreeMap::new());
    };
    let parsed: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).context("--params-json must be a JSON object")?;
    Ok(parsed.into_iter().map(|(k, v)| (k, json_to_value(&v))).collect())
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
        }
    }
}

fn print_result(result: &nornicdb::QueryResult, format: OutputFormat) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Ndjson => {
            for row in &result.rows {
                let mut object = serde_json::Map::with_capacity(result.columns.len());
                for column in &result.columns {
                    let value = row.get(column).cloned().unwrap_or(Value::Null);
                    object.insert(column.clone(), nornicdb::materialize::to_json(&value));
                }
                serde_json::to_writer(&mut stdout, &serde_json::Value::Object(object))?;
                stdout.write_all(b"\n")?;
            }
        }
        OutputFormat::Table => {
            println!("{}", result.columns.join(" | "));
            for row in &result.rows {
                let cells: Vec<String> = result
                    .columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null).to_string())
                    .collect();
                println!("{}", cells.join(" | "));
            }
        }
    }
    if !result.stats.is_empty() {
        eprintln!(
            "nodes_created={} nodes_deleted={} relationships_created={} relationships_deleted={} properties_set={}",
            result.stats.nodes_created,
            result.stats.nodes_deleted,
            result.stats.relationships_created,
            result.stats.relationships_deleted,
            result.stats.properties_set,
        );
    }
    Ok(())
}

/// `name`, or `name:int`/`name:float`/`name:boolean` for a typed column.
fn parse_header_type(header: &str) -> (String, String) {
    match header.split_once(':') {
        Some((name, ty)) => (name.to_string(), ty.to_ascii_lowercase()),
        None => (header.to_string(), "string".to_string()),
    }
}

fn parse_value(raw: &str, ty: &str) -> Result<Value> {
    Ok(match ty {
        "int" | "long" => Value::Int(raw.parse().with_context(|| format!("invalid int {raw:?}"))?),
        "float" | "double" => Value::Float(raw.parse().with_context(|| format!("invalid float {raw:?}"))?),
        "boolean" | "bool" => Value::Bool(raw.parse().with_context(|| format!("invalid bool {raw:?}"))?),
        _ => Value::String(raw.to_string()),
    })
}

fn load_nodes(db: &Db, path: &PathBuf) -> Result<()> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();

    let mut id_col = None;
    let mut label_col = None;
    let mut properties = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if header == ":ID" {
            id_col = Some(idx);
        } else if header == ":LABEL" {
            label_col = Some(idx);
        } else {
            let (name, ty) = parse_header_type(header);
            properties.push((idx, name, ty));
        }
    }
    let id_idx = id_col.context("missing :ID column")?;
    let label_idx = label_col.context("missing :LABEL column")?;

    let storage = db.storage();
    for record in reader.records() {
        let record = record?;
        let mut node = Node::new(record[id_idx].to_string());
        node.labels = record[label_idx].split('|').map(str::to_string).collect();
        for (idx, name, ty) in &properties {
            let raw = &record[*idx];
            if raw.is_empty() {
                continue;
            }
            node.properties.insert(name.clone(), parse_value(raw, ty)?);
        }
        storage.create_node(node)?;
    }
    Ok(())
}

fn load_edges(db: &Db, path: &PathBuf) -> Result<()> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();

    let mut start_col = None;
    let mut end_col = None;
    let mut type_col = None;
    let mut properties = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        match header {
            ":START_ID" => start_col = Some(idx),
            ":END_ID" => end_col = Some(idx),
            ":TYPE" => type_col = Some(idx),
            _ => {
                let (name, ty) = parse_header_type(header);
                properties.push((idx, name, ty));
            }
        }
    }
    let start_idx = start_col.context("missing :START_ID column")?;
    let end_idx = end_col.context("missing :END_ID column")?;
    let type_idx = type_col.context("missing :TYPE column")?;

    let storage = db.storage();
    for (row_num, record) in reader.records().enumerate() {
        let record = record?;
        let mut properties_map = BTreeMap::new();
        for (idx, name, ty) in &properties {
            let raw = &record[*idx];
            if raw.is_empty() {
                continue;
            }
            properties_map.insert(name.clone(), parse_value(raw, ty)?);
        }
        let edge = Edge {
            id: storage.new_edge_id()?,
            rel_type: record[type_idx].to_string(),
            start: record[start_idx].to_string(),
            end: record[end_idx].to_string(),
            properties: properties_map,
        };
        storage
            .create_edge(edge)
            .with_context(|| format!("edge row {row_num}"))?;
    }
    Ok(())
}
