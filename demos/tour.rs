//! A short tour of `nornicdb`: open an in-memory database, write a small
//! graph with Cypher, then read it back with MATCH, a parameterized
//! variable-length path query, and an idempotent MERGE.
//!
//! Run with `cargo run --example tour` once this file is wired into the
//! `nornicdb` crate's `[[example]]` list.

use nornicdb::api::Value;
use nornicdb::Db;
use std::collections::BTreeMap;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db = Db::open_in_memory();

    println!("creating a small social graph...");
    db.execute(
        "CREATE (:Person {name: 'Ada', age: 36})-[:FOLLOWS]->(:Person {name: 'Grace', age: 45})",
        BTreeMap::new(),
    )?;
    db.execute(
        "MATCH (g:Person {name: 'Grace'}) CREATE (g)-[:FOLLOWS]->(:Person {name: 'Hedy', age: 29})",
        BTreeMap::new(),
    )?;

    let result = db.execute(
        "MATCH (p:Person) RETURN p.name AS name, p.age AS age ORDER BY name",
        BTreeMap::new(),
    )?;
    println!("people: {:?}", result.columns);
    for row in &result.rows {
        println!("  {:?}", row);
    }

    println!("\nwho does Ada reach within two hops?");
    let mut params = BTreeMap::new();
    params.insert("name".to_string(), Value::String("Ada".to_string()));
    let reachable = db.execute(
        "MATCH (a:Person {name: $name})-[:FOLLOWS*1..2]->(reached) RETURN DISTINCT reached.name AS name",
        params,
    )?;
    for row in &reachable.rows {
        println!("  {:?}", row.get("name"));
    }

    println!("\nMERGE is idempotent:");
    for _ in 0..2 {
        let merged = db.execute(
            "MERGE (p:Person {name: 'Ada'}) ON MATCH SET p.seen = true RETURN p.name, p.seen",
            BTreeMap::new(),
        )?;
        println!("  {:?}", merged.rows);
    }

    Ok(())
}
