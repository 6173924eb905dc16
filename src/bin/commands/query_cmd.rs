use anyhow::{Context, Result};
use mmdb_reader::{Database, SearchResult};
use serde_json::json;
use std::path::PathBuf;

pub fn cmd_query(database: PathBuf, address: String, quiet: bool) -> Result<()> {
    let db = Database::open(&database)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let record = match db.lookup_str(&address) {
        SearchResult::Found(record) => Some(record),
        SearchResult::NotFound | SearchResult::Partial(_) => None,
        SearchResult::Failed(e) => {
            return Err(e).with_context(|| format!("Query failed for: {}", address));
        }
    };
    let found = record.is_some();

    if quiet {
        // Quiet mode: no output, just exit code
        std::process::exit(if found { 0 } else { 1 });
    }

    // Always an array: one element when found, empty otherwise
    match record {
        Some(record) => {
            let value = serde_json::to_value(&record)?;
            println!("{}", serde_json::to_string_pretty(&json!([value]))?);
        }
        None => println!("[]"),
    }

    std::process::exit(if found { 0 } else { 1 });
}
