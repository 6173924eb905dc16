use anyhow::{Context, Result};
use mmdb_reader::Database;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number, format_unix_timestamp};

pub fn cmd_inspect(database: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let db = Database::open(&database)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let meta = db.metadata();

    if json_output {
        let mut output = json!({
            "file": database.display().to_string(),
            "size": db.size(),
            "database_type": meta.database_type,
            "binary_format_major_version": meta.binary_format_major_version,
            "binary_format_minor_version": meta.binary_format_minor_version,
            "build_epoch": meta.build_epoch,
            "ip_version": meta.ip_version.number(),
            "record_size": meta.record_size.bits(),
            "node_count": meta.node_count,
            "languages": meta.languages,
            "description": meta.description,
            "search_tree_size": meta.search_tree_size,
            "data_section_start": meta.data_section_start,
            "ipv4_start_node": db.ipv4_start_node(),
        });

        if verbose {
            let full = db
                .metadata_value()
                .context("Failed to decode metadata map")?;
            output["metadata"] = serde_json::to_value(&full)?;
        }

        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("Size:     {}", format_bytes(db.size()));
    println!();
    println!("Metadata:");
    println!("  Database type:   {}", meta.database_type);
    println!(
        "  Format version:  {}.{}",
        meta.binary_format_major_version, meta.binary_format_minor_version
    );
    println!(
        "  Build time:      {} ({})",
        format_unix_timestamp(meta.build_epoch),
        meta.build_epoch
    );
    println!("  IP version:      IPv{}", meta.ip_version.number());
    if !meta.languages.is_empty() {
        println!("  Languages:       {}", meta.languages.join(", "));
    }
    if !meta.description.is_empty() {
        println!("  Description:");
        let mut descriptions: Vec<_> = meta.description.iter().collect();
        descriptions.sort();
        for (lang, desc) in descriptions {
            println!("    {}: {}", lang, desc);
        }
    }
    println!();
    println!("Search tree:");
    println!("  Node count:      {}", format_number(meta.node_count as usize));
    println!("  Record size:     {} bits", meta.record_size.bits());
    println!("  Tree size:       {}", format_bytes(meta.search_tree_size));
    println!("  Data section at: {}", meta.data_section_start);
    match db.ipv4_start_node() {
        Some(node) => println!("  IPv4 start node: {}", node),
        None => println!("  IPv4 start node: (no IPv4 subtree)"),
    }

    if verbose {
        let full = db
            .metadata_value()
            .context("Failed to decode metadata map")?;
        println!();
        println!("Full metadata:");
        println!("{}", full);
    }

    Ok(())
}
