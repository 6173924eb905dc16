use anyhow::{Context, Result};
use mmdb_reader::{prefix_address, Database};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::cli_utils::format_number;

pub fn cmd_networks(database: PathBuf, limit: Option<usize>) -> Result<()> {
    let db = Database::open(&database)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let ip_version = db.ip_version();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut shown = 0usize;
    let mut total = 0usize;
    let mut write_error = None;

    db.enumerate(|words, prefix_len| {
        total += 1;
        if write_error.is_some() || limit.is_some_and(|max| shown >= max) {
            return;
        }
        let network = prefix_address(words, ip_version);
        match writeln!(out, "{}/{}", network, prefix_len) {
            Ok(()) => shown += 1,
            Err(e) => write_error = Some(e),
        }
    })
    .with_context(|| format!("Failed to walk search tree of {}", database.display()))?;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write output");
    }
    out.flush()?;

    if shown < total {
        eprintln!(
            "Showing {} of {} networks",
            format_number(shown),
            format_number(total)
        );
    }

    Ok(())
}
