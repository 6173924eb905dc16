mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_inspect, cmd_networks, cmd_query};

#[derive(Parser)]
#[command(name = "mmdb")]
#[command(
    about = "Query and inspect MaxMind DB (.mmdb) files",
    long_about = "mmdb - Read-only tool for MaxMind DB files such as GeoLite2-Country\n\n\
    Looks up IPv4 and IPv6 addresses, prints database metadata and lists every\n\
    network stored in the search tree. Files are memory-mapped.\n\n\
    Examples:\n\
      mmdb query GeoLite2-Country.mmdb 2.125.160.216\n\
      mmdb query GeoLite2-Country.mmdb 2001:218::1 --quiet\n\
      mmdb inspect GeoLite2-Country.mmdb --verbose\n\
      mmdb networks GeoLite2-Country.mmdb --limit 20"
)]
#[command(version)]
struct Cli {
    /// Log to stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose_log: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an IP address
    Query {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// IPv4 or IPv6 address
        #[arg(value_name = "ADDRESS")]
        address: String,

        /// Quiet mode - no output, only exit code (0 = found, 1 = not found)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show metadata and tree geometry
    Inspect {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Also dump the complete metadata map
        #[arg(long)]
        verbose: bool,
    },

    /// List every network that has a record, in CIDR form
    Networks {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Stop printing after this many networks
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose_log);

    match cli.command {
        Commands::Query {
            database,
            address,
            quiet,
        } => cmd_query(database, address, quiet),
        Commands::Inspect {
            database,
            json,
            verbose,
        } => cmd_inspect(database, json, verbose),
        Commands::Networks { database, limit } => cmd_networks(database, limit),
    }
}
