//! confcat command-line interface
//!
//! Manages catalogs, schemas and collection values in a local catalog
//! database.

mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;
use confcat_core::{CatalogService, DataTypeRegistry, EngineConfig, StorageConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::Command;

/// Default database directory.
pub const DEFAULT_DATA_PATH: &str = "./confcat.db";

/// confcat schema catalog
#[derive(Parser, Debug)]
#[command(name = "confcat")]
#[command(version, about = "Content-addressed configuration schema catalog")]
pub struct Args {
    /// Path to the catalog database directory
    #[arg(short = 'd', long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Page cache size in megabytes
    #[arg(long, default_value_t = 64)]
    pub cache_mb: u64,

    /// Flush interval in milliseconds (0 flushes on every write)
    #[arg(long, default_value_t = 500)]
    pub flush_every_ms: u64,

    /// Disable storage compression
    #[arg(long)]
    pub no_compression: bool,

    /// Ignore metadata paths and store everything at the root
    #[arg(long)]
    pub flat: bool,

    /// Maximum path depth, including the object's own name
    #[arg(long, default_value_t = confcat_core::config::DEFAULT_MAX_PATH_DEPTH)]
    pub max_path_depth: usize,

    /// Name of the variant created with every catalog
    #[arg(long, default_value = confcat_core::config::DEFAULT_VARIANT_NAME)]
    pub default_variant: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Storage settings for the catalog database.
    pub fn storage_config(&self) -> StorageConfig {
        let flush = (self.flush_every_ms > 0).then_some(self.flush_every_ms);
        StorageConfig::new(&self.data_path)
            .with_cache_capacity(self.cache_mb * 1024 * 1024)
            .with_flush_every_ms(flush)
            .with_compression(!self.no_compression)
    }

    /// Engine settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_hierarchical_paths(!self.flat)
            .with_max_path_depth(self.max_path_depth)
            .with_default_variant_name(&self.default_variant)
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confcat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: Args) -> error::Result<()> {
    tracing::debug!(data_path = %args.data_path.display(), "opening catalog database");
    let service = CatalogService::open(
        args.storage_config(),
        args.engine_config(),
        DataTypeRegistry::with_builtins(),
    )?;
    if service.store().was_recovered() {
        tracing::info!(data_path = %args.data_path.display(), "opened existing catalog database");
    }

    let output = commands::execute(&service, &args.command)?;
    service.store().flush()?;
    println!("{}", output);
    Ok(())
}
