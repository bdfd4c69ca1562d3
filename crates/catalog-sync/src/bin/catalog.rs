//! # Catalog CLI
//!
//! Inspects and queries the local product cache offline.
//!
//! ## Usage
//! ```bash
//! # Cache status (record count, last update, validity)
//! cargo run -p catalog-sync --bin catalog -- status
//!
//! # Search the cache
//! cargo run -p catalog-sync --bin catalog -- search --term maple --category Food
//! cargo run -p catalog-sync --bin catalog -- search --province Quebec --verified
//!
//! # Empty the cache
//! cargo run -p catalog-sync --bin catalog -- clear
//!
//! # Write the effective configuration to catalog.toml
//! cargo run -p catalog-sync --bin catalog -- init-config
//! ```
//!
//! Every command accepts `--config <PATH>`. `RUST_LOG` controls log output.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use catalog_core::validation::validate_search_term;
use catalog_core::SystemClock;
use catalog_sync::{CatalogConfig, InMemoryRemote, ProductCatalog, SearchCriteria, SyncResult};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    let mut config_path: Option<PathBuf> = None;
    let mut criteria = SearchCriteria::new();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => {
                config_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--term" | "-t", Some(v)) => {
                criteria = criteria.term(validate_search_term(&v)?);
                i += 1;
            }
            ("--province", Some(v)) => {
                criteria = criteria.province(v);
                i += 1;
            }
            ("--city", Some(v)) => {
                criteria = criteria.city(v);
                i += 1;
            }
            ("--category" | "-c", Some(v)) => {
                criteria = criteria.category(v);
                i += 1;
            }
            ("--verified", _) => criteria = criteria.production_verified(true),
            ("--unverified", _) => criteria = criteria.production_verified(false),
            (other, _) => eprintln!("Ignoring argument: {}", other),
        }
        i += 1;
    }

    if command == "help" || command == "--help" || command == "-h" {
        print_help();
        return Ok(());
    }

    let config = CatalogConfig::load(config_path.clone())?;

    if command == "init-config" {
        config.save(config_path)?;
        println!("Configuration written.");
        return Ok(());
    }

    if let Some(parent) = config.db_path().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Offline: there is no remote to sync from, only the cache file.
    let catalog = ProductCatalog::from_config(
        &config,
        Arc::new(InMemoryRemote::new()),
        Arc::new(SystemClock),
    );

    let result = run(&catalog, command, &criteria).await;
    catalog.close().await;
    result?;
    Ok(())
}

async fn run(catalog: &ProductCatalog, command: &str, criteria: &SearchCriteria) -> SyncResult<()> {
    match command {
        "status" => {
            let count = catalog.store().count().await?;
            let valid = catalog.is_cache_valid().await?;
            println!("Records:      {}", count);
            match catalog.metadata().await? {
                Some(meta) => println!("Last updated: {}", meta.last_updated.to_rfc3339()),
                None => println!("Last updated: never"),
            }
            println!("Valid:        {}", if valid { "yes" } else { "no (stale or empty)" });
        }
        "search" => {
            let results = catalog.search_cached(criteria).await?;
            for record in &results {
                println!(
                    "{:<40} {:<16} {:<20} {}",
                    record.name,
                    record.location.city,
                    record.location.province,
                    record.categories.join(", ")
                );
            }
            println!("{} match(es)", results.len());
        }
        "clear" => {
            catalog.clear_cache().await?;
            println!("Cache cleared.");
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
        }
    }
    Ok(())
}

fn print_help() {
    println!("Catalog Cache CLI");
    println!();
    println!("Usage: catalog <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  status         Show record count, last update and validity");
    println!("  search         Search the cache without contacting the remote");
    println!("  clear          Empty the cache");
    println!("  init-config    Write the effective configuration file");
    println!();
    println!("Options:");
    println!("  --config <PATH>        Config file (default: platform config dir)");
    println!("  -t, --term <TEXT>      Free-text term (name, catalog entries, categories)");
    println!("  --province <NAME>      Province or state, exact");
    println!("  --city <NAME>          City, exact");
    println!("  -c, --category <NAME>  Category; repeat for any-of");
    println!("  --verified             Production-verified only");
    println!("  --unverified           Not production-verified only");
}
