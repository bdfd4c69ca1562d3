//! # Seed Data Generator
//!
//! Populates a local product cache with sample brand records for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 records (default)
//! cargo run -p catalog-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p catalog-db --bin seed -- --count 2000
//!
//! # Specify cache path
//! cargo run -p catalog-db --bin seed -- --db ./data/catalog-cache.db
//! ```
//!
//! ## Generated Records
//! Each record gets a brand name built from a prefix and a trade, a home
//! city, one or two categories, and a handful of catalog entries. Roughly a
//! third are production-verified.

use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use catalog_core::search::{filter_and_sort, SearchCriteria};
use catalog_core::{Actor, Location, ProductRecord, SystemClock, DEFAULT_COUNTRY};
use catalog_db::{DbConfig, ProductCacheStore};

const PREFIXES: &[&str] = &[
    "Maple", "Northern", "Harbour", "Prairie", "Cedar", "Granite", "Aurora", "Birch", "Glacier",
    "Summit",
];

/// Trades with the category they belong to and sample catalog entries.
const TRADES: &[(&str, &str, &[&str])] = &[
    ("Syrup Co", "Food", &["Amber Syrup", "Dark Syrup", "Maple Butter"]),
    ("Roasters", "Beverage", &["House Blend", "Dark Roast", "Decaf"]),
    ("Woolens", "Apparel", &["Toque", "Mittens", "Scarf"]),
    ("Brewing", "Beverage", &["Pale Ale", "Lager", "Stout"]),
    ("Soapworks", "Personal Care", &["Oat Soap", "Lavender Bar", "Shampoo Bar"]),
    ("Bakery", "Food", &["Sourdough", "Rye Loaf", "Butter Tarts"]),
    ("Outfitters", "Outdoor", &["Canoe Paddle", "Dry Bag", "Camp Stool"]),
];

const CITIES: &[(&str, &str)] = &[
    ("Halifax", "Nova Scotia"),
    ("Montreal", "Quebec"),
    ("Toronto", "Ontario"),
    ("Winnipeg", "Manitoba"),
    ("Calgary", "Alberta"),
    ("Vancouver", "British Columbia"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./catalog_cache_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Catalog Cache Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of records to generate (default: 500)");
                println!("  -d, --db <PATH>    Cache file path (default: ./catalog_cache_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding product cache");

    let store = ProductCacheStore::with_clock(DbConfig::new(&db_path), Arc::new(SystemClock));
    store.initialize().await?;

    let existing = store.count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Cache already has records; skipping seed. Delete the file to regenerate."
        );
        return Ok(());
    }

    let start = std::time::Instant::now();
    let records: Vec<ProductRecord> = (0..count).map(generate_record).collect();
    let written = store.put_all(&records).await?;
    let elapsed = start.elapsed();

    info!(
        written,
        elapsed_ms = elapsed.as_millis() as u64,
        "Seed records written"
    );

    let cached = store.get_all().await?;
    let maple = filter_and_sort(cached.clone(), &SearchCriteria::new().term("maple"));
    let food = filter_and_sort(cached, &SearchCriteria::new().category("Food"));
    info!(maple = maple.len(), food = food.len(), "Sample searches");

    store.close().await;
    Ok(())
}

/// Generates a single record with deterministic-looking variety.
fn generate_record(seed: usize) -> ProductRecord {
    let now = Utc::now();
    let prefix = PREFIXES[seed % PREFIXES.len()];
    let (trade, category, entries) = TRADES[(seed / PREFIXES.len()) % TRADES.len()];
    let (city, province) = CITIES[seed % CITIES.len()];

    let name = format!("{} {} #{}", prefix, trade, seed);
    let created_at = now - Duration::days((seed % 365) as i64);

    let mut categories = vec![category.to_string()];
    if seed % 5 == 0 {
        categories.push("Gift".to_string());
    }

    ProductRecord::new(Uuid::new_v4().to_string(), name, created_at)
        .with_location(Location::new(city, province, "").with_default_country(DEFAULT_COUNTRY))
        .with_categories(categories)
        .with_catalog_entries(entries.iter().copied())
        .with_tags(if seed % 2 == 0 { vec!["local"] } else { Vec::new() })
        .with_production_verified(seed % 3 == 0)
        .modified(Actor::system(), now)
}
