//! # Seed Data Generator
//!
//! Populates a database with one demo company for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./stockyard_dev.db for company "demo"
//! cargo run -p stockyard-db --bin seed
//!
//! # Specify database path and company
//! cargo run -p stockyard-db --bin seed -- --db ./data/stockyard.db --company acme
//! ```
//!
//! ## Generated Data
//! - Categories: Cement, Aggregates, Steel, Finishing
//! - Products with a unit each, including the three RMC materials
//! - Two suppliers and three customers
//! - Two stock batches per product, a month apart, so FIFO picks are visible
//! - An admin user and document settings

use std::env;

use anyhow::Context;
use chrono::{Duration, Utc};
use stockyard_core::input::{
    CategoryInput, PartyInput, ProductInput, SettingsInput, StockInput, UserInput,
};
use stockyard_core::{Quantity, UserRole};
use stockyard_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, [(product, unit, cost cents, selling cents, units per batch)])
const CATALOG: &[(&str, &[(&str, &str, i64, i64, i64)])] = &[
    (
        "Cement",
        &[
            ("Portland Cement", "bag", 24_000, 26_500, 400),
            ("Masonry Cement", "bag", 21_000, 23_500, 150),
        ],
    ),
    (
        "Aggregates",
        &[
            ("Crushed Gravel", "cu.m", 95_000, 120_000, 40),
            ("Washed Sand", "cu.m", 80_000, 100_000, 40),
            ("Fill Sand", "cu.m", 45_000, 60_000, 6),
        ],
    ),
    (
        "Steel",
        &[
            ("Rebar 10mm", "pc", 18_500, 21_000, 300),
            ("Rebar 12mm", "pc", 26_000, 29_500, 200),
            ("Tie Wire", "kg", 9_000, 11_000, 8),
        ],
    ),
    (
        "Finishing",
        &[
            ("Tile Adhesive", "bag", 32_000, 36_000, 60),
            ("Skim Coat", "bag", 28_000, 31_500, 5),
        ],
    ),
];

const SUPPLIERS: &[(&str, &str)] = &[
    ("North Quarry Aggregates", "0917-555-0101"),
    ("Metro Cement Depot", "0917-555-0202"),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Acme Builders", "0918-555-1001"),
    ("Bolt Construction", "0918-555-1002"),
    ("Riverside Homes", "0918-555-1003"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stockyard_db=info,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./stockyard_dev.db");
    let mut company_id = String::from("demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--company" | "-c" => {
                if i + 1 < args.len() {
                    company_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockyard Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./stockyard_dev.db)");
                println!("  -c, --company <ID>     Company id to seed (default: demo)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, company_id = %company_id, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {}", db_path))?;

    let existing = db.categories().all(&company_id).await?;
    if !existing.is_empty() {
        warn!(
            company_id = %company_id,
            categories = existing.len(),
            "Company already has data, skipping seed. Delete the database file to regenerate."
        );
        return Ok(());
    }

    let start = std::time::Instant::now();
    let today = Utc::now().date_naive();
    let mut batches = 0;

    for (category_name, products) in CATALOG {
        let category = db
            .categories()
            .create(
                &company_id,
                &CategoryInput {
                    name: category_name.to_string(),
                },
            )
            .await
            .with_context(|| format!("creating category {}", category_name))?;

        for (name, unit, cost_cents, selling_cents, units) in products.iter() {
            let product = db
                .products()
                .create(
                    &company_id,
                    &ProductInput {
                        name: name.to_string(),
                        unit: unit.to_string(),
                        category_id: Some(category.id.clone()),
                    },
                )
                .await
                .with_context(|| format!("creating product {}", name))?;

            // An older, cheaper batch and a current one
            for (age_days, cost_delta) in [(45, -500), (10, 0)] {
                db.stocks()
                    .create(
                        &company_id,
                        &StockInput {
                            product_id: product.id.clone(),
                            cost_cents: cost_cents + cost_delta,
                            selling_price_cents: Some(*selling_cents),
                            quantity: Quantity::from_units(*units),
                            purchase_date: Some(today - Duration::days(age_days)),
                        },
                    )
                    .await
                    .with_context(|| format!("creating stock for {}", name))?;
                batches += 1;
            }
        }
    }

    for (name, contact) in SUPPLIERS {
        db.suppliers().create(&company_id, &party(name, contact)).await?;
    }
    for (name, contact) in CUSTOMERS {
        db.customers().create(&company_id, &party(name, contact)).await?;
    }

    db.users()
        .create(
            &company_id,
            &UserInput {
                name: "Demo Admin".to_string(),
                email: format!("admin@{}.example.com", company_id),
                role: UserRole::Admin,
                is_active: true,
            },
        )
        .await?;

    db.settings()
        .save(
            &company_id,
            &SettingsInput {
                company_name: Some("Stockyard Demo Supply".to_string()),
                shipping_name: Some("Main Yard".to_string()),
                shipping_address: Some("12 Quarry Road".to_string()),
                shipping_contact: Some("0917-555-0000".to_string()),
                billing_name: Some("Accounts".to_string()),
                billing_address: Some("12 Quarry Road".to_string()),
                billing_contact: Some("0917-555-0001".to_string()),
            },
        )
        .await?;

    info!(
        company_id = %company_id,
        batches,
        elapsed = ?start.elapsed(),
        "Seed complete"
    );
    Ok(())
}

fn party(name: &str, contact: &str) -> PartyInput {
    PartyInput {
        name: name.to_string(),
        contact_number: Some(contact.to_string()),
        address: None,
    }
}
