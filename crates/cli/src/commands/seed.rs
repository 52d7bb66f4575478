//! Seed the catalog with demo games.
//!
//! Reads a YAML catalog (see `crates/cli/seed/games.yaml`) and inserts each
//! game whose name is not already present. Safe to re-run.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use gamevault_storefront::db;

use super::migrate;

/// A catalog file.
#[derive(Debug, Deserialize)]
pub struct SeedCatalog {
    pub games: Vec<SeedGame>,
}

#[derive(Debug, Deserialize)]
pub struct SeedGame {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
}

/// Problems found in a catalog before touching the database.
#[must_use]
pub fn validate_catalog(catalog: &SeedCatalog) -> Vec<String> {
    let mut errors = Vec::new();

    for (index, game) in catalog.games.iter().enumerate() {
        let label = if game.name.trim().is_empty() {
            format!("game #{}", index + 1)
        } else {
            game.name.clone()
        };

        if game.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if game.price.is_sign_negative() {
            errors.push(format!("{label}: price must not be negative"));
        }
        if let Some(sale) = game.sale_price {
            if sale.is_sign_negative() {
                errors.push(format!("{label}: sale_price must not be negative"));
            } else if sale > game.price {
                errors.push(format!("{label}: sale_price exceeds price"));
            }
        }
        if game.stock < 0 {
            errors.push(format!("{label}: stock must not be negative"));
        }
    }

    errors
}

/// Seed games from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails
/// validation, or the database rejects an insert.
pub async fn games(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading games from file");
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: SeedCatalog = serde_yaml::from_str(&content)?;

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let database_url = migrate::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let (mut inserted, mut skipped) = (0_u64, 0_u64);
    for game in &catalog.games {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.game (name, price, sale_price, stock)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM storefront.game WHERE name = $1)
            ",
        )
        .bind(game.name.trim())
        .bind(game.price)
        .bind(game.sale_price)
        .bind(game.stock)
        .execute(&pool)
        .await?;
        if result.rows_affected() == 0 {
            skipped += 1;
        } else {
            inserted += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Games in file: {}", catalog.games.len());
    info!("  Games inserted: {inserted}");
    info!("  Games skipped (already exist): {skipped}");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_demo_catalog_is_valid() {
        let content = include_str!("../../seed/games.yaml");
        let catalog: SeedCatalog = serde_yaml::from_str(content).unwrap();

        assert!(!catalog.games.is_empty());
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_validate_catalog_reports_each_problem() {
        let catalog = SeedCatalog {
            games: vec![
                SeedGame {
                    name: "Celeste".to_owned(),
                    price: dec!(10.00),
                    sale_price: Some(dec!(12.00)),
                    stock: -1,
                },
                SeedGame {
                    name: "  ".to_owned(),
                    price: dec!(-1),
                    sale_price: None,
                    stock: 0,
                },
            ],
        };

        let errors = validate_catalog(&catalog);
        assert_eq!(errors.len(), 4);
        assert!(errors.first().unwrap().starts_with("Celeste: sale_price"));
        assert!(errors.iter().any(|e| e.starts_with("game #2: name")));
    }
}
