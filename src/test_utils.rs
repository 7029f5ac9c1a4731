//! Shared test utilities for the formulary crate.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        formula::{self, NewFormula},
        ingredient::{self, NewIngredient},
    },
    entities::{self, formula::IngredientShare},
    errors::Result,
    storage::InvoiceFiles,
};
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all store tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes tracing output to the test harness; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Creates a test ingredient with sensible defaults.
///
/// # Defaults
/// * `unit`: "kg"
/// * `cost_per_unit`: 10.0
/// * `density`: None
pub async fn create_test_ingredient(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::ingredient::Model> {
    ingredient::create_ingredient(
        db,
        NewIngredient {
            name: name.to_string(),
            unit: "kg".to_string(),
            cost_per_unit: 10.0,
            density: None,
        },
    )
    .await
}

/// Creates a test formula made entirely of one ingredient.
///
/// # Defaults
/// * `mass`: 100.0
pub async fn create_test_formula(
    db: &DatabaseConnection,
    name: &str,
    description: Option<&str>,
    ingredient_id: &str,
) -> Result<entities::formula::Model> {
    formula::create_formula(
        db,
        NewFormula {
            name: name.to_string(),
            description: description.map(str::to_string),
            mass: 100.0,
            ingredients: vec![IngredientShare {
                ingredient_id: ingredient_id.to_string(),
                percentage: 100.0,
            }],
        },
    )
    .await
}

/// Sets up a database with two ingredients and one formula using both
/// (70% / 30%). Returns (db, ingredients, formula).
pub async fn setup_with_formula() -> Result<(
    DatabaseConnection,
    Vec<entities::ingredient::Model>,
    entities::formula::Model,
)> {
    init_test_tracing();
    let db = setup_test_db().await?;
    let chamomile = create_test_ingredient(&db, "Chamomile Flower").await?;
    let honey = create_test_ingredient(&db, "Honey").await?;

    let formula = formula::create_formula(
        &db,
        NewFormula {
            name: "Calming Chamomile Tea".to_string(),
            description: Some("A gentle evening blend".to_string()),
            mass: 250.0,
            ingredients: vec![
                IngredientShare {
                    ingredient_id: chamomile.id.clone(),
                    percentage: 70.0,
                },
                IngredientShare {
                    ingredient_id: honey.id.clone(),
                    percentage: 30.0,
                },
            ],
        },
    )
    .await?;

    Ok((db, vec![chamomile, honey], formula))
}

/// Sets up a database plus an invoice file store in a temporary directory.
/// Keep the returned `TempDir` alive for the duration of the test.
pub async fn setup_with_files() -> Result<(DatabaseConnection, InvoiceFiles, TempDir)> {
    let db = setup_test_db().await?;
    let dir = tempfile::tempdir()?;
    let files = InvoiceFiles::new(dir.path());
    Ok((db, files, dir))
}
