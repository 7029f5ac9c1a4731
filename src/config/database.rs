//! Database configuration module for the formulary service.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs without hand-written SQL.

use crate::entities::{Formula, Ingredient, Invoice};
use crate::errors::{Error, Result};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema, Statement};

const DEFAULT_DATABASE_URL: &str = "sqlite://formulary.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
pub fn get_database_url() -> Result<String> {
    Ok(std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()))
}

/// Establishes a connection to the database at `database_url`.
///
/// # Errors
/// Returns [`Error::Connection`] if the database cannot be opened.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables that do not exist yet from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut ingredient_table = schema.create_table_from_entity(Ingredient);
    let mut formula_table = schema.create_table_from_entity(Formula);
    let mut invoice_table = schema.create_table_from_entity(Invoice);

    db.execute(builder.build(ingredient_table.if_not_exists()))
        .await?;
    db.execute(builder.build(formula_table.if_not_exists()))
        .await?;
    db.execute(builder.build(invoice_table.if_not_exists()))
        .await?;

    Ok(())
}

/// Runs `SELECT 1` to check that the database answers.
///
/// # Errors
/// Any failure is reported as [`Error::Connection`].
pub async fn ping(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "SELECT 1"))
        .await
        .map(|_| ())
        .map_err(Error::Connection)
}
