//! Invoice entity - Supplier invoice metadata with a stored PDF.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// UUID v4, generated on insert
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Invoice date
    pub date: Date,
    /// Supplier name
    pub supplier: String,
    /// PDF location relative to the upload directory (`invoices/<uuid>.pdf`)
    pub pdf_path: String,
    /// Line items as a JSON array
    pub ingredients: Json,
    /// When the invoice was recorded
    pub created_at: DateTimeUtc,
}

/// The uploaded PDF lives on disk; invoices have no foreign keys.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
