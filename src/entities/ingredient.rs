//! Ingredient entity - A raw material that formulas are mixed from.
//!
//! Ingredients carry a unit of measure and a cost per unit; the optional density
//! lets callers convert between mass and volume.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ingredient database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingredients")]
pub struct Model {
    /// UUID v4, generated on insert
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Unique display name (e.g., "Chamomile Extract")
    #[sea_orm(unique)]
    pub name: String,
    /// Unit of measure (e.g., "kg", "L")
    pub unit: String,
    /// Price for one unit
    pub cost_per_unit: f64,
    /// Density in unit-mass per unit-volume, when known
    pub density: Option<f64>,
    /// When the ingredient was created
    pub created_at: DateTimeUtc,
}

/// Ingredients are referenced from formula compositions by id only.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
