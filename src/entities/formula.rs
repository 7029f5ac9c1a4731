//! Formula entity - A named mixture of ingredients with a total mass.
//!
//! The composition is persisted as a JSON object mapping ingredient id to
//! percentage. `search_vector` holds the analyzed lexemes of the name and
//! description and is rebuilt on every write.

use crate::errors::{Error, Result};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Formula database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "formulas")]
pub struct Model {
    /// UUID v4, generated on insert
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Unique display name
    #[sea_orm(unique)]
    pub name: String,
    /// Free-form description
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Composition as `{"<ingredient_id>": <percentage>}`
    pub ingredients: Json,
    /// Total batch mass
    pub mass: f64,
    /// Serialized lexeme vector over name and description
    #[sea_orm(column_type = "Text")]
    #[serde(skip)]
    pub search_vector: String,
    /// When the formula was created
    pub created_at: DateTimeUtc,
}

/// Compositions are stored inline as JSON, so formulas have no foreign keys.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// One entry of a formula composition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngredientShare {
    /// Referenced ingredient
    pub ingredient_id: String,
    /// Share of the total mass, in percent
    pub percentage: f64,
}

/// Serializes a composition into its stored JSON object form.
#[must_use]
pub fn composition_to_json(shares: &[IngredientShare]) -> Json {
    let object = shares
        .iter()
        .map(|share| (share.ingredient_id.clone(), Json::from(share.percentage)))
        .collect::<serde_json::Map<_, _>>();
    Json::Object(object)
}

impl Model {
    /// Decodes the stored composition.
    ///
    /// # Errors
    /// Returns [`Error::DataFormat`] if the column is not an object of numbers.
    pub fn composition(&self) -> Result<Vec<IngredientShare>> {
        let object = self.ingredients.as_object().ok_or_else(|| {
            Error::DataFormat(format!("formula {} has a non-object composition", self.id))
        })?;

        object
            .iter()
            .map(|(ingredient_id, value)| {
                value
                    .as_f64()
                    .map(|percentage| IngredientShare {
                        ingredient_id: ingredient_id.clone(),
                        percentage,
                    })
                    .ok_or_else(|| {
                        Error::DataFormat(format!(
                            "formula {} has a non-numeric percentage for {ingredient_id}",
                            self.id
                        ))
                    })
            })
            .collect()
    }

    /// Ingredient ids referenced by the composition.
    pub fn ingredient_ids(&self) -> impl Iterator<Item = &str> {
        self.ingredients
            .as_object()
            .into_iter()
            .flat_map(|object| object.keys().map(String::as_str))
    }

    /// Whether the composition references `ingredient_id`.
    #[must_use]
    pub fn references(&self, ingredient_id: &str) -> bool {
        self.ingredient_ids().any(|id| id == ingredient_id)
    }
}
