//! Formula business logic - Handles all formula-related operations.
//!
//! A formula is a named mixture whose composition lists ingredient shares in
//! percent. Every write goes through the same validation: the composition must
//! be non-empty, reference distinct existing ingredients with finite
//! non-negative shares, and add up to 100 within [`PERCENTAGE_TOLERANCE`].
//! Every write also rebuilds the formula's search vector.

use crate::{
    core::{
        ingredient::{ensure_all_found, get_ingredient, get_ingredients_by_ids},
        pagination::{Page, Pagination},
    },
    entities::{
        Formula,
        formula::{self, IngredientShare, composition_to_json},
    },
    errors::{Error, Result},
    search::text::SearchVector,
};
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, instrument};
use uuid::Uuid;

/// Allowed deviation of the percentage sum from 100.
pub const PERCENTAGE_TOLERANCE: f64 = 0.01;

const MAX_NAME_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 1000;

/// Fields for a new formula.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFormula {
    /// Unique name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Total batch mass
    pub mass: f64,
    /// Ingredient shares
    #[serde(default)]
    pub ingredients: Vec<IngredientShare>,
}

/// Partial update; a supplied composition replaces the stored one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormulaChanges {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New mass
    pub mass: Option<f64>,
    /// New composition
    pub ingredients: Option<Vec<IngredientShare>>,
}

impl NewFormula {
    /// Checks every field except ingredient existence, which needs the database.
    fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Formula name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::validation(format!(
                "Formula name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(Error::validation(format!(
                "Formula description cannot exceed {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(Error::validation(format!(
                "Mass must be greater than 0, got {}",
                self.mass
            )));
        }
        validate_composition(&self.ingredients)?;

        Ok(Self { name, ..self })
    }

    fn search_vector(&self) -> String {
        SearchVector::for_formula(&self.name, self.description.as_deref()).to_string()
    }
}

impl FormulaChanges {
    /// Merges the changes over `current`; the result is validated like a create.
    fn merged_over(self, current: &formula::Model) -> Result<NewFormula> {
        let ingredients = match self.ingredients {
            Some(ingredients) => ingredients,
            None => current.composition()?,
        };
        NewFormula {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            description: self.description.or_else(|| current.description.clone()),
            mass: self.mass.unwrap_or(current.mass),
            ingredients,
        }
        .validated()
    }
}

/// Checks the shape of a composition.
///
/// # Errors
/// Returns [`Error::Validation`] if the composition is empty, repeats an
/// ingredient, has a negative or non-finite share, or does not add up to 100.
pub fn validate_composition(shares: &[IngredientShare]) -> Result<()> {
    if shares.is_empty() {
        return Err(Error::validation(
            "Formula must contain at least one ingredient",
        ));
    }

    let mut seen = HashSet::new();
    for share in shares {
        if !seen.insert(share.ingredient_id.as_str()) {
            return Err(Error::validation(format!(
                "Duplicate ingredient in formula: {}",
                share.ingredient_id
            )));
        }
        if !share.percentage.is_finite() || share.percentage < 0.0 || share.percentage > 100.0 {
            return Err(Error::validation(format!(
                "Invalid percentage {} for ingredient {}",
                share.percentage, share.ingredient_id
            )));
        }
    }

    let total: f64 = shares.iter().map(|s| s.percentage).sum();
    if (total - 100.0).abs() > PERCENTAGE_TOLERANCE {
        return Err(Error::validation(format!(
            "Ingredient percentages must sum to 100, got {total}"
        )));
    }

    Ok(())
}

/// Fails unless every ingredient in `shares` exists.
async fn ensure_ingredients_exist<C: ConnectionTrait>(
    db: &C,
    shares: &[IngredientShare],
) -> Result<()> {
    let ids: Vec<String> = shares.iter().map(|s| s.ingredient_id.clone()).collect();
    let found = get_ingredients_by_ids(db, &ids).await?;
    let found: HashSet<&str> = found.iter().map(|i| i.id.as_str()).collect();

    let missing: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| !found.contains(id))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Invalid ingredient ID(s): {}",
            missing.join(", ")
        )))
    }
}

fn into_active_model(new: NewFormula, id: String) -> formula::ActiveModel {
    formula::ActiveModel {
        id: Set(id),
        search_vector: Set(new.search_vector()),
        ingredients: Set(composition_to_json(&new.ingredients)),
        name: Set(new.name),
        description: Set(new.description),
        mass: Set(new.mass),
        created_at: Set(chrono::Utc::now()),
    }
}

fn apply(model: formula::Model, values: NewFormula) -> formula::ActiveModel {
    let mut active: formula::ActiveModel = model.into();
    active.search_vector = Set(values.search_vector());
    active.ingredients = Set(composition_to_json(&values.ingredients));
    active.name = Set(values.name);
    active.description = Set(values.description);
    active.mass = Set(values.mass);
    active
}

async fn insert_formula<C: ConnectionTrait>(db: &C, new: NewFormula) -> Result<formula::Model> {
    let new = new.validated()?;
    ensure_ingredients_exist(db, &new.ingredients).await?;
    into_active_model(new, Uuid::new_v4().to_string())
        .insert(db)
        .await
        .map_err(Into::into)
}

async fn patch_formula<C: ConnectionTrait>(
    db: &C,
    id: &str,
    changes: FormulaChanges,
) -> Result<formula::Model> {
    let current = get_formula(db, id).await?;
    let values = changes.merged_over(&current)?;
    ensure_ingredients_exist(db, &values.ingredients).await?;
    apply(current, values).update(db).await.map_err(Into::into)
}

/// Creates a formula.
///
/// # Errors
/// Returns [`Error::Validation`] for an invalid name, mass or composition
/// (including unknown ingredient ids), or [`Error::Constraint`] on a duplicate name.
#[instrument(skip(db, new), fields(name = %new.name))]
pub async fn create_formula(db: &DatabaseConnection, new: NewFormula) -> Result<formula::Model> {
    let formula = insert_formula(db, new).await?;
    info!(formula_id = %formula.id, "Created formula");
    Ok(formula)
}

/// Retrieves a formula by id.
///
/// # Errors
/// Returns [`Error::NotFound`] if no formula has this id.
pub async fn get_formula<C: ConnectionTrait>(db: &C, id: &str) -> Result<formula::Model> {
    Formula::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Formula", id))
}

/// Retrieves every formula, ordered by name.
pub async fn get_all_formulas(db: &DatabaseConnection) -> Result<Vec<formula::Model>> {
    Formula::find()
        .order_by_asc(formula::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists formulas one page at a time, ordered by name.
pub async fn list_formulas(
    db: &DatabaseConnection,
    pagination: Pagination,
) -> Result<Page<formula::Model>> {
    let total_count = Formula::find().count(db).await?;
    let items = Formula::find()
        .order_by_asc(formula::Column::Name)
        .order_by_asc(formula::Column::Id)
        .offset(pagination.offset())
        .limit(pagination.size())
        .all(db)
        .await?;

    Ok(Page {
        items,
        total_count,
        pagination,
    })
}

/// Formulas whose composition references `ingredient_id`.
///
/// The JSON text is prefiltered with `LIKE` and then checked key by key, so a
/// percentage or another id containing the same text cannot match.
pub async fn find_referencing<C: ConnectionTrait>(
    db: &C,
    ingredient_id: &str,
) -> Result<Vec<formula::Model>> {
    let candidates = Formula::find()
        .filter(formula::Column::Ingredients.like(format!("%\"{ingredient_id}\"%")))
        .order_by_asc(formula::Column::Name)
        .all(db)
        .await?;

    Ok(candidates
        .into_iter()
        .filter(|formula| formula.references(ingredient_id))
        .collect())
}

/// Number of formulas referencing `ingredient_id`.
pub async fn count_referencing<C: ConnectionTrait>(db: &C, ingredient_id: &str) -> Result<usize> {
    Ok(find_referencing(db, ingredient_id).await?.len())
}

/// Every formula using an ingredient.
///
/// # Errors
/// Returns [`Error::NotFound`] if the ingredient does not exist.
#[instrument(skip(db))]
pub async fn get_formulas_by_ingredient(
    db: &DatabaseConnection,
    ingredient_id: &str,
) -> Result<Vec<formula::Model>> {
    get_ingredient(db, ingredient_id).await?;
    let formulas = find_referencing(db, ingredient_id).await?;
    info!(count = formulas.len(), "Found formulas by ingredient");
    Ok(formulas)
}

/// Applies a partial update to a formula.
///
/// # Errors
/// Returns [`Error::NotFound`] if the formula does not exist, or the same
/// validation and constraint errors as [`create_formula`].
#[instrument(skip(db, changes))]
pub async fn update_formula(
    db: &DatabaseConnection,
    id: &str,
    changes: FormulaChanges,
) -> Result<formula::Model> {
    let updated = patch_formula(db, id, changes).await?;
    info!("Updated formula");
    Ok(updated)
}

/// Deletes a formula.
///
/// # Errors
/// Returns [`Error::NotFound`] if the formula does not exist.
#[instrument(skip(db))]
pub async fn delete_formula(db: &DatabaseConnection, id: &str) -> Result<()> {
    let result = Formula::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Formula", id));
    }
    info!("Deleted formula");
    Ok(())
}

/// Creates several formulas in one transaction.
///
/// # Errors
/// Fails on the first invalid item; nothing is written in that case.
#[instrument(skip(db, items), fields(count = items.len()))]
pub async fn create_formulas(
    db: &DatabaseConnection,
    items: Vec<NewFormula>,
) -> Result<Vec<formula::Model>> {
    if items.is_empty() {
        return Err(Error::validation("At least one formula is required"));
    }

    let txn = db.begin().await?;
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        created.push(insert_formula(&txn, item).await?);
    }
    txn.commit().await?;

    info!("Created formulas in bulk");
    Ok(created)
}

/// Updates several formulas in one transaction.
///
/// # Errors
/// Returns [`Error::NotFound`] listing every unknown id, or the first
/// validation error. Nothing is written on error.
#[instrument(skip(db, items), fields(count = items.len()))]
pub async fn update_formulas(
    db: &DatabaseConnection,
    items: Vec<(String, FormulaChanges)>,
) -> Result<Vec<formula::Model>> {
    if items.is_empty() {
        return Err(Error::validation("At least one formula is required"));
    }

    let txn = db.begin().await?;

    let ids: Vec<String> = items.iter().map(|(id, _)| id.clone()).collect();
    let existing = Formula::find()
        .filter(formula::Column::Id.is_in(ids.iter().cloned()))
        .all(&txn)
        .await?;
    ensure_all_found("Formulas", &ids, existing.iter().map(|f| f.id.as_str()))?;

    let mut updated = Vec::with_capacity(items.len());
    for (id, changes) in items {
        updated.push(patch_formula(&txn, &id, changes).await?);
    }
    txn.commit().await?;

    info!("Updated formulas in bulk");
    Ok(updated)
}

/// Deletes several formulas with one statement in one transaction.
///
/// # Errors
/// Returns [`Error::NotFound`] listing every unknown id; nothing is deleted.
#[instrument(skip(db, ids), fields(count = ids.len()))]
pub async fn delete_formulas(db: &DatabaseConnection, ids: Vec<String>) -> Result<u64> {
    if ids.is_empty() {
        return Err(Error::validation("At least one formula id is required"));
    }

    let txn = db.begin().await?;

    let existing = Formula::find()
        .filter(formula::Column::Id.is_in(ids.iter().cloned()))
        .all(&txn)
        .await?;
    ensure_all_found("Formulas", &ids, existing.iter().map(|f| f.id.as_str()))?;

    let result = Formula::delete_many()
        .filter(formula::Column::Id.is_in(ids.iter().cloned()))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    info!(deleted = result.rows_affected, "Deleted formulas in bulk");
    Ok(result.rows_affected)
}
