//! Ingredient business logic - CRUD, substring search and bulk operations.
//!
//! Names and units are trimmed before storage and every write is validated the
//! same way, whether it arrives as a create, a partial update or part of a
//! bulk request. Deleting an ingredient is refused while any formula's
//! composition still references it.

use crate::{
    core::{
        formula,
        pagination::{Page, Pagination},
    },
    entities::{Ingredient, ingredient},
    errors::{Error, Result},
};
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, instrument};
use uuid::Uuid;

const MAX_NAME_LEN: usize = 255;
const MAX_UNIT_LEN: usize = 50;

/// Fields for a new ingredient.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewIngredient {
    /// Unique name
    pub name: String,
    /// Unit of measure
    pub unit: String,
    /// Price for one unit
    pub cost_per_unit: f64,
    /// Optional density
    #[serde(default)]
    pub density: Option<f64>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngredientChanges {
    /// New name
    pub name: Option<String>,
    /// New unit
    pub unit: Option<String>,
    /// New price for one unit
    pub cost_per_unit: Option<f64>,
    /// New density
    pub density: Option<f64>,
}

impl NewIngredient {
    /// Trims text fields and checks every constraint.
    fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        let unit = self.unit.trim().to_string();

        if name.is_empty() {
            return Err(Error::validation("Ingredient name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::validation(format!(
                "Ingredient name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        if unit.is_empty() {
            return Err(Error::validation("Ingredient unit cannot be empty"));
        }
        if unit.chars().count() > MAX_UNIT_LEN {
            return Err(Error::validation(format!(
                "Ingredient unit cannot exceed {MAX_UNIT_LEN} characters"
            )));
        }
        if !self.cost_per_unit.is_finite() || self.cost_per_unit < 0.0 {
            return Err(Error::validation(format!(
                "Invalid cost per unit: {}",
                self.cost_per_unit
            )));
        }
        if let Some(density) = self.density.filter(|d| !d.is_finite() || *d < 0.0) {
            return Err(Error::validation(format!("Invalid density: {density}")));
        }

        Ok(Self {
            name,
            unit,
            cost_per_unit: self.cost_per_unit,
            density: self.density,
        })
    }

    fn into_active_model(self, id: String) -> ingredient::ActiveModel {
        ingredient::ActiveModel {
            id: Set(id),
            name: Set(self.name),
            unit: Set(self.unit),
            cost_per_unit: Set(self.cost_per_unit),
            density: Set(self.density),
            created_at: Set(chrono::Utc::now()),
        }
    }
}

impl IngredientChanges {
    /// Merges the changes over `current`; the result is validated like a create.
    fn merged_over(self, current: &ingredient::Model) -> Result<NewIngredient> {
        NewIngredient {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            unit: self.unit.unwrap_or_else(|| current.unit.clone()),
            cost_per_unit: self.cost_per_unit.unwrap_or(current.cost_per_unit),
            density: self.density.or(current.density),
        }
        .validated()
    }
}

fn apply(model: ingredient::Model, values: NewIngredient) -> ingredient::ActiveModel {
    let mut active: ingredient::ActiveModel = model.into();
    active.name = Set(values.name);
    active.unit = Set(values.unit);
    active.cost_per_unit = Set(values.cost_per_unit);
    active.density = Set(values.density);
    active
}

/// Case-insensitive substring test; `needle` must already be lowercase.
///
/// Done in Rust because SQLite's `LOWER` only folds ASCII.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Ingredients ordered by name that satisfy `keep`, cut to one page.
async fn filtered_page(
    db: &DatabaseConnection,
    pagination: Pagination,
    keep: impl Fn(&ingredient::Model) -> bool,
) -> Result<Page<ingredient::Model>> {
    let matches: Vec<ingredient::Model> = Ingredient::find()
        .order_by_asc(ingredient::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .filter(|model| keep(model))
        .collect();

    let total_count = u64::try_from(matches.len()).unwrap_or(u64::MAX);
    let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let size = usize::try_from(pagination.size()).unwrap_or(usize::MAX);
    Ok(Page {
        items: matches.into_iter().skip(offset).take(size).collect(),
        total_count,
        pagination,
    })
}

/// Creates an ingredient.
///
/// # Errors
/// Returns an error if:
/// - The name or unit is empty after trimming, or too long
/// - The cost or density is negative or not finite
/// - An ingredient with the same name exists ([`Error::Constraint`])
#[instrument(skip(db, new), fields(name = %new.name))]
pub async fn create_ingredient(
    db: &DatabaseConnection,
    new: NewIngredient,
) -> Result<ingredient::Model> {
    let ingredient = new
        .validated()?
        .into_active_model(Uuid::new_v4().to_string())
        .insert(db)
        .await?;
    info!(ingredient_id = %ingredient.id, "Created ingredient");
    Ok(ingredient)
}

/// Retrieves an ingredient by id.
///
/// # Errors
/// Returns [`Error::NotFound`] if no ingredient has this id.
pub async fn get_ingredient<C: ConnectionTrait>(db: &C, id: &str) -> Result<ingredient::Model> {
    Ingredient::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Ingredient", id))
}

/// Retrieves every ingredient whose id is in `ids`. Unknown ids are skipped.
pub async fn get_ingredients_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[String],
) -> Result<Vec<ingredient::Model>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ingredient::find()
        .filter(ingredient::Column::Id.is_in(ids.iter().cloned()))
        .order_by_asc(ingredient::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists ingredients one page at a time.
///
/// Without a filter rows come back in storage order. With `name_filter` the
/// match is a case-insensitive substring match on the name, ordered by name.
pub async fn list_ingredients(
    db: &DatabaseConnection,
    pagination: Pagination,
    name_filter: Option<&str>,
) -> Result<Page<ingredient::Model>> {
    if let Some(filter) = name_filter.map(str::trim).filter(|f| !f.is_empty()) {
        let needle = filter.to_lowercase();
        return filtered_page(db, pagination, |model| contains_folded(&model.name, &needle)).await;
    }

    let total_count = Ingredient::find().count(db).await?;
    let items = Ingredient::find()
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

/// Case-insensitive substring search over name or unit, ordered by name.
///
/// # Errors
/// Returns [`Error::Validation`] if `term` is blank.
#[instrument(skip(db))]
pub async fn search_ingredients(
    db: &DatabaseConnection,
    term: &str,
    pagination: Pagination,
) -> Result<Page<ingredient::Model>> {
    let term = term.trim();
    if term.is_empty() {
        return Err(Error::validation("Search term cannot be empty"));
    }

    let needle = term.to_lowercase();
    let page = filtered_page(db, pagination, |model| {
        contains_folded(&model.name, &needle) || contains_folded(&model.unit, &needle)
    })
    .await?;

    info!(
        count = page.items.len(),
        total_count = page.total_count,
        "Ingredient search completed"
    );
    Ok(page)
}

/// Applies a partial update to an ingredient.
///
/// # Errors
/// Returns [`Error::NotFound`] if the ingredient does not exist, or the same
/// validation and constraint errors as [`create_ingredient`].
#[instrument(skip(db, changes))]
pub async fn update_ingredient(
    db: &DatabaseConnection,
    id: &str,
    changes: IngredientChanges,
) -> Result<ingredient::Model> {
    let current = get_ingredient(db, id).await?;
    let values = changes.merged_over(&current)?;
    let updated = apply(current, values).update(db).await?;
    info!("Updated ingredient");
    Ok(updated)
}

/// Deletes an ingredient that no formula references.
///
/// # Errors
/// Returns [`Error::NotFound`] if absent, or [`Error::Conflict`] reporting how
/// many formulas still use it.
#[instrument(skip(db))]
pub async fn delete_ingredient(db: &DatabaseConnection, id: &str) -> Result<()> {
    let txn = db.begin().await?;

    get_ingredient(&txn, id).await?;
    let references = formula::count_referencing(&txn, id).await?;
    if references > 0 {
        return Err(Error::Conflict {
            message: format!("Cannot delete ingredient: it is used in {references} formula(s)"),
        });
    }

    Ingredient::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted ingredient");
    Ok(())
}

/// Creates several ingredients with one multi-row insert in one transaction.
///
/// # Errors
/// Returns [`Error::Validation`] if the list is empty or any item is invalid
/// (nothing is written), or [`Error::Constraint`] on a duplicate name.
#[instrument(skip(db, items), fields(count = items.len()))]
pub async fn create_ingredients(
    db: &DatabaseConnection,
    items: Vec<NewIngredient>,
) -> Result<Vec<ingredient::Model>> {
    if items.is_empty() {
        return Err(Error::validation("At least one ingredient is required"));
    }

    let validated = items
        .into_iter()
        .map(NewIngredient::validated)
        .collect::<Result<Vec<_>>>()?;
    let ids: Vec<String> = validated
        .iter()
        .map(|_| Uuid::new_v4().to_string())
        .collect();
    let models: Vec<ingredient::ActiveModel> = validated
        .into_iter()
        .zip(ids.iter().cloned())
        .map(|(item, id)| item.into_active_model(id))
        .collect();

    let txn = db.begin().await?;
    Ingredient::insert_many(models)
        .exec_without_returning(&txn)
        .await?;
    let mut created = get_ingredients_by_ids(&txn, &ids).await?;
    txn.commit().await?;
    created.sort_by_key(|model| ids.iter().position(|id| *id == model.id));

    info!("Created ingredients in bulk");
    Ok(created)
}

/// Updates several ingredients in one transaction.
///
/// # Errors
/// Returns [`Error::NotFound`] listing every unknown id (nothing is written),
/// or the same validation and constraint errors as [`update_ingredient`].
#[instrument(skip(db, items), fields(count = items.len()))]
pub async fn update_ingredients(
    db: &DatabaseConnection,
    items: Vec<(String, IngredientChanges)>,
) -> Result<Vec<ingredient::Model>> {
    if items.is_empty() {
        return Err(Error::validation("At least one ingredient is required"));
    }

    let txn = db.begin().await?;

    let ids: Vec<String> = items.iter().map(|(id, _)| id.clone()).collect();
    let existing = get_ingredients_by_ids(&txn, &ids).await?;
    ensure_all_found("Ingredients", &ids, existing.iter().map(|i| i.id.as_str()))?;

    let mut updated = Vec::with_capacity(items.len());
    for (id, changes) in items {
        let current = get_ingredient(&txn, &id).await?;
        let values = changes.merged_over(&current)?;
        updated.push(apply(current, values).update(&txn).await?);
    }

    txn.commit().await?;
    info!("Updated ingredients in bulk");
    Ok(updated)
}

/// Deletes several ingredients with one statement in one transaction.
///
/// # Errors
/// Returns [`Error::NotFound`] listing unknown ids, or [`Error::Conflict`]
/// listing ids still referenced by formulas. Nothing is deleted on error.
#[instrument(skip(db, ids), fields(count = ids.len()))]
pub async fn delete_ingredients(db: &DatabaseConnection, ids: Vec<String>) -> Result<u64> {
    if ids.is_empty() {
        return Err(Error::validation("At least one ingredient id is required"));
    }

    let txn = db.begin().await?;

    let existing = get_ingredients_by_ids(&txn, &ids).await?;
    ensure_all_found("Ingredients", &ids, existing.iter().map(|i| i.id.as_str()))?;

    let mut referenced = Vec::new();
    for id in &ids {
        if formula::count_referencing(&txn, id).await? > 0 {
            referenced.push(id.as_str());
        }
    }
    if !referenced.is_empty() {
        return Err(Error::Conflict {
            message: format!(
                "Cannot delete ingredients used in formulas: {}",
                referenced.join(", ")
            ),
        });
    }

    let result = Ingredient::delete_many()
        .filter(ingredient::Column::Id.is_in(ids.iter().cloned()))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    info!(deleted = result.rows_affected, "Deleted ingredients in bulk");
    Ok(result.rows_affected)
}

/// Fails with [`Error::NotFound`] naming every id of `requested` missing from
/// `found`, each once and in sorted order.
pub(crate) fn ensure_all_found<'a>(
    entity: &'static str,
    requested: &[String],
    found: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let found: HashSet<&str> = found.collect();
    let missing: BTreeSet<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|id| !found.contains(id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        let ids: Vec<&str> = missing.into_iter().collect();
        Err(Error::not_found(entity, ids.join(", ")))
    }
}
