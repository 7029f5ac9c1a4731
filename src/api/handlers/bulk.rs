//! Bulk endpoints. Each request runs in a single transaction: either every
//! item is applied or none is.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use super::formulas::{FormulaInput, formula_changes, new_formula};
use crate::api::{
    ApiError, AppState,
    document::{
        Document, FORMULA, FormulaAttributes, INGREDIENT, IngredientAttributes, Meta,
        RequestDocument, Resource, ResourceIdentifier, ResourceObject, expect_kind,
        formula_resources, ingredient_resources,
    },
    extract::ApiJson,
};
use crate::core::{
    formula,
    ingredient::{self, IngredientChanges, NewIngredient},
};
use crate::errors::Result;

type IngredientList = Document<Vec<Resource<IngredientAttributes>>>;
type FormulaList = Document<Vec<Resource<FormulaAttributes>>>;

fn identifiers(items: Vec<ResourceIdentifier>, expected: &str) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| expect_kind(&item.kind, expected).map(|()| item.id))
        .collect()
}

fn counted<T>(items: Vec<T>) -> Document<Vec<T>> {
    let total = items.len() as u64;
    Document::new(items).with_meta(Meta::total(total))
}

/// `POST /bulk/ingredients`
#[instrument(skip(state, body))]
pub async fn create_ingredients(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<Vec<ResourceObject<NewIngredient>>>>,
) -> Result<(StatusCode, Json<IngredientList>), ApiError> {
    let items = body
        .data
        .into_iter()
        .map(|mut object| {
            expect_kind(&object.kind, INGREDIENT)?;
            object.take_attributes()
        })
        .collect::<Result<Vec<_>>>()?;

    let created = ingredient::create_ingredients(&state.db, items).await?;
    Ok((StatusCode::CREATED, Json(counted(ingredient_resources(created)))))
}

/// `PATCH /bulk/ingredients`
#[instrument(skip(state, body))]
pub async fn update_ingredients(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<Vec<ResourceObject<IngredientChanges>>>>,
) -> Result<Json<IngredientList>, ApiError> {
    let items = body
        .data
        .into_iter()
        .map(|object| {
            let id = object.require_id(INGREDIENT)?;
            Ok((id, object.attributes.unwrap_or_default()))
        })
        .collect::<Result<Vec<_>>>()?;

    let updated = ingredient::update_ingredients(&state.db, items).await?;
    Ok(Json(counted(ingredient_resources(updated))))
}

/// `DELETE /bulk/ingredients`
#[instrument(skip(state, body))]
pub async fn delete_ingredients(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<Vec<ResourceIdentifier>>>,
) -> Result<Json<Document<()>>, ApiError> {
    let ids = identifiers(body.data, INGREDIENT)?;
    let deleted = ingredient::delete_ingredients(&state.db, ids).await?;
    Ok(Json(Document::new(()).with_meta(Meta::deleted(deleted))))
}

/// `POST /bulk/formulas`
#[instrument(skip(state, body))]
pub async fn create_formulas(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<Vec<ResourceObject<FormulaInput>>>>,
) -> Result<(StatusCode, Json<FormulaList>), ApiError> {
    let items = body
        .data
        .into_iter()
        .map(new_formula)
        .collect::<Result<Vec<_>>>()?;

    let created = formula::create_formulas(&state.db, items).await?;
    Ok((StatusCode::CREATED, Json(counted(formula_resources(created)?))))
}

/// `PATCH /bulk/formulas`
#[instrument(skip(state, body))]
pub async fn update_formulas(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<Vec<ResourceObject<FormulaInput>>>>,
) -> Result<Json<FormulaList>, ApiError> {
    let items = body
        .data
        .into_iter()
        .map(|object| {
            let id = object.require_id(FORMULA)?;
            Ok((id, formula_changes(object)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let updated = formula::update_formulas(&state.db, items).await?;
    Ok(Json(counted(formula_resources(updated)?)))
}

/// `DELETE /bulk/formulas`
#[instrument(skip(state, body))]
pub async fn delete_formulas(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<Vec<ResourceIdentifier>>>,
) -> Result<Json<Document<()>>, ApiError> {
    let ids = identifiers(body.data, FORMULA)?;
    let deleted = formula::delete_formulas(&state.db, ids).await?;
    Ok(Json(Document::new(()).with_meta(Meta::deleted(deleted))))
}
