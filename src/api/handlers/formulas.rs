//! Formula CRUD handlers. Compositions travel as ingredient linkage with a
//! `percentage` in each item's meta.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use super::PageParams;
use crate::api::{
    ApiError, AppState,
    document::{
        Document, FORMULA, FormulaAttributes, Meta, RequestDocument, Resource, ResourceObject,
        expect_kind, formula_resources,
    },
    extract::{ApiJson, ApiPath, ApiQuery},
};
use crate::core::formula::{self, FormulaChanges, NewFormula};
use crate::errors::{Error, Result};

type FormulaDocument = Document<Resource<FormulaAttributes>>;
type FormulaListDocument = Document<Vec<Resource<FormulaAttributes>>>;

/// Formula attributes as sent by clients; the composition travels in
/// relationships.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormulaInput {
    name: Option<String>,
    description: Option<String>,
    mass: Option<f64>,
}

/// Builds a full formula from a create request.
pub(crate) fn new_formula(object: ResourceObject<FormulaInput>) -> Result<NewFormula> {
    expect_kind(&object.kind, FORMULA)?;
    let ingredients = object.composition()?.unwrap_or_default();
    let attributes = object.attributes.unwrap_or_default();

    Ok(NewFormula {
        name: attributes
            .name
            .ok_or_else(|| Error::validation("Formula name is required"))?,
        description: attributes.description,
        mass: attributes
            .mass
            .ok_or_else(|| Error::validation("Formula mass is required"))?,
        ingredients,
    })
}

/// Builds a partial update from a patch request.
pub(crate) fn formula_changes(object: ResourceObject<FormulaInput>) -> Result<FormulaChanges> {
    expect_kind(&object.kind, FORMULA)?;
    let ingredients = object.composition()?;
    let attributes = object.attributes.unwrap_or_default();

    Ok(FormulaChanges {
        name: attributes.name,
        description: attributes.description,
        mass: attributes.mass,
        ingredients,
    })
}

/// `POST /formulas`
#[instrument(skip(state, body))]
pub async fn create_formula(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<ResourceObject<FormulaInput>>>,
) -> Result<(StatusCode, Json<FormulaDocument>), ApiError> {
    let created = formula::create_formula(&state.db, new_formula(body.data)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(Document::new(Resource::try_from(created)?)),
    ))
}

/// `GET /formulas` - every formula, or one page when `page` or `size` is given.
#[instrument(skip(state))]
pub async fn list_formulas(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<FormulaListDocument>, ApiError> {
    if !params.is_paginated() {
        let all = formula::get_all_formulas(&state.db).await?;
        let total = all.len() as u64;
        return Ok(Json(
            Document::new(formula_resources(all)?).with_meta(Meta::total(total)),
        ));
    }

    let page = formula::list_formulas(&state.db, params.pagination()?).await?;
    let meta = Meta::page(page.total_count, page.pagination);
    Ok(Json(
        Document::new(formula_resources(page.items)?).with_meta(meta),
    ))
}

/// `GET /formulas/:id`
#[instrument(skip(state))]
pub async fn get_formula(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<FormulaDocument>, ApiError> {
    let found = formula::get_formula(&state.db, &id).await?;
    Ok(Json(Document::new(Resource::try_from(found)?)))
}

/// `PATCH /formulas/:id`
#[instrument(skip(state, body))]
pub async fn update_formula(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<RequestDocument<ResourceObject<FormulaInput>>>,
) -> Result<Json<FormulaDocument>, ApiError> {
    let updated = formula::update_formula(&state.db, &id, formula_changes(body.data)?).await?;
    Ok(Json(Document::new(Resource::try_from(updated)?)))
}

/// `DELETE /formulas/:id`
#[instrument(skip(state))]
pub async fn delete_formula(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    formula::delete_formula(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /formulas/by-ingredient/:ingredient_id`
#[instrument(skip(state))]
pub async fn formulas_by_ingredient(
    State(state): State<AppState>,
    ApiPath(ingredient_id): ApiPath<String>,
) -> Result<Json<FormulaListDocument>, ApiError> {
    let formulas = formula::get_formulas_by_ingredient(&state.db, &ingredient_id).await?;
    let total = formulas.len() as u64;
    Ok(Json(
        Document::new(formula_resources(formulas)?).with_meta(Meta::total(total)),
    ))
}
