//! Ingredient CRUD handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use crate::api::{
    ApiError, AppState,
    document::{
        Document, INGREDIENT, IngredientAttributes, Meta, RequestDocument, Resource,
        ResourceObject, expect_kind, ingredient_resources,
    },
    extract::{ApiJson, ApiPath, ApiQuery},
};
use crate::core::{
    ingredient::{self, IngredientChanges, NewIngredient},
    pagination::Pagination,
};

type IngredientDocument = Document<Resource<IngredientAttributes>>;

/// `?page=&per_page=&name=` on the ingredient listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<u64>,
    per_page: Option<u64>,
    name: Option<String>,
}

/// `POST /ingredients`
#[instrument(skip(state, body))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestDocument<ResourceObject<NewIngredient>>>,
) -> Result<(StatusCode, Json<IngredientDocument>), ApiError> {
    let mut object = body.data;
    expect_kind(&object.kind, INGREDIENT)?;
    let created = ingredient::create_ingredient(&state.db, object.take_attributes()?).await?;
    Ok((StatusCode::CREATED, Json(Document::new(created.into()))))
}

/// `GET /ingredients`
#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Document<Vec<Resource<IngredientAttributes>>>>, ApiError> {
    let pagination = Pagination::from_query(params.page, params.per_page)?;
    let page = ingredient::list_ingredients(&state.db, pagination, params.name.as_deref()).await?;
    let meta = Meta::page(page.total_count, page.pagination);
    Ok(Json(
        Document::new(ingredient_resources(page.items)).with_meta(meta),
    ))
}

/// `GET /ingredients/:id`
#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<IngredientDocument>, ApiError> {
    let found = ingredient::get_ingredient(&state.db, &id).await?;
    Ok(Json(Document::new(found.into())))
}

/// `PATCH /ingredients/:id`
#[instrument(skip(state, body))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<RequestDocument<ResourceObject<IngredientChanges>>>,
) -> Result<Json<IngredientDocument>, ApiError> {
    let object = body.data;
    expect_kind(&object.kind, INGREDIENT)?;
    let changes = object.attributes.unwrap_or_default();
    let updated = ingredient::update_ingredient(&state.db, &id, changes).await?;
    Ok(Json(Document::new(updated.into())))
}

/// `DELETE /ingredients/:id`
#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    ingredient::delete_ingredient(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
