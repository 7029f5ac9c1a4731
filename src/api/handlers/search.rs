//! Ingredient substring search and ranked formula search handlers.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::api::{
    ApiError, AppState,
    document::{
        Document, FormulaAttributes, IngredientAttributes, Meta, Resource, formula_resources,
        ingredient_resources,
    },
    extract::ApiQuery,
};
use crate::config::settings::SearchSettings;
use crate::core::{ingredient, pagination::Pagination};
use crate::errors::{Error, Result};
use crate::search::{FormulaQuery, FuzzyOptions, search_formulas as run_formula_search};

/// `?q=|search=&page=&size=` on the ingredient search.
#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearchParams {
    q: Option<String>,
    search: Option<String>,
    page: Option<u64>,
    size: Option<u64>,
}

/// Query string of the formula search.
#[derive(Debug, Default, Deserialize)]
pub struct FormulaSearchParams {
    q: Option<String>,
    page: Option<u64>,
    size: Option<u64>,
    include: Option<String>,
    fuzzy: Option<bool>,
    similarity_threshold: Option<f64>,
    max_distance: Option<usize>,
}

impl FormulaSearchParams {
    /// Fuzzy mode is on when asked for explicitly or when any threshold is
    /// given; missing thresholds come from settings.
    fn fuzzy_options(&self, defaults: SearchSettings) -> Result<Option<FuzzyOptions>> {
        let requested = self.fuzzy.unwrap_or(false)
            || self.similarity_threshold.is_some()
            || self.max_distance.is_some();
        if !requested {
            return Ok(None);
        }
        FuzzyOptions::new(
            self.similarity_threshold
                .unwrap_or(defaults.similarity_threshold),
            self.max_distance.unwrap_or(defaults.max_distance),
        )
        .map(Some)
    }

    fn include_ingredients(&self) -> Result<bool> {
        match self.include.as_deref().map(str::trim) {
            None | Some("") => Ok(false),
            Some("ingredients") => Ok(true),
            Some(other) => Err(Error::validation(format!(
                "Invalid include parameter '{other}': only 'ingredients' is supported"
            ))),
        }
    }

    fn into_query(self, defaults: SearchSettings) -> Result<FormulaQuery> {
        let pagination = Pagination::from_query(self.page, self.size)?;
        let fuzzy = self.fuzzy_options(defaults)?;
        let include = self.include_ingredients()?;
        let text = self
            .q
            .ok_or_else(|| Error::validation("Search query parameter 'q' is required"))?;

        let mut query = FormulaQuery::new(&text, pagination)?;
        if let Some(fuzzy) = fuzzy {
            query = query.with_fuzzy(fuzzy);
        }
        if include {
            query = query.including_ingredients();
        }
        Ok(query)
    }
}

/// `GET /search/ingredients`
#[instrument(skip(state))]
pub async fn search_ingredients(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<IngredientSearchParams>,
) -> Result<Json<Document<Vec<Resource<IngredientAttributes>>>>, ApiError> {
    let pagination = Pagination::from_query(params.page, params.size)?;
    let term = params
        .q
        .or(params.search)
        .ok_or_else(|| Error::validation("Search query parameter 'q' is required"))?;

    let page = ingredient::search_ingredients(&state.db, &term, pagination).await?;
    let mut meta = Meta::page(page.total_count, page.pagination);
    meta.search_term = Some(term.trim().to_string());
    Ok(Json(
        Document::new(ingredient_resources(page.items)).with_meta(meta),
    ))
}

/// `GET /search/formulas`
#[instrument(skip(state))]
pub async fn search_formulas(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<FormulaSearchParams>,
) -> Result<Json<Document<Vec<Resource<FormulaAttributes>>>>, ApiError> {
    let query = params.into_query(state.settings.search)?;
    let results = run_formula_search(&state.db, &query).await?;

    let mut meta = Meta::page(results.total_count, results.pagination);
    meta.search_term = Some(query.text().to_string());

    let formulas = results.hits.into_iter().map(|hit| hit.formula).collect();
    let mut document = Document::new(formula_resources(formulas)?).with_meta(meta);
    if query.include_ingredients {
        document.included = Some(ingredient_resources(results.included));
    }
    Ok(Json(document))
}
