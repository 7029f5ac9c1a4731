//! Ranked formula search.
//!
//! Non-fuzzy searches match formulas whose search vector contains every query
//! lexeme and score them by cover-density rank. Fuzzy searches also admit
//! formulas whose name or description is trigram-similar to the query or
//! within an edit distance of it, scoring by the best of rank and the two
//! similarities.
//!
//! Candidate rows are narrowed in SQL where possible (a `LIKE` on the stored
//! vector for every lexeme), then matched and scored here. The total count is
//! computed by a separate pass over the lightweight columns with the same
//! predicate, so it is exact regardless of the requested page.

use super::{
    distance,
    text::{SearchVector, TextQuery},
    trigram,
};
use crate::{
    core::{ingredient::get_ingredients_by_ids, pagination::Pagination},
    entities::{Formula, formula, ingredient},
    errors::{Error, Result},
};
use sea_orm::{QuerySelect, Select, prelude::*};
use std::{cmp::Ordering, collections::BTreeSet};
use tracing::{debug, info, instrument};

/// Thresholds for fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyOptions {
    /// Trigram similarity a name or description must exceed
    pub similarity_threshold: f64,
    /// Largest edit distance that still matches
    pub max_distance: usize,
}

impl FuzzyOptions {
    /// Validates that the threshold lies in `[0, 1]`.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] otherwise.
    pub fn new(similarity_threshold: f64, max_distance: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(Error::validation(
                "Similarity threshold must be between 0 and 1",
            ));
        }
        Ok(Self {
            similarity_threshold,
            max_distance,
        })
    }
}

/// Longest accepted query text, in characters.
pub const MAX_QUERY_LEN: usize = 500;

/// A validated formula search request.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaQuery {
    text: String,
    /// Requested page
    pub pagination: Pagination,
    /// Fuzzy thresholds, when fuzzy matching is on
    pub fuzzy: Option<FuzzyOptions>,
    /// Whether to load the ingredients referenced by the page
    pub include_ingredients: bool,
}

impl FormulaQuery {
    /// Builds a non-fuzzy query without inclusion.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if `text` is blank or longer than
    /// [`MAX_QUERY_LEN`] characters.
    pub fn new(text: &str, pagination: Pagination) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation("Search query cannot be empty"));
        }
        if text.chars().count() > MAX_QUERY_LEN {
            return Err(Error::validation(format!(
                "Search query cannot exceed {MAX_QUERY_LEN} characters"
            )));
        }
        Ok(Self {
            text: text.to_string(),
            pagination,
            fuzzy: None,
            include_ingredients: false,
        })
    }

    /// Turns fuzzy matching on.
    #[must_use]
    pub const fn with_fuzzy(mut self, fuzzy: FuzzyOptions) -> Self {
        self.fuzzy = Some(fuzzy);
        self
    }

    /// Loads referenced ingredients alongside the page.
    #[must_use]
    pub const fn including_ingredients(mut self) -> Self {
        self.include_ingredients = true;
        self
    }

    /// Trimmed query text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A matched formula and its relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFormula {
    /// The formula
    pub formula: formula::Model,
    /// Relevance, higher first
    pub score: f64,
}

/// One page of ranked results.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Ranked formulas on this page
    pub hits: Vec<ScoredFormula>,
    /// Matches across every page
    pub total_count: u64,
    /// The request that produced this page
    pub pagination: Pagination,
    /// Ingredients referenced by the page, when requested
    pub included: Vec<ingredient::Model>,
}

impl SearchResults {
    /// Number of pages for the total count.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        self.pagination.page_count(self.total_count)
    }
}

/// The match predicate and scoring for one query.
struct Matcher {
    raw: String,
    text: TextQuery,
    fuzzy: Option<FuzzyOptions>,
}

impl Matcher {
    fn new(query: &FormulaQuery) -> Self {
        Self {
            raw: query.text.clone(),
            text: TextQuery::plain(&query.text),
            fuzzy: query.fuzzy,
        }
    }

    /// Nothing can match a non-fuzzy query without lexemes.
    fn matches_nothing(&self) -> bool {
        self.fuzzy.is_none() && self.text.is_empty()
    }

    /// Rows worth fetching: in non-fuzzy mode the stored vector must mention
    /// every lexeme. `LIKE` may over-match; [`Matcher::score`] decides.
    fn candidates(&self) -> Select<Formula> {
        let mut select = Formula::find();
        if self.fuzzy.is_none() {
            for lexeme in self.text.lexemes() {
                let needle = format!("'{}':", lexeme.replace('\'', "''"));
                select = select.filter(formula::Column::SearchVector.contains(needle));
            }
        }
        select
    }

    /// Score of a row, or `None` if it does not match.
    fn score(&self, name: &str, description: Option<&str>, stored_vector: &str) -> Result<Option<f64>> {
        let vector: SearchVector = stored_vector.parse()?;
        let text_match = self.text.matches(&vector);
        let rank = self.text.rank(&vector);

        let Some(fuzzy) = self.fuzzy else {
            return Ok(text_match.then_some(rank));
        };

        let name_similarity = trigram::similarity(name, &self.raw);
        let description_similarity = description.map(|d| trigram::similarity(d, &self.raw));
        let close = |value: &str| distance::within(value, &self.raw, fuzzy.max_distance);

        let included = text_match
            || name_similarity > fuzzy.similarity_threshold
            || description_similarity.is_some_and(|s| s > fuzzy.similarity_threshold)
            || close(name)
            || description.is_some_and(close);

        Ok(included.then(|| {
            rank.max(name_similarity)
                .max(description_similarity.unwrap_or(0.0))
        }))
    }
}

/// Higher score first, then name, then id.
fn by_relevance(a: &ScoredFormula, b: &ScoredFormula) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.formula.name.cmp(&b.formula.name))
        .then_with(|| a.formula.id.cmp(&b.formula.id))
}

/// Ranked, paginated formula search.
///
/// # Errors
/// Returns a classified database error, or [`Error::DataFormat`] if a stored
/// search vector is corrupt. No partial results are returned.
#[instrument(skip(db, query), fields(search_term = %query.text(), page = query.pagination.page(), page_size = query.pagination.size(), fuzzy = query.fuzzy.is_some()))]
pub async fn search_formulas(db: &DatabaseConnection, query: &FormulaQuery) -> Result<SearchResults> {
    let matcher = Matcher::new(query);
    let pagination = query.pagination;

    if matcher.matches_nothing() {
        debug!("Query has no searchable terms");
        return Ok(SearchResults {
            hits: Vec::new(),
            total_count: 0,
            pagination,
            included: Vec::new(),
        });
    }

    let hits = ranked_page(db, &matcher, pagination).await?;
    let total_count = count_matches(db, &matcher).await?;

    let included = if query.include_ingredients {
        let ids: BTreeSet<&str> = hits
            .iter()
            .flat_map(|hit| hit.formula.ingredient_ids())
            .collect();
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        get_ingredients_by_ids(db, &ids).await?
    } else {
        Vec::new()
    };

    info!(
        count = hits.len(),
        total_count,
        included = included.len(),
        "Formula search completed"
    );
    Ok(SearchResults {
        hits,
        total_count,
        pagination,
        included,
    })
}

async fn ranked_page(
    db: &DatabaseConnection,
    matcher: &Matcher,
    pagination: Pagination,
) -> Result<Vec<ScoredFormula>> {
    let mut scored = Vec::new();
    for formula in matcher.candidates().all(db).await? {
        if let Some(score) =
            matcher.score(&formula.name, formula.description.as_deref(), &formula.search_vector)?
        {
            scored.push(ScoredFormula { formula, score });
        }
    }
    scored.sort_by(by_relevance);

    let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let size = usize::try_from(pagination.size()).unwrap_or(usize::MAX);
    Ok(scored.into_iter().skip(offset).take(size).collect())
}

async fn count_matches(db: &DatabaseConnection, matcher: &Matcher) -> Result<u64> {
    let rows: Vec<(String, Option<String>, String)> = matcher
        .candidates()
        .select_only()
        .column(formula::Column::Name)
        .column(formula::Column::Description)
        .column(formula::Column::SearchVector)
        .into_tuple()
        .all(db)
        .await?;

    let mut total = 0;
    for (name, description, vector) in &rows {
        if matcher.score(name, description.as_deref(), vector)?.is_some() {
            total += 1;
        }
    }
    Ok(total)
}
