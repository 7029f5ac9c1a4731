//! Formula search: text analysis, similarity measures and ranked retrieval.

/// Levenshtein edit distance
pub mod distance;
/// Ranked, paginated formula search
pub mod engine;
/// Lexeme vectors, text queries and cover-density rank
pub mod text;
/// Trigram similarity
pub mod trigram;

pub use engine::{FormulaQuery, FuzzyOptions, ScoredFormula, SearchResults, search_formulas};
