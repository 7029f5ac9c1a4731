//! Core business logic - framework-agnostic ingredient, formula and invoice operations.

/// Formula CRUD, composition validation and bulk operations
pub mod formula;
/// Ingredient CRUD, substring search and bulk operations
pub mod ingredient;
/// Invoice metadata and PDF storage
pub mod invoice;
/// Page/size validation and paged results
pub mod pagination;
