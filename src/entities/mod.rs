//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod formula;
pub mod ingredient;
pub mod invoice;

// Re-export specific types to avoid conflicts
pub use formula::{Column as FormulaColumn, Entity as Formula, Model as FormulaModel};
pub use ingredient::{Column as IngredientColumn, Entity as Ingredient, Model as IngredientModel};
pub use invoice::{Column as InvoiceColumn, Entity as Invoice, Model as InvoiceModel};
