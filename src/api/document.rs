//! JSON:API documents.
//!
//! Responses are `{"data", "included"?, "meta"?}` with resource objects
//! `{"id", "type", "attributes", "relationships"?}`. Requests carry a single
//! resource object (or a list for bulk endpoints) under `data`.

use crate::{
    core::pagination::Pagination,
    entities::{
        formula::{self, IngredientShare},
        ingredient, invoice,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource type names.
pub const INGREDIENT: &str = "ingredient";
/// Formula resource type.
pub const FORMULA: &str = "formula";
/// Invoice resource type.
pub const INVOICE: &str = "invoice";

/// Top-level response document.
#[derive(Debug, Serialize)]
pub struct Document<D> {
    /// Primary data
    pub data: D,
    /// Related ingredients, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Resource<IngredientAttributes>>>,
    /// Counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<D> Document<D> {
    /// A document with only primary data.
    pub const fn new(data: D) -> Self {
        Self {
            data,
            included: None,
            meta: None,
        }
    }

    /// Attaches meta.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Document meta; only the populated counters are serialized.
#[derive(Debug, Default, Serialize)]
pub struct Meta {
    /// Matches across every page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Pages needed for `total_count`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u64>,
    /// Items per page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    /// 1-based page returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u64>,
    /// Term the search ran with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    /// Rows removed by a bulk delete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<u64>,
}

impl Meta {
    /// Pagination counters for a listing.
    #[must_use]
    pub fn page(total_count: u64, pagination: Pagination) -> Self {
        Self {
            total_count: Some(total_count),
            page_count: Some(pagination.page_count(total_count)),
            page_size: Some(pagination.size()),
            current_page: Some(pagination.page()),
            ..Self::default()
        }
    }

    /// Only a total.
    #[must_use]
    pub fn total(total_count: u64) -> Self {
        Self {
            total_count: Some(total_count),
            ..Self::default()
        }
    }

    /// Only a deleted count.
    #[must_use]
    pub fn deleted(deleted_count: u64) -> Self {
        Self {
            deleted_count: Some(deleted_count),
            ..Self::default()
        }
    }
}

/// A resource object.
#[derive(Debug, Serialize)]
pub struct Resource<A, R = ShareRef> {
    /// Resource id
    pub id: String,
    /// Resource type
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Resource fields
    pub attributes: A,
    /// Linked ingredients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships<R>>,
}

/// Relationships of formulas and invoices.
#[derive(Debug, Serialize)]
pub struct Relationships<R> {
    /// Linked ingredients
    pub ingredients: ToMany<R>,
}

/// A to-many relationship.
#[derive(Debug, Serialize)]
pub struct ToMany<R> {
    /// Linkage
    pub data: Vec<R>,
}

/// An ingredient linked from a formula, with its share.
#[derive(Debug, Serialize)]
pub struct ShareRef {
    #[serde(rename = "type")]
    kind: &'static str,
    id: String,
    meta: ShareMeta,
}

/// Share carried on a formula-to-ingredient link.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareMeta {
    /// Share of the total mass, in percent
    pub percentage: f64,
}

/// Ingredient fields.
#[derive(Debug, Serialize)]
pub struct IngredientAttributes {
    name: String,
    unit: String,
    cost_per_unit: f64,
    density: Option<f64>,
    created_at: DateTime<Utc>,
}

/// Formula fields.
#[derive(Debug, Serialize)]
pub struct FormulaAttributes {
    name: String,
    description: Option<String>,
    mass: f64,
    created_at: DateTime<Utc>,
}

/// Invoice fields.
#[derive(Debug, Serialize)]
pub struct InvoiceAttributes {
    date: NaiveDate,
    supplier: String,
    pdf_path: String,
    created_at: DateTime<Utc>,
}

impl From<ingredient::Model> for Resource<IngredientAttributes> {
    fn from(model: ingredient::Model) -> Self {
        Self {
            id: model.id,
            kind: INGREDIENT,
            attributes: IngredientAttributes {
                name: model.name,
                unit: model.unit,
                cost_per_unit: model.cost_per_unit,
                density: model.density,
                created_at: model.created_at,
            },
            relationships: None,
        }
    }
}

impl TryFrom<formula::Model> for Resource<FormulaAttributes> {
    type Error = Error;

    fn try_from(model: formula::Model) -> Result<Self> {
        let data = model
            .composition()?
            .into_iter()
            .map(|share| ShareRef {
                kind: INGREDIENT,
                id: share.ingredient_id,
                meta: ShareMeta {
                    percentage: share.percentage,
                },
            })
            .collect();

        Ok(Self {
            id: model.id,
            kind: FORMULA,
            attributes: FormulaAttributes {
                name: model.name,
                description: model.description,
                mass: model.mass,
                created_at: model.created_at,
            },
            relationships: Some(Relationships {
                ingredients: ToMany { data },
            }),
        })
    }
}

impl From<invoice::Model> for Resource<InvoiceAttributes, Value> {
    fn from(model: invoice::Model) -> Self {
        let data = match model.ingredients {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        Self {
            id: model.id,
            kind: INVOICE,
            attributes: InvoiceAttributes {
                date: model.date,
                supplier: model.supplier,
                pdf_path: model.pdf_path,
                created_at: model.created_at,
            },
            relationships: Some(Relationships {
                ingredients: ToMany { data },
            }),
        }
    }
}

/// Converts a list of formulas, failing on the first corrupt composition.
pub fn formula_resources(
    models: Vec<formula::Model>,
) -> Result<Vec<Resource<FormulaAttributes>>> {
    models.into_iter().map(Resource::try_from).collect()
}

/// Converts a list of ingredients.
#[must_use]
pub fn ingredient_resources(models: Vec<ingredient::Model>) -> Vec<Resource<IngredientAttributes>> {
    models.into_iter().map(Resource::from).collect()
}

/// Top-level request document.
#[derive(Debug, Deserialize)]
pub struct RequestDocument<T> {
    /// Primary data
    pub data: T,
}

/// An incoming resource object.
#[derive(Debug, Deserialize)]
pub struct ResourceObject<A> {
    /// Declared resource type
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource id, required by bulk updates
    pub id: Option<String>,
    /// Resource fields
    pub attributes: Option<A>,
    /// Linked ingredients
    pub relationships: Option<IncomingRelationships>,
}

/// Incoming relationships; linkage items are decoded per resource type.
#[derive(Debug, Deserialize)]
pub struct IncomingRelationships {
    /// Linked ingredients
    pub ingredients: IncomingToMany,
}

/// Incoming to-many linkage.
#[derive(Debug, Deserialize)]
pub struct IncomingToMany {
    /// Linkage items
    pub data: Vec<Value>,
}

/// `{"type", "id"}`, as sent to bulk deletes.
#[derive(Debug, Deserialize)]
pub struct ResourceIdentifier {
    /// Declared resource type
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource id
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct IncomingShare {
    id: String,
    meta: ShareMeta,
}

/// Fails unless `kind` names the expected resource type.
///
/// # Errors
/// Returns [`Error::Validation`] on a mismatch.
pub fn expect_kind(kind: &str, expected: &str) -> Result<()> {
    if kind == expected {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Invalid resource type '{kind}', expected '{expected}'"
        )))
    }
}

impl<A> ResourceObject<A> {
    /// Checks the type and returns the id, which must be present.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] on a type mismatch or a missing id.
    pub fn require_id(&self, expected: &str) -> Result<String> {
        expect_kind(&self.kind, expected)?;
        self.id
            .clone()
            .ok_or_else(|| Error::validation(format!("Every {expected} must carry an id")))
    }

    /// Attributes, which must be present.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the object has no attributes.
    pub fn take_attributes(&mut self) -> Result<A> {
        self.attributes
            .take()
            .ok_or_else(|| Error::validation("Resource attributes are required"))
    }

    /// Formula composition from the ingredient linkage, if present.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if a linkage item lacks an id or a percentage.
    pub fn composition(&self) -> Result<Option<Vec<IngredientShare>>> {
        let Some(relationships) = &self.relationships else {
            return Ok(None);
        };
        relationships
            .ingredients
            .data
            .iter()
            .map(|item| {
                serde_json::from_value::<IncomingShare>(item.clone())
                    .map(|share| IngredientShare {
                        ingredient_id: share.id,
                        percentage: share.meta.percentage,
                    })
                    .map_err(|e| Error::validation(format!("Invalid ingredient relationship: {e}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Invoice line items from the ingredient linkage, if present.
    #[must_use]
    pub fn line_items(&self) -> Option<Vec<Value>> {
        self.relationships
            .as_ref()
            .map(|r| r.ingredients.data.clone())
    }
}

/// JSON:API error document.
#[derive(Debug, Serialize)]
pub struct ErrorDocument {
    /// Errors, one per failure
    pub errors: Vec<ErrorObject>,
}

/// One error.
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    /// HTTP status as a string
    pub status: String,
    /// Status reason phrase
    pub title: String,
    /// Client-safe message
    pub detail: String,
    /// Correlates the response with the log line
    pub error_id: String,
}
