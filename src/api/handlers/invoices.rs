//! Invoice handlers. Uploads are multipart forms carrying the metadata
//! fields and one PDF.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::PageParams;
use crate::api::{
    ApiError, AppState,
    auth::CurrentUser,
    document::{Document, INVOICE, InvoiceAttributes, Meta, RequestDocument, Resource, ResourceObject, expect_kind},
    extract::{ApiJson, ApiPath, ApiQuery},
};
use crate::core::invoice::{self, InvoiceChanges, NewInvoice, parse_invoice_date, parse_line_items};
use crate::errors::{Error, Result};

type InvoiceResource = Resource<InvoiceAttributes, Value>;

/// Invoice attributes accepted by `PATCH /invoices/:id`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceInput {
    date: Option<String>,
    supplier: Option<String>,
}

/// Fields collected from the multipart create form.
#[derive(Debug, Default)]
struct InvoiceForm {
    date: Option<String>,
    supplier: Option<String>,
    ingredients: Option<String>,
    file: Option<Vec<u8>>,
}

fn multipart_error(e: &impl std::fmt::Display) -> Error {
    Error::validation(format!("Invalid multipart body: {e}"))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::validation(format!("Missing form field '{field}'")))
}

async fn read_form(mut multipart: Multipart) -> Result<InvoiceForm> {
    let mut form = InvoiceForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "date" => form.date = Some(field.text().await.map_err(|e| multipart_error(&e))?),
            "supplier" => {
                form.supplier = Some(field.text().await.map_err(|e| multipart_error(&e))?);
            }
            "ingredients" => {
                form.ingredients = Some(field.text().await.map_err(|e| multipart_error(&e))?);
            }
            "file" => {
                form.file = Some(field.bytes().await.map_err(|e| multipart_error(&e))?.to_vec());
            }
            _ => {}
        }
    }
    Ok(form)
}

/// `GET /invoices`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Document<Vec<InvoiceResource>>>, ApiError> {
    let page = invoice::list_invoices(&state.db, params.pagination()?).await?;
    let meta = Meta::page(page.total_count, page.pagination);
    let data = page.items.into_iter().map(Resource::from).collect();
    Ok(Json(Document::new(data).with_meta(meta)))
}

/// `POST /invoices` - multipart form with `date`, `supplier`, `ingredients`
/// (a JSON array) and `file` (the PDF).
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Document<InvoiceResource>>), ApiError> {
    let form = read_form(multipart?).await?;

    let new = NewInvoice {
        date: parse_invoice_date(&required(form.date, "date")?)?,
        supplier: required(form.supplier, "supplier")?,
        ingredients: parse_line_items(&required(form.ingredients, "ingredients")?)?,
    };
    let pdf = required(form.file, "file")?;

    let created = invoice::create_invoice(&state.db, &state.files, new, &pdf).await?;
    info!(invoice_id = %created.id, "Invoice uploaded");
    Ok((StatusCode::CREATED, Json(Document::new(created.into()))))
}

/// `GET /invoices/:id`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Document<InvoiceResource>>, ApiError> {
    let found = invoice::get_invoice(&state.db, &id).await?;
    Ok(Json(Document::new(found.into())))
}

/// `PATCH /invoices/:id`
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<RequestDocument<ResourceObject<InvoiceInput>>>,
) -> Result<Json<Document<InvoiceResource>>, ApiError> {
    let object = body.data;
    expect_kind(&object.kind, INVOICE)?;
    let ingredients = object.line_items();
    let attributes = object.attributes.unwrap_or_default();

    let changes = InvoiceChanges {
        date: attributes
            .date
            .as_deref()
            .map(parse_invoice_date)
            .transpose()?,
        supplier: attributes.supplier,
        ingredients,
    };
    let updated = invoice::update_invoice(&state.db, &id, changes).await?;
    Ok(Json(Document::new(updated.into())))
}

/// `DELETE /invoices/:id`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    invoice::delete_invoice(&state.db, &state.files, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /invoices/:id/pdf`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn download_invoice_pdf(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = invoice::read_invoice_pdf(&state.db, &state.files, &id).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}
