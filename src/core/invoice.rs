//! Invoice business logic - metadata rows paired with stored PDF files.
//!
//! Creating an invoice writes the PDF first and then inserts the row; when the
//! insert fails the file is removed again. Deleting removes the row first and
//! only then the file, so a failed file removal never leaves a row pointing at
//! nothing.

use crate::{
    core::pagination::{Page, Pagination},
    entities::{Invoice, invoice},
    errors::{Error, Result},
    storage::InvoiceFiles,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use sea_orm::{PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*};
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Fields for a new invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    /// Invoice date
    pub date: NaiveDate,
    /// Supplier name
    pub supplier: String,
    /// Line items
    pub ingredients: Vec<Json>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceChanges {
    /// New date
    pub date: Option<NaiveDate>,
    /// New supplier
    pub supplier: Option<String>,
    /// New line items
    pub ingredients: Option<Vec<Json>>,
}

/// Parses `YYYY-MM-DD`, or an ISO datetime truncated to its date.
///
/// # Errors
/// Returns [`Error::Validation`] for anything else.
pub fn parse_invoice_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
        .map_err(|_| Error::validation(format!("Invalid date format: {raw}")))
}

/// Parses the line items field, which must be a JSON array.
///
/// # Errors
/// Returns [`Error::Json`] for malformed JSON or [`Error::Validation`] when the
/// value is not an array.
pub fn parse_line_items(raw: &str) -> Result<Vec<Json>> {
    match serde_json::from_str::<Json>(raw)? {
        Json::Array(items) => Ok(items),
        _ => Err(Error::validation("Invoice ingredients must be a JSON array")),
    }
}

fn validated_supplier(supplier: &str) -> Result<String> {
    let supplier = supplier.trim();
    if supplier.is_empty() {
        return Err(Error::validation("Supplier cannot be empty"));
    }
    Ok(supplier.to_string())
}

/// Stores the PDF and records the invoice.
///
/// # Errors
/// Returns [`Error::Validation`] for an empty supplier or file, a classified
/// I/O error if the file cannot be written, or the insert error (after the
/// written file has been removed).
#[instrument(skip(db, files, new, pdf), fields(supplier = %new.supplier, size = pdf.len()))]
pub async fn create_invoice(
    db: &DatabaseConnection,
    files: &InvoiceFiles,
    new: NewInvoice,
    pdf: &[u8],
) -> Result<invoice::Model> {
    let supplier = validated_supplier(&new.supplier)?;
    if pdf.is_empty() {
        return Err(Error::validation("Invoice file cannot be empty"));
    }

    let pdf_path = InvoiceFiles::new_pdf_path();
    files.write(&pdf_path, pdf).await?;

    let row = invoice::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        date: Set(new.date),
        supplier: Set(supplier),
        pdf_path: Set(pdf_path.clone()),
        ingredients: Set(Json::Array(new.ingredients)),
        created_at: Set(chrono::Utc::now()),
    };

    match row.insert(db).await {
        Ok(invoice) => {
            info!(invoice_id = %invoice.id, pdf_path = %pdf_path, "Created invoice");
            Ok(invoice)
        }
        Err(e) => {
            error!(pdf_path = %pdf_path, error = %e, "Invoice insert failed, removing stored file");
            files.remove_quietly(&pdf_path).await;
            Err(e.into())
        }
    }
}

/// Retrieves an invoice by id.
///
/// # Errors
/// Returns [`Error::NotFound`] if no invoice has this id.
pub async fn get_invoice(db: &DatabaseConnection, id: &str) -> Result<invoice::Model> {
    Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Invoice", id))
}

/// Lists invoices, newest date first.
pub async fn list_invoices(
    db: &DatabaseConnection,
    pagination: Pagination,
) -> Result<Page<invoice::Model>> {
    let total_count = Invoice::find().count(db).await?;
    let items = Invoice::find()
        .order_by_desc(invoice::Column::Date)
        .order_by_desc(invoice::Column::CreatedAt)
        .offset(pagination.offset())
        .limit(pagination.size())
        .all(db)
        .await?;

    Ok(Page {
        items,
        total_count,
        pagination,
    })
}

/// Applies a partial update to an invoice's metadata.
///
/// # Errors
/// Returns [`Error::NotFound`] if absent or [`Error::Validation`] for an empty supplier.
#[instrument(skip(db, changes))]
pub async fn update_invoice(
    db: &DatabaseConnection,
    id: &str,
    changes: InvoiceChanges,
) -> Result<invoice::Model> {
    let current = get_invoice(db, id).await?;
    let mut active: invoice::ActiveModel = current.into();

    if let Some(date) = changes.date {
        active.date = Set(date);
    }
    if let Some(supplier) = changes.supplier {
        active.supplier = Set(validated_supplier(&supplier)?);
    }
    if let Some(items) = changes.ingredients {
        active.ingredients = Set(Json::Array(items));
    }

    let updated = active.update(db).await?;
    info!("Updated invoice");
    Ok(updated)
}

/// Deletes the invoice row, then its file. A failed file removal is logged.
///
/// # Errors
/// Returns [`Error::NotFound`] if the invoice does not exist.
#[instrument(skip(db, files))]
pub async fn delete_invoice(db: &DatabaseConnection, files: &InvoiceFiles, id: &str) -> Result<()> {
    let invoice = get_invoice(db, id).await?;
    Invoice::delete_by_id(id).exec(db).await?;
    files.remove_quietly(&invoice.pdf_path).await;
    info!(pdf_path = %invoice.pdf_path, "Deleted invoice");
    Ok(())
}

/// Reads an invoice's stored PDF.
///
/// # Errors
/// Returns [`Error::NotFound`] for an unknown invoice, or
/// [`Error::FileNotFound`] / [`Error::PermissionDenied`] for the file.
#[instrument(skip(db, files))]
pub async fn read_invoice_pdf(
    db: &DatabaseConnection,
    files: &InvoiceFiles,
    id: &str,
) -> Result<Vec<u8>> {
    let invoice = get_invoice(db, id).await?;
    files.read(&invoice.pdf_path).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{ConnectionTrait, Statement};
    use serde_json::json;

    const PDF: &[u8] = b"%PDF-1.4 test invoice";

    fn new_invoice(date: &str) -> NewInvoice {
        NewInvoice {
            date: parse_invoice_date(date).unwrap(),
            supplier: "Herb Co".to_string(),
            ingredients: vec![json!({"name": "Chamomile", "quantity": 5})],
        }
    }

    fn stored_files(files: &InvoiceFiles) -> usize {
        std::fs::read_dir(files.root().join("invoices"))
            .map(Iterator::count)
            .unwrap_or(0)
    }

    #[test]
    fn test_parse_invoice_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_invoice_date("2024-03-15").unwrap(), expected);
        assert_eq!(parse_invoice_date("2024-03-15T10:30:00").unwrap(), expected);
        assert_eq!(parse_invoice_date("2024-03-15T10:30:00Z").unwrap(), expected);
        assert!(matches!(
            parse_invoice_date("15/03/2024"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_parse_line_items() {
        assert_eq!(parse_line_items(r#"[{"name":"Rose"}]"#).unwrap().len(), 1);
        assert!(matches!(parse_line_items("{not json"), Err(Error::Json(_))));
        assert!(matches!(
            parse_line_items(r#"{"name":"Rose"}"#),
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_read_delete_invoice() -> Result<()> {
        let (db, files, _dir) = setup_with_files().await?;

        let invoice = create_invoice(&db, &files, new_invoice("2024-01-10"), PDF).await?;
        assert!(invoice.pdf_path.starts_with("invoices/"));
        assert_eq!(read_invoice_pdf(&db, &files, &invoice.id).await?, PDF);

        delete_invoice(&db, &files, &invoice.id).await?;
        assert_eq!(stored_files(&files), 0);
        assert!(matches!(
            get_invoice(&db, &invoice.id).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_insert_removes_file() -> Result<()> {
        let (db, files, _dir) = setup_with_files().await?;
        let backend = db.get_database_backend();
        db.execute(Statement::from_string(backend, "DROP TABLE invoices"))
            .await?;

        let result = create_invoice(&db, &files, new_invoice("2024-01-10"), PDF).await;
        assert!(result.is_err());
        assert_eq!(stored_files(&files), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_invoice_validation() -> Result<()> {
        let (db, files, _dir) = setup_with_files().await?;

        let mut blank = new_invoice("2024-01-10");
        blank.supplier = "  ".to_string();
        assert!(create_invoice(&db, &files, blank, PDF).await.is_err());
        assert!(create_invoice(&db, &files, new_invoice("2024-01-10"), b"").await.is_err());
        assert_eq!(stored_files(&files), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_invoices_newest_first() -> Result<()> {
        let (db, files, _dir) = setup_with_files().await?;
        for date in ["2024-01-10", "2024-03-01", "2023-12-24"] {
            create_invoice(&db, &files, new_invoice(date), PDF).await?;
        }

        let page = list_invoices(&db, Pagination::new(1, 2)?).await?;
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].date.to_string(), "2024-03-01");
        assert_eq!(page.items[1].date.to_string(), "2024-01-10");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_invoice() -> Result<()> {
        let (db, files, _dir) = setup_with_files().await?;
        let invoice = create_invoice(&db, &files, new_invoice("2024-01-10"), PDF).await?;

        let updated = update_invoice(
            &db,
            &invoice.id,
            InvoiceChanges {
                supplier: Some("Botanicals Ltd".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.supplier, "Botanicals Ltd");
        assert_eq!(updated.date, invoice.date);
        assert_eq!(updated.pdf_path, invoice.pdf_path);

        let result = update_invoice(&db, "ghost", InvoiceChanges::default()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_pdf_is_file_not_found() -> Result<()> {
        let (db, files, _dir) = setup_with_files().await?;
        let invoice = create_invoice(&db, &files, new_invoice("2024-01-10"), PDF).await?;
        files.remove(&invoice.pdf_path).await?;

        let err = read_invoice_pdf(&db, &files, &invoice.id).await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
        assert_eq!(err.status_code(), 404);
        Ok(())
    }
}
