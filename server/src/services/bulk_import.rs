use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::images::ImagePipeline;
use super::spreadsheet::Row;
use crate::db::{ItemFields, ItemStore, NewItem};
use crate::error::{Result, RowError, WardrobeError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportReport {
    pub success: bool,
    pub uploaded_items: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RowError>,
    pub total_processed: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
}

pub struct BulkImporter {
    images: ImagePipeline,
    items: Arc<dyn ItemStore>,
}

impl BulkImporter {
    pub fn new(images: ImagePipeline, items: Arc<dyn ItemStore>) -> Self {
        Self { images, items }
    }

    /// Imports every row, collecting per-row failures. The successful rows
    /// are stored with a single batch insert.
    pub async fn import(&self, owner_id: &str, rows: Vec<Row>) -> Result<BulkImportReport> {
        let total = rows.len();
        let mut pending = Vec::new();
        let mut errors = Vec::new();

        for row in rows {
            let mut fields = ItemFields::from_values(&row);
            let title = fields.title_or_default();

            match self.process_row(&row).await {
                Ok(image_url) => {
                    if fields.purchase_date.is_none() {
                        fields.purchase_date = Some(Utc::now().format("%Y-%m-%d").to_string());
                    }
                    pending.push(NewItem::new(owner_id, fields, image_url));
                }
                Err(message) => {
                    log::warn!("Bulk import row '{}' failed: {}", title, message);
                    errors.push(RowError {
                        item: title,
                        error: message,
                    });
                }
            }
        }

        if pending.is_empty() {
            return Err(WardrobeError::BulkImportFailed(errors));
        }

        let uploaded_items = self.items.insert_many(pending).await?;
        log::info!(
            "Bulk import for user {}: {} of {} rows stored",
            owner_id,
            uploaded_items.len(),
            total
        );

        Ok(BulkImportReport {
            success: true,
            successful_uploads: uploaded_items.len(),
            failed_uploads: errors.len(),
            total_processed: total,
            uploaded_items,
            errors,
        })
    }

    async fn process_row(&self, row: &Row) -> std::result::Result<String, String> {
        let url = match row.get("image_url").map(|url| url.trim()) {
            Some(url) if !url.is_empty() => url,
            _ => {
                let title = row.get("title").map(String::as_str).unwrap_or_default();
                return Err(format!("Missing image URL for item: {}", title));
            }
        };

        self.images.import_remote(url).await.map_err(|err| {
            let details = match err {
                WardrobeError::Upstream { details, .. } => details,
                other => other.to_string(),
            };
            format!("Failed to process image: {}", details)
        })
    }
}
