use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::form::{collect_form, FormUpload};
use crate::{
    config::AppConfig,
    db::{ItemFields, ItemFilter, ItemUpdate, NewItem, Stores},
    error::{Result, WardrobeError},
    middleware::AuthenticatedUser,
    services::{analytics, spreadsheet, BulkImporter, ImagePipeline, Stylist},
};

#[derive(Debug, Serialize)]
pub struct CreatedItemResponse {
    pub success: bool,
    #[serde(rename = "_id")]
    pub id: String,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub success: bool,
    pub matched: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: String,
}

/// Uploaded `image` file through the pipeline, else the `image_url` field.
async fn resolve_image(form: &mut FormUpload, images: &ImagePipeline) -> Result<Option<String>> {
    if let Some(image) = form.take_file("image") {
        return images.store(image).await.map(Some);
    }

    Ok(form
        .fields
        .get("image_url")
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty()))
}

fn parse_last_used(form: &FormUpload) -> Result<Option<DateTime<Utc>>> {
    match form.fields.get("lastUsed").map(|value| value.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|_| WardrobeError::Validation("lastUsed must be an RFC 3339 timestamp".to_string())),
    }
}

#[get("")]
pub async fn list_items(
    user: AuthenticatedUser,
    filter: web::Query<ItemFilter>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse> {
    let items = stores.items.list(&user.user_id, &filter).await?;
    log::debug!("Listing {} items for user {}", items.len(), user.user_id);
    Ok(HttpResponse::Ok().json(items))
}

#[post("")]
pub async fn create_item(
    user: AuthenticatedUser,
    payload: Multipart,
    stores: web::Data<Stores>,
    images: web::Data<ImagePipeline>,
) -> Result<HttpResponse> {
    let mut form = collect_form(payload).await?;
    let image_url = resolve_image(&mut form, &images).await?.unwrap_or_default();

    let mut item = NewItem::new(&user.user_id, ItemFields::from_values(&form.fields), image_url);
    item.last_used = parse_last_used(&form)?;

    let stored = stores.items.insert(item).await?;
    log::info!("User {} added item {}", user.user_id, stored.id);

    Ok(HttpResponse::Ok().json(CreatedItemResponse {
        success: true,
        id: stored.id,
        image_url: stored.image_url,
    }))
}

#[post("/bulk")]
pub async fn bulk_upload(
    user: AuthenticatedUser,
    payload: Multipart,
    stores: web::Data<Stores>,
    images: web::Data<ImagePipeline>,
) -> Result<HttpResponse> {
    let mut form = collect_form(payload).await?;
    let workbook = form
        .take_file("excel")
        .ok_or_else(|| WardrobeError::Validation("Missing Excel file".to_string()))?;

    let rows = spreadsheet::read_rows(workbook.bytes)
        .map_err(|err| WardrobeError::Validation(format!("Invalid spreadsheet: {}", err)))?;
    log::info!("Bulk import of {} rows for user {}", rows.len(), user.user_id);

    let importer = BulkImporter::new(images.get_ref().clone(), stores.items.clone());
    let report = importer.import(&user.user_id, rows).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[get("/analytics")]
pub async fn item_analytics(
    user: AuthenticatedUser,
    stores: web::Data<Stores>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse> {
    let items = stores.items.list(&user.user_id, &ItemFilter::default()).await?;
    let summary = analytics::summarize(&items, Utc::now(), &config.analytics);
    Ok(HttpResponse::Ok().json(summary))
}

#[post("/analytics/suggestions")]
pub async fn styling_suggestions(
    user: AuthenticatedUser,
    stores: web::Data<Stores>,
    stylist: web::Data<Stylist>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse> {
    let items = stores.items.list(&user.user_id, &ItemFilter::default()).await?;
    let underused = analytics::underused_items(&items, Utc::now(), &config.analytics);
    if underused.is_empty() {
        return Err(WardrobeError::Validation(
            "No underused items to style".to_string(),
        ));
    }

    let suggestions = stylist.styling_tips(&underused).await?;
    Ok(HttpResponse::Ok().json(SuggestionsResponse { suggestions }))
}

#[get("/{id}")]
pub async fn get_item(
    user: AuthenticatedUser,
    path: web::Path<String>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse> {
    let item = stores
        .items
        .find(&user.user_id, &path)
        .await?
        .ok_or(WardrobeError::NotFound("Item"))?;
    Ok(HttpResponse::Ok().json(item))
}

#[put("/{id}")]
pub async fn update_item(
    user: AuthenticatedUser,
    path: web::Path<String>,
    payload: Multipart,
    stores: web::Data<Stores>,
    images: web::Data<ImagePipeline>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let current = stores
        .items
        .find(&user.user_id, &id)
        .await?
        .ok_or(WardrobeError::NotFound("Item"))?;

    let mut form = collect_form(payload).await?;
    let image_url = resolve_image(&mut form, &images)
        .await?
        .unwrap_or(current.image_url);
    let last_used = parse_last_used(&form)?.or(current.last_used);

    let update = ItemUpdate {
        fields: ItemFields::from_values(&form.fields),
        image_url,
        last_used,
        updated_at: Utc::now(),
    };

    if !stores.items.update(&user.user_id, &id, update).await? {
        return Err(WardrobeError::NotFound("Item"));
    }

    log::info!("User {} updated item {}", user.user_id, id);
    Ok(HttpResponse::Ok().json(UpdatedResponse {
        success: true,
        matched: 1,
    }))
}

#[delete("/{id}")]
pub async fn delete_item(
    user: AuthenticatedUser,
    path: web::Path<String>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if !stores.items.delete(&user.user_id, &id).await? {
        return Err(WardrobeError::NotFound("Item"));
    }

    log::info!("User {} deleted item {}", user.user_id, id);
    Ok(HttpResponse::Ok().json(DeletedResponse {
        success: true,
        deleted: 1,
    }))
}
