use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use common::{Occasion, Purpose};
use serde::{Deserialize, Serialize};

use super::wardrobe::{DeletedResponse, UpdatedResponse};
use crate::{
    db::{ItemFilter, NewOutfit, OutfitItem, OutfitUpdate, Stores},
    error::{Result, WardrobeError},
    middleware::AuthenticatedUser,
    services::{stylist::Combination, Stylist},
};

#[derive(Debug, Deserialize)]
pub struct CreateOutfitRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<OutfitItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOutfitRequest {
    pub name: Option<String>,
    pub items: Option<Vec<OutfitItem>>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateOutfitRequest {
    pub occasion: String,
    pub purpose: String,
}

#[derive(Debug, Deserialize)]
pub struct CombinationsRequest {
    #[serde(default)]
    pub item_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CombinationsResponse {
    pub combinations: Vec<Combination>,
}

fn invalid_outfit() -> WardrobeError {
    WardrobeError::Validation("Invalid outfit data".to_string())
}

#[get("")]
pub async fn list_outfits(user: AuthenticatedUser, stores: web::Data<Stores>) -> Result<HttpResponse> {
    let outfits = stores.outfits.list(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(outfits))
}

#[post("")]
pub async fn create_outfit(
    user: AuthenticatedUser,
    req: web::Json<CreateOutfitRequest>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let name = req.name.trim().to_string();
    if name.is_empty() || req.items.is_empty() {
        return Err(invalid_outfit());
    }

    let outfit = stores
        .outfits
        .insert(NewOutfit {
            owner_id: user.user_id.clone(),
            name,
            items: req.items,
            created_at: Utc::now(),
        })
        .await?;

    log::info!("User {} saved outfit {}", user.user_id, outfit.id);
    Ok(HttpResponse::Ok().json(outfit))
}

#[post("/generate")]
pub async fn generate_outfit(
    user: AuthenticatedUser,
    req: web::Json<GenerateOutfitRequest>,
    stores: web::Data<Stores>,
    stylist: web::Data<Stylist>,
) -> Result<HttpResponse> {
    let occasion = Occasion::from_name(&req.occasion)
        .ok_or_else(|| WardrobeError::Validation(format!("Unknown occasion: {}", req.occasion)))?;
    let purpose = Purpose::from_name(&req.purpose)
        .ok_or_else(|| WardrobeError::Validation(format!("Unknown purpose: {}", req.purpose)))?;

    let items = stores.items.list(&user.user_id, &ItemFilter::default()).await?;
    let outfit = stylist.generate_outfit(&items, occasion, purpose).await?;

    log::info!(
        "Generated {} / {} outfit for user {}",
        occasion,
        purpose,
        user.user_id
    );
    Ok(HttpResponse::Ok().json(outfit))
}

#[post("/combinations")]
pub async fn suggest_combinations(
    user: AuthenticatedUser,
    req: web::Json<CombinationsRequest>,
    stores: web::Data<Stores>,
    stylist: web::Data<Stylist>,
) -> Result<HttpResponse> {
    let mut ids: Vec<String> = Vec::new();
    for id in &req.item_ids {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    if ids.len() < 2 {
        return Err(WardrobeError::Validation(
            "Select at least two items".to_string(),
        ));
    }

    let mut items = Vec::with_capacity(ids.len());
    for id in &ids {
        let item = stores
            .items
            .find(&user.user_id, id)
            .await?
            .ok_or(WardrobeError::NotFound("Item"))?;
        items.push(item);
    }

    let combinations = stylist.suggest_combinations(&items).await?;
    Ok(HttpResponse::Ok().json(CombinationsResponse { combinations }))
}

#[put("/{id}")]
pub async fn update_outfit(
    user: AuthenticatedUser,
    path: web::Path<String>,
    req: web::Json<UpdateOutfitRequest>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let name = match req.name {
        Some(name) if name.trim().is_empty() => return Err(invalid_outfit()),
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    if matches!(&req.items, Some(items) if items.is_empty()) {
        return Err(invalid_outfit());
    }

    let id = path.into_inner();
    let update = OutfitUpdate {
        name,
        items: req.items,
    };
    if !stores.outfits.update(&user.user_id, &id, update).await? {
        return Err(WardrobeError::NotFound("Outfit"));
    }

    Ok(HttpResponse::Ok().json(UpdatedResponse {
        success: true,
        matched: 1,
    }))
}

#[delete("/{id}")]
pub async fn delete_outfit(
    user: AuthenticatedUser,
    path: web::Path<String>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if !stores.outfits.delete(&user.user_id, &id).await? {
        return Err(WardrobeError::NotFound("Outfit"));
    }

    log::info!("User {} deleted outfit {}", user.user_id, id);
    Ok(HttpResponse::Ok().json(DeletedResponse {
        success: true,
        deleted: 1,
    }))
}
