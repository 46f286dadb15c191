use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(rename = "password", skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Credentials for an account that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(email: &str, password: &str, cost: u32) -> Result<Self> {
        let password_hash = bcrypt::hash(password, cost)?;

        Ok(Self {
            email: normalize_email(email),
            password_hash,
            created_at: Utc::now(),
        })
    }
}

impl User {
    pub fn verify_password(&self, password: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, &self.password_hash)?)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Descriptive metadata of a wardrobe item. Every field is free text, as
/// submitted by the item form or a spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemFields {
    pub title: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub size: Option<String>,
    pub brand: Option<String>,
    pub source: Option<String>,
    pub is_secondhand: bool,
    pub purchase_price: Option<String>,
    pub purchase_date: Option<String>,
    pub purpose: Option<String>,
    pub seasons: Option<String>,
    pub occasion: Option<String>,
    pub main_color: Option<String>,
    pub additional_colors: Option<String>,
    pub pattern: Option<String>,
    pub primary_material: Option<String>,
    pub secondary_materials: Option<String>,
    pub style: Option<String>,
    pub embellishments: Option<String>,
    pub design_details: Option<String>,
    pub personal_tags: Option<String>,
    pub notes: Option<String>,
}

impl ItemFields {
    /// Builds the fields from form/spreadsheet values keyed by their wire
    /// names. Blank values are treated as absent.
    pub fn from_values(values: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            values
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            title: get("title"),
            category: get("category"),
            item_type: get("type"),
            size: get("size"),
            brand: get("brand"),
            source: get("source"),
            is_secondhand: get("isSecondhand")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false),
            purchase_price: get("purchasePrice"),
            purchase_date: get("purchaseDate"),
            purpose: get("purpose"),
            seasons: get("seasons"),
            occasion: get("occasion"),
            main_color: get("mainColor"),
            additional_colors: get("additionalColors"),
            pattern: get("pattern"),
            primary_material: get("primaryMaterial"),
            secondary_materials: get("secondaryMaterials"),
            style: get("style"),
            embellishments: get("embellishments"),
            design_details: get("designDetails"),
            personal_tags: get("personalTags"),
            notes: get("notes"),
        }
    }

    pub fn title_or_default(&self) -> String {
        self.title.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardrobeItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    #[serde(flatten)]
    pub fields: ItemFields,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastUsed", skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl WardrobeItem {
    pub fn snapshot(&self) -> OutfitItem {
        OutfitItem {
            id: self.id.clone(),
            title: self.fields.title_or_default(),
            category: self.fields.category.clone().unwrap_or_default(),
            image_url: self.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub owner_id: String,
    pub fields: ItemFields,
    pub image_url: String,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewItem {
    pub fn new(owner_id: &str, fields: ItemFields, image_url: String) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            fields,
            image_url,
            last_used: None,
            created_at: Utc::now(),
        }
    }
}

/// Full replacement of an item's descriptive fields and image.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub fields: ItemFields,
    pub image_url: String,
    pub last_used: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized copy of a wardrobe item embedded in an outfit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitItem {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outfit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    pub items: Vec<OutfitItem>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOutfit {
    pub owner_id: String,
    pub name: String,
    pub items: Vec<OutfitItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct OutfitUpdate {
    pub name: Option<String>,
    pub items: Option<Vec<OutfitItem>>,
}

/// Query filters for listing items. All comparisons are case-insensitive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub season: Option<String>,
    pub color: Option<String>,
    pub occasion: Option<String>,
    pub purpose: Option<String>,
    #[serde(rename = "q")]
    pub search: Option<String>,
}

impl ItemFilter {
    /// Drops blank values and the "all" wildcard the gallery sends.
    pub fn normalized(&self) -> Self {
        let clean = |value: &Option<String>, wildcard: bool| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .filter(|v| !(wildcard && v.eq_ignore_ascii_case("all")))
                .map(str::to_string)
        };

        Self {
            category: clean(&self.category, true),
            season: clean(&self.season, true),
            color: clean(&self.color, false),
            occasion: clean(&self.occasion, true),
            purpose: clean(&self.purpose, true),
            search: clean(&self.search, false),
        }
    }

    pub fn matches(&self, item: &WardrobeItem) -> bool {
        let fields = &item.fields;
        let equals = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            None => true,
            Some(wanted) => actual
                .as_deref()
                .map(|actual| common::tags_equal(actual, wanted))
                .unwrap_or(false),
        };
        let contains = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            None => true,
            Some(wanted) => actual
                .as_deref()
                .map(|actual| actual.to_lowercase().contains(&wanted.to_lowercase()))
                .unwrap_or(false),
        };
        let season_ok = match &self.season {
            None => true,
            Some(wanted) => fields
                .seasons
                .as_deref()
                .map(|seasons| common::split_tags(seasons).any(|tag| common::tags_equal(&tag, wanted)))
                .unwrap_or(false),
        };

        equals(&self.category, &fields.category)
            && equals(&self.occasion, &fields.occasion)
            && equals(&self.purpose, &fields.purpose)
            && contains(&self.color, &fields.main_color)
            && contains(&self.search, &fields.title)
            && season_ok
    }
}
