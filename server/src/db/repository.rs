use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    Client, Collection, Database,
};
use serde::{Deserialize, Serialize};

use super::models::{
    ItemFields, ItemFilter, ItemUpdate, NewItem, NewOutfit, NewUser, Outfit, OutfitItem,
    OutfitUpdate, User, WardrobeItem,
};
use super::{HealthProbe, ItemStore, OutfitStore, UserStore};
use crate::error::{Result, WardrobeError};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoDbContext {
    db: Database,
}

impl MongoDbContext {
    pub fn new(client: Client, database_name: &str) -> Self {
        Self {
            db: client.database(database_name),
        }
    }

    pub fn users(&self) -> UserRepository {
        UserRepository {
            collection: self.db.collection("users"),
        }
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository {
            collection: self.db.collection("items"),
        }
    }

    pub fn outfits(&self) -> OutfitRepository {
        OutfitRepository {
            collection: self.db.collection("outfits"),
        }
    }

    pub async fn init_indexes(&self) -> Result<()> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        // Create unique index on email
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.db
            .collection::<UserDocument>("users")
            .create_index(email_index)
            .await?;

        // Owner lookups for items and outfits
        let owner_index = IndexModel::builder()
            .keys(doc! { "userId": 1, "created_at": -1 })
            .build();

        self.db
            .collection::<ItemDocument>("items")
            .create_index(owner_index.clone())
            .await?;

        self.db
            .collection::<OutfitDocument>("outfits")
            .create_index(owner_index)
            .await?;

        log::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for MongoDbContext {
    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}

fn to_bson<T: Serialize>(value: &T) -> Result<Bson> {
    bson::to_bson(value)
        .map_err(|e| WardrobeError::Internal(format!("Failed to encode document: {}", e)))
}

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    bson::to_document(value)
        .map_err(|e| WardrobeError::Internal(format!("Failed to encode document: {}", e)))
}

fn inserted_id(id: &Bson) -> Result<ObjectId> {
    id.as_object_id()
        .ok_or_else(|| WardrobeError::Internal("Inserted id is not an ObjectId".to_string()))
}

// Malformed ids can never match, which keeps them indistinguishable from
// another owner's documents.
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn owner_id(owner: &str) -> Result<ObjectId> {
    ObjectId::parse_str(owner).map_err(|_| WardrobeError::Unauthorized)
}

fn hex_or_empty(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    email: String,
    password: String,
    created_at: BsonDateTime,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: hex_or_empty(doc.id),
            email: doc.email,
            password_hash: doc.password,
            created_at: doc.created_at.to_chrono(),
        }
    }
}

#[derive(Clone)]
pub struct UserRepository {
    collection: Collection<UserDocument>,
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self.collection.find_one(doc! { "email": email }).await?;
        Ok(user.map(User::from))
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut document = UserDocument {
            id: None,
            email: user.email,
            password: user.password_hash,
            created_at: BsonDateTime::from_chrono(user.created_at),
        };

        let result = self.collection.insert_one(&document).await.map_err(|err| {
            if is_duplicate_key(&err) {
                WardrobeError::Conflict("User already exists".to_string())
            } else {
                WardrobeError::Database(err)
            }
        })?;

        document.id = Some(inserted_id(&result.inserted_id)?);
        Ok(document.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    #[serde(rename = "userId")]
    owner: ObjectId,
    #[serde(flatten)]
    fields: ItemFields,
    #[serde(default)]
    image_url: String,
    created_at: BsonDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<BsonDateTime>,
    #[serde(rename = "lastUsed", default, skip_serializing_if = "Option::is_none")]
    last_used: Option<BsonDateTime>,
}

impl ItemDocument {
    fn from_new(item: NewItem) -> Result<Self> {
        Ok(Self {
            id: None,
            owner: owner_id(&item.owner_id)?,
            fields: item.fields,
            image_url: item.image_url,
            created_at: BsonDateTime::from_chrono(item.created_at),
            updated_at: None,
            last_used: item.last_used.map(BsonDateTime::from_chrono),
        })
    }
}

impl From<ItemDocument> for WardrobeItem {
    fn from(doc: ItemDocument) -> Self {
        WardrobeItem {
            id: hex_or_empty(doc.id),
            owner_id: doc.owner.to_hex(),
            fields: doc.fields,
            image_url: doc.image_url,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.map(|at| at.to_chrono()),
            last_used: doc.last_used.map(|at| at.to_chrono()),
        }
    }
}

#[derive(Serialize)]
struct ItemSet<'a> {
    #[serde(flatten)]
    fields: &'a ItemFields,
    image_url: &'a str,
    updated_at: BsonDateTime,
    #[serde(rename = "lastUsed")]
    last_used: Option<BsonDateTime>,
}

fn exact_ci(value: &str) -> Document {
    doc! { "$regex": format!("^{}$", regex::escape(value)), "$options": "i" }
}

fn contains_ci(value: &str) -> Document {
    doc! { "$regex": regex::escape(value), "$options": "i" }
}

fn item_query(owner: ObjectId, filter: &ItemFilter) -> Document {
    let filter = filter.normalized();
    let mut query = doc! { "userId": owner };

    if let Some(category) = &filter.category {
        query.insert("category", exact_ci(category));
    }
    if let Some(occasion) = &filter.occasion {
        query.insert("occasion", exact_ci(occasion));
    }
    if let Some(purpose) = &filter.purpose {
        query.insert("purpose", exact_ci(purpose));
    }
    if let Some(color) = &filter.color {
        query.insert("mainColor", contains_ci(color));
    }
    if let Some(search) = &filter.search {
        query.insert("title", contains_ci(search));
    }
    if let Some(season) = &filter.season {
        query.insert(
            "seasons",
            doc! {
                "$regex": format!(r"(^|,)\s*{}\s*(,|$)", regex::escape(season)),
                "$options": "i",
            },
        );
    }

    query
}

#[derive(Clone)]
pub struct ItemRepository {
    collection: Collection<ItemDocument>,
}

#[async_trait]
impl ItemStore for ItemRepository {
    async fn list(&self, owner: &str, filter: &ItemFilter) -> Result<Vec<WardrobeItem>> {
        let mut cursor = self
            .collection
            .find(item_query(owner_id(owner)?, filter))
            .sort(doc! { "created_at": -1 })
            .await?;

        let mut items = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            items.push(item.into());
        }

        Ok(items)
    }

    async fn find(&self, owner: &str, id: &str) -> Result<Option<WardrobeItem>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let item = self
            .collection
            .find_one(doc! { "_id": id, "userId": owner_id(owner)? })
            .await?;
        Ok(item.map(WardrobeItem::from))
    }

    async fn insert(&self, item: NewItem) -> Result<WardrobeItem> {
        let mut document = ItemDocument::from_new(item)?;
        let result = self.collection.insert_one(&document).await?;
        document.id = Some(inserted_id(&result.inserted_id)?);
        Ok(document.into())
    }

    async fn insert_many(&self, items: Vec<NewItem>) -> Result<Vec<String>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let documents = items
            .into_iter()
            .map(ItemDocument::from_new)
            .collect::<Result<Vec<_>>>()?;
        let count = documents.len();
        let result = self.collection.insert_many(&documents).await?;

        (0..count)
            .map(|index| {
                result
                    .inserted_ids
                    .get(&index)
                    .ok_or_else(|| WardrobeError::Internal(format!("Missing inserted id {}", index)))
                    .and_then(inserted_id)
                    .map(|id| id.to_hex())
            })
            .collect()
    }

    async fn update(&self, owner: &str, id: &str, update: ItemUpdate) -> Result<bool> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };

        let set = to_document(&ItemSet {
            fields: &update.fields,
            image_url: &update.image_url,
            updated_at: BsonDateTime::from_chrono(update.updated_at),
            last_used: update.last_used.map(BsonDateTime::from_chrono),
        })?;

        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "userId": owner_id(owner)? },
                doc! { "$set": set },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, owner: &str, id: &str) -> Result<bool> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "userId": owner_id(owner)? })
            .await?;
        Ok(result.deleted_count > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutfitDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    #[serde(rename = "userId")]
    owner: ObjectId,
    name: String,
    #[serde(default)]
    items: Vec<OutfitItem>,
    created_at: BsonDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<BsonDateTime>,
}

impl From<OutfitDocument> for Outfit {
    fn from(doc: OutfitDocument) -> Self {
        Outfit {
            id: hex_or_empty(doc.id),
            owner_id: doc.owner.to_hex(),
            name: doc.name,
            items: doc.items,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.map(|at| at.to_chrono()),
        }
    }
}

#[derive(Clone)]
pub struct OutfitRepository {
    collection: Collection<OutfitDocument>,
}

#[async_trait]
impl OutfitStore for OutfitRepository {
    async fn list(&self, owner: &str) -> Result<Vec<Outfit>> {
        let mut cursor = self
            .collection
            .find(doc! { "userId": owner_id(owner)? })
            .sort(doc! { "created_at": 1 })
            .await?;

        let mut outfits = Vec::new();
        while let Some(outfit) = cursor.try_next().await? {
            outfits.push(outfit.into());
        }

        Ok(outfits)
    }

    async fn insert(&self, outfit: NewOutfit) -> Result<Outfit> {
        let mut document = OutfitDocument {
            id: None,
            owner: owner_id(&outfit.owner_id)?,
            name: outfit.name,
            items: outfit.items,
            created_at: BsonDateTime::from_chrono(outfit.created_at),
            updated_at: None,
        };
        let result = self.collection.insert_one(&document).await?;
        document.id = Some(inserted_id(&result.inserted_id)?);
        Ok(document.into())
    }

    async fn update(&self, owner: &str, id: &str, update: OutfitUpdate) -> Result<bool> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };

        let mut set = doc! { "updated_at": BsonDateTime::now() };
        if let Some(name) = &update.name {
            set.insert("name", name.as_str());
        }
        if let Some(items) = &update.items {
            set.insert("items", to_bson(items)?);
        }

        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "userId": owner_id(owner)? },
                doc! { "$set": set },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, owner: &str, id: &str) -> Result<bool> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "userId": owner_id(owner)? })
            .await?;
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_query_always_scopes_owner() {
        let owner = ObjectId::new();
        let query = item_query(owner, &ItemFilter::default());
        assert_eq!(query.get_object_id("userId").unwrap(), owner);
        assert_eq!(query.len(), 1);
    }

    #[test]
    fn item_query_escapes_user_input() {
        let owner = ObjectId::new();
        let filter = ItemFilter {
            category: Some("tops (new)".to_string()),
            season: Some("all".to_string()),
            ..ItemFilter::default()
        };
        let query = item_query(owner, &filter);

        let category = query.get_document("category").unwrap();
        assert_eq!(category.get_str("$regex").unwrap(), r"^tops \(new\)$");
        assert_eq!(category.get_str("$options").unwrap(), "i");
        assert!(query.get("seasons").is_none());
    }

    #[test]
    fn item_document_storage_shape() {
        let owner = ObjectId::new();
        let item = NewItem::new(
            &owner.to_hex(),
            ItemFields {
                title: Some("Denim jacket".to_string()),
                item_type: Some("jacket".to_string()),
                ..ItemFields::default()
            },
            "https://img.example/jacket.png".to_string(),
        );
        let document = to_document(&ItemDocument::from_new(item).unwrap()).unwrap();

        assert!(document.get("_id").is_none());
        assert_eq!(document.get_object_id("userId").unwrap(), owner);
        assert_eq!(document.get_str("type").unwrap(), "jacket");
        assert_eq!(document.get_str("image_url").unwrap(), "https://img.example/jacket.png");
    }

    #[test]
    fn timestamps_are_stored_as_bson_dates() {
        let owner = ObjectId::new();
        let mut item = NewItem::new(&owner.to_hex(), ItemFields::default(), String::new());
        item.last_used = Some(item.created_at);
        let document = to_document(&ItemDocument::from_new(item.clone()).unwrap()).unwrap();

        let created_at = document.get_datetime("created_at").unwrap();
        assert_eq!(created_at.timestamp_millis(), item.created_at.timestamp_millis());
        assert!(document.get_datetime("lastUsed").is_ok());

        let stored: ItemDocument = bson::from_document(document).unwrap();
        let restored = WardrobeItem::from(stored);
        assert_eq!(restored.created_at.timestamp_millis(), item.created_at.timestamp_millis());
    }

    #[test]
    fn malformed_ids_never_parse() {
        assert!(parse_id("not-an-object-id").is_none());
        assert!(parse_id(&ObjectId::new().to_hex()).is_some());
    }
}
