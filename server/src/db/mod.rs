pub mod memory;
pub mod models;
pub mod repository;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use models::{
    ItemFields, ItemFilter, ItemUpdate, NewItem, NewOutfit, NewUser, Outfit, OutfitItem,
    OutfitUpdate, User, WardrobeItem,
};
pub use repository::MongoDbContext;

use crate::error::Result;

/// Account persistence. `insert` must report a duplicate email as
/// `WardrobeError::Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> Result<User>;
}

/// Wardrobe items. Every call is scoped to `owner_id`; an item belonging to
/// somebody else behaves exactly like a missing one.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn list(&self, owner_id: &str, filter: &ItemFilter) -> Result<Vec<WardrobeItem>>;
    async fn find(&self, owner_id: &str, id: &str) -> Result<Option<WardrobeItem>>;
    async fn insert(&self, item: NewItem) -> Result<WardrobeItem>;
    async fn insert_many(&self, items: Vec<NewItem>) -> Result<Vec<String>>;
    /// Returns false when nothing matched.
    async fn update(&self, owner_id: &str, id: &str, update: ItemUpdate) -> Result<bool>;
    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait OutfitStore: Send + Sync {
    async fn list(&self, owner_id: &str) -> Result<Vec<Outfit>>;
    async fn insert(&self, outfit: NewOutfit) -> Result<Outfit>;
    async fn update(&self, owner_id: &str, id: &str, update: OutfitUpdate) -> Result<bool>;
    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool>;
}

/// Shared handles to every collection, created once at startup.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub items: Arc<dyn ItemStore>,
    pub outfits: Arc<dyn OutfitStore>,
    backend: &'static str,
    health: Arc<dyn HealthProbe>,
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

impl Stores {
    pub fn mongo(context: MongoDbContext) -> Self {
        Self {
            users: Arc::new(context.users()),
            items: Arc::new(context.items()),
            outfits: Arc::new(context.outfits()),
            backend: "mongodb",
            health: Arc::new(context),
        }
    }

    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            users: Arc::new(store.clone()),
            items: Arc::new(store.clone()),
            outfits: Arc::new(store.clone()),
            backend: "memory",
            health: Arc::new(store),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub async fn ping(&self) -> Result<()> {
        self.health.ping().await
    }
}
