//! Process-local storage backend, selected with `database.backend = "memory"`.
//! Data lives only as long as the process.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mongodb::bson::oid::ObjectId;

use super::models::{
    ItemFilter, ItemUpdate, NewItem, NewOutfit, NewUser, Outfit, OutfitUpdate, User, WardrobeItem,
};
use super::{HealthProbe, ItemStore, OutfitStore, UserStore};
use crate::error::{Result, WardrobeError};

#[derive(Clone, Default)]
pub struct MemoryStore {
    // email -> user
    users: Arc<DashMap<String, User>>,
    // item id -> item
    items: Arc<DashMap<String, WardrobeItem>>,
    // outfit id -> outfit
    outfits: Arc<DashMap<String, Outfit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id() -> String {
        ObjectId::new().to_hex()
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.get(email).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        use dashmap::mapref::entry::Entry;

        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(WardrobeError::Conflict("User already exists".to_string())),
            Entry::Vacant(slot) => {
                let stored = User {
                    id: Self::next_id(),
                    email: user.email,
                    password_hash: user.password_hash,
                    created_at: user.created_at,
                };
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn list(&self, owner_id: &str, filter: &ItemFilter) -> Result<Vec<WardrobeItem>> {
        let filter = filter.normalized();
        let mut items: Vec<WardrobeItem> = self
            .items
            .iter()
            .filter(|entry| entry.owner_id == owner_id && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn find(&self, owner_id: &str, id: &str) -> Result<Option<WardrobeItem>> {
        Ok(self
            .items
            .get(id)
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, item: NewItem) -> Result<WardrobeItem> {
        let stored = WardrobeItem {
            id: Self::next_id(),
            owner_id: item.owner_id,
            fields: item.fields,
            image_url: item.image_url,
            created_at: item.created_at,
            updated_at: None,
            last_used: item.last_used,
        };
        self.items.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn insert_many(&self, items: Vec<NewItem>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(ItemStore::insert(self, item).await?.id);
        }
        Ok(ids)
    }

    async fn update(&self, owner_id: &str, id: &str, update: ItemUpdate) -> Result<bool> {
        match self.items.get_mut(id) {
            Some(mut entry) if entry.owner_id == owner_id => {
                entry.fields = update.fields;
                entry.image_url = update.image_url;
                entry.last_used = update.last_used;
                entry.updated_at = Some(update.updated_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool> {
        Ok(self
            .items
            .remove_if(id, |_, item| item.owner_id == owner_id)
            .is_some())
    }
}

#[async_trait]
impl OutfitStore for MemoryStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<Outfit>> {
        let mut outfits: Vec<Outfit> = self
            .outfits
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();

        outfits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(outfits)
    }

    async fn insert(&self, outfit: NewOutfit) -> Result<Outfit> {
        let stored = Outfit {
            id: Self::next_id(),
            owner_id: outfit.owner_id,
            name: outfit.name,
            items: outfit.items,
            created_at: outfit.created_at,
            updated_at: None,
        };
        self.outfits.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, owner_id: &str, id: &str, update: OutfitUpdate) -> Result<bool> {
        match self.outfits.get_mut(id) {
            Some(mut entry) if entry.owner_id == owner_id => {
                if let Some(name) = update.name {
                    entry.name = name;
                }
                if let Some(items) = update.items {
                    entry.items = items;
                }
                entry.updated_at = Some(chrono::Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool> {
        Ok(self
            .outfits
            .remove_if(id, |_, outfit| outfit.owner_id == owner_id)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ItemFields, OutfitItem};
    use chrono::Utc;

    fn new_item(owner: &str, title: &str) -> NewItem {
        NewItem::new(
            owner,
            ItemFields {
                title: Some(title.to_string()),
                ..ItemFields::default()
            },
            format!("https://img.example/{title}.png"),
        )
    }

    #[actix_web::test]
    async fn duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        let user = NewUser {
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        };

        UserStore::insert(&store, user.clone()).await.unwrap();
        let second = UserStore::insert(&store, user).await;
        assert!(matches!(second, Err(WardrobeError::Conflict(_))));
    }

    #[actix_web::test]
    async fn items_are_owner_scoped() {
        let store = MemoryStore::new();
        let item = ItemStore::insert(&store, new_item("alice", "scarf")).await.unwrap();

        assert!(ItemStore::find(&store, "alice", &item.id).await.unwrap().is_some());
        assert!(ItemStore::find(&store, "bob", &item.id).await.unwrap().is_none());
        assert!(ItemStore::list(&store, "bob", &ItemFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(!ItemStore::delete(&store, "bob", &item.id).await.unwrap());
        assert!(ItemStore::delete(&store, "alice", &item.id).await.unwrap());
    }

    #[actix_web::test]
    async fn outfit_update_is_partial_and_scoped() {
        let store = MemoryStore::new();
        let outfit = OutfitStore::insert(
            &store,
            NewOutfit {
                owner_id: "alice".to_string(),
                name: "Monday".to_string(),
                items: vec![OutfitItem {
                    id: "1".to_string(),
                    title: "Tee".to_string(),
                    category: "tops".to_string(),
                    image_url: "https://img.example/tee.png".to_string(),
                }],
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let rename = OutfitUpdate {
            name: Some("Tuesday".to_string()),
            items: None,
        };
        assert!(!OutfitStore::update(&store, "bob", &outfit.id, rename.clone())
            .await
            .unwrap());
        assert!(OutfitStore::update(&store, "alice", &outfit.id, rename)
            .await
            .unwrap());

        let listed = OutfitStore::list(&store, "alice").await.unwrap();
        assert_eq!(listed[0].name, "Tuesday");
        assert_eq!(listed[0].items.len(), 1);
        assert!(listed[0].updated_at.is_some());
    }
}
