use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use common::{Category, Season};
use serde::Serialize;

use crate::config::AnalyticsConfig;
use crate::db::WardrobeItem;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnderusedItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub category: String,
    pub image_url: String,
    #[serde(rename = "lastUsed")]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WardrobeSummary {
    pub total_items: usize,
    pub categories: Vec<Bucket>,
    pub seasons: Vec<Bucket>,
    pub underused: Vec<UnderusedItem>,
}

pub fn summarize(items: &[WardrobeItem], now: DateTime<Utc>, config: &AnalyticsConfig) -> WardrobeSummary {
    let mut categories: HashMap<String, usize> = HashMap::new();
    let mut seasons: HashMap<String, usize> = HashMap::new();

    for item in items {
        let category = item
            .fields
            .category
            .as_deref()
            .map(canonical_category)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "uncategorized".to_string());
        *categories.entry(category).or_default() += 1;

        let tags: Vec<String> = item
            .fields
            .seasons
            .as_deref()
            .map(|raw| common::split_tags(raw).map(|tag| canonical_season(&tag)).collect())
            .unwrap_or_default();
        if tags.is_empty() {
            *seasons.entry("unspecified".to_string()).or_default() += 1;
        }
        for tag in tags {
            *seasons.entry(tag).or_default() += 1;
        }
    }

    let underused = underused_items(items, now, config)
        .into_iter()
        .map(|item| UnderusedItem {
            id: item.id.clone(),
            title: item.fields.title_or_default(),
            category: item.fields.category.clone().unwrap_or_default(),
            image_url: item.image_url.clone(),
            last_used: item.last_used,
        })
        .collect();

    WardrobeSummary {
        total_items: items.len(),
        categories: into_buckets(categories),
        seasons: into_buckets(seasons),
        underused,
    }
}

/// Items never worn, or not worn within the configured window, oldest first.
pub fn underused_items<'a>(
    items: &'a [WardrobeItem],
    now: DateTime<Utc>,
    config: &AnalyticsConfig,
) -> Vec<&'a WardrobeItem> {
    let cutoff = Duration::try_days(config.underused_after_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut underused: Vec<&WardrobeItem> = items
        .iter()
        .filter(|item| item.last_used.map_or(true, |used| used < cutoff))
        .collect();

    // never-worn items sort before everything else
    underused.sort_by(|a, b| {
        a.last_used
            .cmp(&b.last_used)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    underused.truncate(config.underused_limit);
    underused
}

fn canonical_category(raw: &str) -> String {
    Category::from_name(raw)
        .map(|category| category.name().to_string())
        .unwrap_or_else(|| raw.trim().to_lowercase())
}

// "fall" and "autumn" count as one season
fn canonical_season(tag: &str) -> String {
    Season::from_name(tag)
        .map(|season| season.name().to_string())
        .unwrap_or_else(|| tag.to_string())
}

fn into_buckets(counts: HashMap<String, usize>) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(name, value)| Bucket { name, value })
        .collect();
    buckets.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ItemFields;

    fn item(id: &str, category: Option<&str>, seasons: Option<&str>, last_used_days_ago: Option<i64>) -> WardrobeItem {
        let now = Utc::now();
        WardrobeItem {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            fields: ItemFields {
                title: Some(format!("item {id}")),
                category: category.map(str::to_string),
                seasons: seasons.map(str::to_string),
                ..ItemFields::default()
            },
            image_url: format!("https://img.example/{id}.png"),
            created_at: now - Duration::days(400),
            updated_at: None,
            last_used: last_used_days_ago.map(|days| now - Duration::days(days)),
        }
    }

    fn config() -> AnalyticsConfig {
        AnalyticsConfig {
            underused_after_days: 90,
            underused_limit: 5,
        }
    }

    #[test]
    fn counts_categories_and_seasons() {
        let items = vec![
            item("1", Some("Tops"), Some("summer, spring"), Some(1)),
            item("2", Some("tops"), Some("summer, Fall"), Some(1)),
            item("3", None, None, Some(1)),
            item("4", Some("Capes"), Some("autumn"), Some(1)),
        ];
        let summary = summarize(&items, Utc::now(), &config());

        assert_eq!(summary.total_items, 4);
        assert_eq!(
            summary.categories,
            vec![
                Bucket { name: "tops".to_string(), value: 2 },
                Bucket { name: "capes".to_string(), value: 1 },
                Bucket { name: "uncategorized".to_string(), value: 1 },
            ]
        );
        assert_eq!(
            summary.seasons[..2],
            [
                Bucket { name: "autumn".to_string(), value: 2 },
                Bucket { name: "summer".to_string(), value: 2 },
            ]
        );
        assert!(summary.seasons.contains(&Bucket { name: "unspecified".to_string(), value: 1 }));
        assert!(summary.underused.is_empty());
    }

    #[test]
    fn underused_is_oldest_first_and_limited() {
        let mut items = vec![
            item("recent", None, None, Some(10)),
            item("old", None, None, Some(120)),
            item("older", None, None, Some(300)),
            item("never", None, None, None),
        ];
        for i in 0..5 {
            items.push(item(&format!("n{i}"), None, None, Some(100 + i)));
        }

        let underused = underused_items(&items, Utc::now(), &config());
        assert_eq!(underused.len(), 5);
        assert_eq!(underused[0].id, "never");
        assert_eq!(underused[1].id, "older");
        assert!(underused.iter().all(|item| item.id != "recent"));
    }

    #[test]
    fn oversized_window_only_keeps_never_worn_items() {
        let items = vec![item("worn", None, None, Some(5000)), item("never", None, None, None)];
        let config = AnalyticsConfig {
            underused_after_days: i64::MAX,
            underused_limit: 5,
        };

        let summary = summarize(&items, Utc::now(), &config);
        assert_eq!(summary.underused.len(), 1);
        assert_eq!(summary.underused[0].id, "never");
    }
}
