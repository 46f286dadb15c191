//! AI styling features: single-outfit generation, multi-item combinations
//! and styling tips for rarely worn items. Prompts go through
//! [`FailoverCompleter`]; answers are parsed and validated here.

use std::sync::OnceLock;

use common::{Occasion, Purpose};
use regex::Regex;
use serde::Serialize;

use super::completion::FailoverCompleter;
use crate::db::{OutfitItem, WardrobeItem};
use crate::error::{Result, WardrobeError};

const MAX_COMBINATIONS: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedOutfit {
    pub top: OutfitItem,
    pub bottom: OutfitItem,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Combination {
    pub description: String,
    pub items: Vec<OutfitItem>,
}

#[derive(Clone)]
pub struct Stylist {
    completer: FailoverCompleter,
}

impl Stylist {
    pub fn new(completer: FailoverCompleter) -> Self {
        Self { completer }
    }

    /// Asks the model for one top and one bottom among the items matching
    /// `occasion` and `purpose`.
    pub async fn generate_outfit(
        &self,
        items: &[WardrobeItem],
        occasion: Occasion,
        purpose: Purpose,
    ) -> Result<GeneratedOutfit> {
        let candidates = candidates_for(items, occasion, purpose);
        if candidates.is_empty() {
            return Err(WardrobeError::Validation(
                "No items match the selected criteria".to_string(),
            ));
        }

        let image_urls: Vec<&str> = candidates.iter().map(|item| item.image_url.as_str()).collect();
        let prompt = format!(
            "Given the following clothing items for a {} occasion with a {} purpose, \
             select one top and one bottom to create an outfit. Return only the image URLs \
             of the selected items in the format: \"Top: [URL], Bottom: [URL]\". \
             Available items: {}",
            occasion,
            purpose,
            image_urls.join(", ")
        );

        let answer = self.completer.complete(&prompt).await?;
        log::debug!("Outfit generation answer: {}", answer);

        pick_top_and_bottom(&answer, &candidates).ok_or_else(|| {
            log::warn!("AI response did not name a valid top and bottom");
            WardrobeError::upstream(
                "AI service",
                "AI response did not name a valid top and bottom",
            )
        })
    }

    /// Up to three combinations of `items`, each with a one-line description.
    pub async fn suggest_combinations(&self, items: &[WardrobeItem]) -> Result<Vec<Combination>> {
        let image_urls: Vec<&str> = items.iter().map(|item| item.image_url.as_str()).collect();
        let prompt = format!(
            "Analyze these clothing items and suggest 3 best outfit combinations. \
             For each combination, provide a style description and recommend the best order \
             of layering the items. Only return the outfit combinations generated by you. \
             Image URLs: {}",
            image_urls.join(", ")
        );

        let answer = self.completer.complete(&prompt).await?;
        let snapshots: Vec<OutfitItem> = items.iter().map(WardrobeItem::snapshot).collect();

        let combinations: Vec<Combination> = parse_combinations(&answer)
            .into_iter()
            .map(|description| Combination {
                description,
                items: snapshots.clone(),
            })
            .collect();

        if combinations.is_empty() {
            return Err(WardrobeError::upstream(
                "AI service",
                "AI response contained no outfit combinations",
            ));
        }
        Ok(combinations)
    }

    pub async fn styling_tips(&self, underused: &[&WardrobeItem]) -> Result<String> {
        let titles: Vec<String> = underused
            .iter()
            .map(|item| item.fields.title_or_default())
            .collect();
        let prompt = format!(
            "I have the following underused items in my wardrobe: {}. \
             Please suggest creative ways to style and reuse these items, focusing on \
             sustainable fashion practices. Provide specific outfit ideas and styling tips \
             for each item. Give me in 2 or 3 lines",
            titles.join(", ")
        );

        let answer = self.completer.complete(&prompt).await?;
        Ok(answer.trim().to_string())
    }
}

pub fn candidates_for(items: &[WardrobeItem], occasion: Occasion, purpose: Purpose) -> Vec<WardrobeItem> {
    items
        .iter()
        .filter(|item| {
            let occasion_ok = item
                .fields
                .occasion
                .as_deref()
                .and_then(Occasion::from_name)
                == Some(occasion);
            let purpose_ok = item.fields.purpose.as_deref().and_then(Purpose::from_name) == Some(purpose);
            occasion_ok && purpose_ok
        })
        .cloned()
        .collect()
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s,]+").expect("static URL pattern"))
}

/// Well-formed http(s) URLs in order of first appearance, without
/// duplicates or trailing punctuation.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in url_pattern().find_iter(text) {
        let candidate = found
            .as_str()
            .trim_end_matches(|c: char| matches!(c, '.' | ';' | ':' | '!' | '?' | ')' | ']' | '"' | '\'' | '>'));
        if url::Url::parse(candidate).is_err() {
            continue;
        }
        if !urls.iter().any(|seen| seen == candidate) {
            urls.push(candidate.to_string());
        }
    }
    urls
}

/// Exactly two distinct URLs, both belonging to `candidates`; the first is
/// the top.
pub fn pick_top_and_bottom(answer: &str, candidates: &[WardrobeItem]) -> Option<GeneratedOutfit> {
    let urls = extract_urls(answer);
    let [top_url, bottom_url] = urls.as_slice() else {
        return None;
    };

    let find = |url: &str| candidates.iter().find(|item| item.image_url == url);
    let top = find(top_url)?;
    let bottom = find(bottom_url)?;

    Some(GeneratedOutfit {
        top: top.snapshot(),
        bottom: bottom.snapshot(),
    })
}

fn combination_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)Combination \d+:").expect("static combination pattern"))
}

/// Splits a free-text answer on `Combination N:` markers and returns the
/// first line of each block. Text before the first marker is ignored when a
/// marker is present.
pub fn parse_combinations(answer: &str) -> Vec<String> {
    let marker = combination_marker();
    let blocks: Vec<&str> = marker.split(answer).collect();
    let blocks = if marker.is_match(answer) {
        &blocks[1..]
    } else {
        &blocks[..]
    };

    blocks
        .iter()
        .filter_map(|block| {
            block
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
        .take(MAX_COMBINATIONS)
        .collect()
}
