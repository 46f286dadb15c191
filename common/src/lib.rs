//! Wardrobe taxonomy
//!
//! This crate defines the fixed vocabularies used to tag wardrobe items and to
//! ask for outfit suggestions. Items themselves are stored as free text, so
//! every parser here is case-insensitive and tolerant of surrounding spaces.
//!
//! `name()` returns the canonical value (e.g. `"special event"`); `from_name`
//! also accepts the short forms the item form submits (e.g. `"special"`).

use std::fmt;

/// Top-level garment categories offered by the item form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tops,
    Bottoms,
    Dresses,
    Outerwear,
    Shoes,
    Accessories,
    Bags,
    Wedding,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Tops,
        Category::Bottoms,
        Category::Dresses,
        Category::Outerwear,
        Category::Shoes,
        Category::Accessories,
        Category::Bags,
        Category::Wedding,
    ];

    /// Returns the form value for the category
    pub fn name(&self) -> &'static str {
        match self {
            Category::Tops => "tops",
            Category::Bottoms => "bottoms",
            Category::Dresses => "dresses",
            Category::Outerwear => "outerwear",
            Category::Shoes => "shoes",
            Category::Accessories => "accessories",
            Category::Bags => "bags",
            Category::Wedding => "wedding",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.name() == normalized)
    }
}

/// Season tags; `All` is the form's "all season" choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
    All,
}

impl Season {
    pub const ALL: [Season; 5] = [
        Season::Spring,
        Season::Summer,
        Season::Autumn,
        Season::Winter,
        Season::All,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
            Season::All => "all",
        }
    }

    /// Accepts "fall" and "all season" as aliases
    pub fn from_name(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "autumn" | "fall" => Some(Season::Autumn),
            "winter" => Some(Season::Winter),
            "all" | "all season" | "all seasons" => Some(Season::All),
            _ => None,
        }
    }
}

/// Occasions an outfit can be generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occasion {
    Everyday,
    Work,
    Party,
    SpecialEvent,
}

impl Occasion {
    pub const ALL: [Occasion; 4] = [
        Occasion::Everyday,
        Occasion::Work,
        Occasion::Party,
        Occasion::SpecialEvent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Occasion::Everyday => "everyday",
            Occasion::Work => "work",
            Occasion::Party => "party",
            Occasion::SpecialEvent => "special event",
        }
    }

    /// The item form submits `special` for `special event`
    pub fn from_name(raw: &str) -> Option<Self> {
        let normalized = normalize(raw).replace(['-', '_'], " ");
        if normalized == "special" {
            return Some(Occasion::SpecialEvent);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|occasion| occasion.name() == normalized)
    }
}

/// Purpose tag carried by each item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Casual,
    Work,
    Formal,
    Sport,
}

impl Purpose {
    pub const ALL: [Purpose; 4] = [
        Purpose::Casual,
        Purpose::Work,
        Purpose::Formal,
        Purpose::Sport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Purpose::Casual => "casual",
            Purpose::Work => "work",
            Purpose::Formal => "formal",
            Purpose::Sport => "sport",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|purpose| purpose.name() == normalized)
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

impl_display!(Category, Season, Occasion, Purpose);

/// Case-insensitive comparison of two free-text tags
pub fn tags_equal(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Splits a comma-separated tag list such as `"summer, spring"`
pub fn split_tags(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',').map(normalize).filter(|tag| !tag.is_empty())
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}
